//! The unit of streaming transfer

use bytes::Bytes;

/// An immutable chunk of bytes
///
/// The length is always the byte count of the payload; it is never stored
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Slice {
    bytes: Bytes,
}

impl Slice {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the underlying buffer
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl From<Bytes> for Slice {
    fn from(bytes: Bytes) -> Self {
        Self { bytes }
    }
}

impl From<Vec<u8>> for Slice {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static [u8]> for Slice {
    fn from(bytes: &'static [u8]) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_matches_bytes() {
        let slice = Slice::from(b"hell".as_slice());
        assert_eq!(slice.len(), 4);
        assert_eq!(slice.as_bytes(), b"hell");
        assert!(Slice::default().is_empty());
    }
}
