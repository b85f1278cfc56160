//! Pull-based streaming source
//!
//! A [`Tap`] reads a resource as an ordered, non-overlapping sequence of
//! [`Slice`]s. The total size is captured when the tap is created; each slice is
//! one ranged read against the backend through a [`RangeReader`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{Error, Result};
use crate::slice::Slice;

/// Backend seam for ranged reads of one resource
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes>;
}

/// Ordered pull-source of slices bound to one resource
pub struct Tap {
    reader: Box<dyn RangeReader>,
    total_size: u64,
    slice_size: u64,
    offset: u64,
    done: bool,
}

impl std::fmt::Debug for Tap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tap")
            .field("total_size", &self.total_size)
            .field("slice_size", &self.slice_size)
            .field("offset", &self.offset)
            .field("done", &self.done)
            .finish()
    }
}

impl Tap {
    /// Create a tap over `total_size` bytes read `slice_size` at a time
    ///
    /// A zero-byte resource produces no slices and issues no reads.
    pub fn new(reader: Box<dyn RangeReader>, total_size: u64, slice_size: u64) -> Result<Self> {
        if slice_size == 0 {
            return Err(Error::InvalidArgument(
                "slice size must be greater than zero".into(),
            ));
        }

        Ok(Self {
            reader,
            total_size,
            slice_size,
            offset: 0,
            done: total_size == 0,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn slice_size(&self) -> u64 {
        self.slice_size
    }

    /// Bytes produced so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn has_more(&self) -> bool {
        !self.done
    }

    /// Produce the next slice, `None` once the resource is exhausted
    ///
    /// A failed read ends the sequence: the error is returned once and every
    /// later call yields `None`.
    pub async fn next_slice(&mut self) -> Result<Option<Slice>> {
        if self.done {
            return Ok(None);
        }

        let remaining = self.total_size - self.offset;
        let len = remaining.min(self.slice_size);
        let last = len == remaining;

        let bytes = match self.reader.read_range(self.offset, len).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        if bytes.len() as u64 != len {
            self.done = true;
            return Err(Error::Network(format!(
                "short read at offset {}: expected {len} bytes, got {}",
                self.offset,
                bytes.len()
            )));
        }

        self.offset += len;
        self.done = last;
        Ok(Some(Slice::from(bytes)))
    }

    /// Turn the tap into a lazy stream of slices
    pub fn into_stream(self) -> BoxStream<'static, Result<Slice>> {
        stream::try_unfold(self, |mut tap| async move {
            let next = tap.next_slice().await?;
            Ok::<_, Error>(next.map(|slice| (slice, tap)))
        })
        .boxed()
    }
}
