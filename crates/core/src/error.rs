//! Error types for ds-core
//!
//! One error type is shared by every backend and by the transfer engine, so that
//! a failure anywhere can be mapped to an exit code by the CLI.

use thiserror::Error;

/// Result type alias for ds-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ds-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Session used without a credential the backend accepts
    #[error("Authentication required for backend '{0}'")]
    AuthenticationRequired(String),

    /// Referenced path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend or resource does not implement the requested capability
    #[error("The {0} operation is unsupported")]
    UnsupportedOperation(String),

    /// Attempt to rebind a resource to a session that is not equivalent
    #[error("Cannot reselect a resource onto a non-equivalent session")]
    InvalidReselect,

    /// Streaming I/O failed mid-transfer
    #[error("Transfer failed after {bytes_transferred} bytes: {source}")]
    TransferFailed {
        bytes_transferred: u64,
        #[source]
        source: Box<Error>,
    },

    /// Transfer cancelled between two suspension points
    #[error("Transfer cancelled after {bytes_transferred} bytes")]
    Cancelled { bytes_transferred: u64 },

    /// Drain method called in the wrong lifecycle state
    #[error("Cannot {op} a drain that is {state}")]
    DrainState {
        op: &'static str,
        state: &'static str,
    },

    /// Backend signal: the path is a file, not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// No backend registered for a URI scheme
    #[error("No backend registered for scheme '{0}'")]
    UnknownBackend(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid argument passed to an operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint not found
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Endpoint already exists
    #[error("Endpoint already exists: {0}")]
    EndpointExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Backend call failed (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Shorthand for an [`Error::UnsupportedOperation`]
    pub fn unsupported(op: impl Into<String>) -> Self {
        Error::UnsupportedOperation(op.into())
    }

    /// Wrap a streaming failure with the progress reached so far
    pub fn transfer_failed(bytes_transferred: u64, source: Error) -> Self {
        Error::TransferFailed {
            bytes_transferred,
            source: Box::new(source),
        }
    }

    /// Bytes moved before a transfer stopped, if this error ended one
    pub fn bytes_transferred(&self) -> Option<u64> {
        match self {
            Error::TransferFailed {
                bytes_transferred, ..
            }
            | Error::Cancelled { bytes_transferred } => Some(*bytes_transferred),
            _ => None,
        }
    }

    /// Process exit code for this error
    ///
    /// This is the only error-to-code table; the CLI converts through it.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_)
            | Error::InvalidArgument(_)
            | Error::InvalidReselect
            | Error::InvalidUrl(_)
            | Error::Config(_)
            | Error::TomlParse(_)
            | Error::Json(_) => 2,
            Error::Network(_) => 3,
            Error::AuthenticationRequired(_) => 4,
            Error::NotFound(_) | Error::EndpointNotFound(_) => 5,
            Error::EndpointExists(_) | Error::NotADirectory(_) => 6,
            Error::UnsupportedOperation(_) | Error::UnknownBackend(_) => 7,
            Error::TransferFailed { .. } | Error::DrainState { .. } => 8,
            Error::Cancelled { .. } => 130,
            Error::Io(_) | Error::TomlSerialize(_) | Error::General(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidPath("test".into()).exit_code(), 2);
        assert_eq!(Error::InvalidReselect.exit_code(), 2);
        assert_eq!(Error::Network("test".into()).exit_code(), 3);
        assert_eq!(Error::AuthenticationRequired("s3".into()).exit_code(), 4);
        assert_eq!(Error::NotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::EndpointNotFound("test".into()).exit_code(), 5);
        assert_eq!(Error::EndpointExists("test".into()).exit_code(), 6);
        assert_eq!(Error::unsupported("sink").exit_code(), 7);
        assert_eq!(
            Error::transfer_failed(4, Error::Network("reset".into())).exit_code(),
            8
        );
        assert_eq!(
            Error::Cancelled {
                bytes_transferred: 0
            }
            .exit_code(),
            130
        );
        assert_eq!(Error::General("test".into()).exit_code(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::unsupported("tap");
        assert_eq!(err.to_string(), "The tap operation is unsupported");

        let err = Error::DrainState {
            op: "drain",
            state: "not started",
        };
        assert_eq!(err.to_string(), "Cannot drain a drain that is not started");

        let err = Error::transfer_failed(4, Error::Network("connection reset".into()));
        assert_eq!(
            err.to_string(),
            "Transfer failed after 4 bytes: Network error: connection reset"
        );
    }

    #[test]
    fn test_bytes_transferred() {
        let err = Error::transfer_failed(11, Error::NotFound("/a".into()));
        assert_eq!(err.bytes_transferred(), Some(11));
        assert_eq!(Error::InvalidReselect.bytes_transferred(), None);
    }
}
