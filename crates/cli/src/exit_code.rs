//! Process exit codes
//!
//! Scripts branch on these values, so existing numbers never change.

use ds_core::Error;

/// Exit status of one `ds` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Anything not covered below
    GeneralError = 1,

    /// Bad arguments, malformed path or request, invalid config
    UsageError = 2,

    /// Connection failure or unexpected server response; worth retrying
    NetworkError = 3,

    /// Credential missing, of the wrong kind or rejected
    AuthError = 4,

    /// Path or endpoint does not exist
    NotFound = 5,

    /// Endpoint name taken, or a file where a directory was expected
    Conflict = 6,

    /// Backend lacks the operation, or no backend handles the scheme
    UnsupportedFeature = 7,

    /// Streaming stopped part way; the destination upload was not committed
    TransferFailed = 8,

    /// Ctrl-C during a transfer
    Interrupted = 130,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            3 => Some(Self::NetworkError),
            4 => Some(Self::AuthError),
            5 => Some(Self::NotFound),
            6 => Some(Self::Conflict),
            7 => Some(Self::UnsupportedFeature),
            8 => Some(Self::TransferFailed),
            130 => Some(Self::Interrupted),
            _ => None,
        }
    }

    /// Whether rerunning the same command may succeed
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::TransferFailed)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::GeneralError => "error",
            Self::UsageError => "usage error",
            Self::NetworkError => "network error",
            Self::AuthError => "authentication failure",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::UnsupportedFeature => "unsupported",
            Self::TransferFailed => "transfer failed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        Self::from_i32(error.exit_code()).unwrap_or(Self::GeneralError)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}
