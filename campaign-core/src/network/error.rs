//! Network error types.

use thiserror::Error;

/// Failures to obtain any HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with `status` but the body exceeds the limit.
    #[error("Response too large: {size} bytes (max {max})")]
    TooLarge { status: u16, size: u64, max: u64 },
}
