//! Backend error types.

use thiserror::Error;

use tryout_core::TryoutError;

/// Errors raised by the store backends before they reach the core taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend answered with an error status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never completed.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// Reading or writing the data file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(crate::remote::DEFAULT_TIMEOUT_SECS)
        } else if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Network(err.to_string())
        }
    }
}

impl From<StoreError> for TryoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Http { status, message } if status == 400 || status == 422 => {
                TryoutError::Validation(message)
            }
            other => TryoutError::remote(other),
        }
    }
}
