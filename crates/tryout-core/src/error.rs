//! Error taxonomy for tryout operations.
//!
//! Every store-facing operation returns [`TryoutError`]. Callers at the
//! presentation boundary turn it into a notice with [`TryoutError::notice`];
//! nothing here is meant to crash the process.

use thiserror::Error;

use crate::traits::Collection;

/// Errors that can occur while running tryout operations.
#[derive(Debug, Error)]
pub enum TryoutError {
    /// A referenced record does not exist in the store.
    #[error("{collection} not found: {id}")]
    NotFound { collection: Collection, id: String },

    /// A required field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any failed store call (network, HTTP error, malformed record).
    #[error("remote operation failed: {0}")]
    Remote(String),

    /// No user is signed in.
    #[error("not signed in")]
    Unauthenticated,

    /// Email/password pair was rejected.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The signed-in user may not perform this operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The package requires a completed payment before it can be taken.
    #[error("payment required for package {0}")]
    PaymentRequired(String),

    /// The session has already left the in-progress state.
    #[error("session {0} is already completed")]
    SessionClosed(String),
}

impl TryoutError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        TryoutError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn remote(err: impl std::fmt::Display) -> Self {
        TryoutError::Remote(err.to_string())
    }

    /// Returns `true` for failures of the store itself rather than of the request.
    pub fn is_remote(&self) -> bool {
        matches!(self, TryoutError::Remote(_))
    }

    /// Short user-facing text for this error.
    pub fn notice(&self) -> String {
        match self {
            TryoutError::NotFound { collection, .. } => {
                format!("{collection} not found, returning to the dashboard")
            }
            TryoutError::Validation(msg) => msg.clone(),
            TryoutError::Remote(_) => {
                "The server could not complete the request. Please try again.".to_string()
            }
            TryoutError::Unauthenticated => "Please log in first.".to_string(),
            TryoutError::InvalidCredentials => "Email or password is incorrect.".to_string(),
            TryoutError::AccessDenied(_) => "You do not have access to this page.".to_string(),
            TryoutError::PaymentRequired(_) => {
                "This package requires payment before you can start.".to_string()
            }
            TryoutError::SessionClosed(_) => "This tryout has already been finished.".to_string(),
        }
    }
}

pub type Result<T, E = TryoutError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_collection() {
        let err = TryoutError::not_found(Collection::QuestionPackage, "pkg-1");
        assert_eq!(err.to_string(), "QuestionPackage not found: pkg-1");
        assert!(err.notice().contains("dashboard"));
    }

    #[test]
    fn remote_errors_hide_details_from_notice() {
        let err = TryoutError::remote("connection reset by peer");
        assert!(err.is_remote());
        assert!(!err.notice().contains("connection reset"));
    }
}
