//! Error taxonomy for the OTP service boundary.
//!
//! Callers distinguish behavior by kind, never by message text. Dependency
//! failures are logged at the call site and normalized to `Internal` before
//! crossing the boundary, so no backend error text leaks to the caller.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    /// Missing or empty required input, or a code that does not match.
    #[error("{0}")]
    InvalidArgument(String),
    /// No pending OTP record exists for the given email.
    #[error("{0}")]
    NotFound(String),
    /// A record exists but its validity window has elapsed.
    #[error("{0}")]
    FailedPrecondition(String),
    /// Store, notifier, or identity-provider failure.
    #[error("{0}")]
    Internal(String),
}

impl OtpError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn failed_precondition(message: impl Into<String>) -> Self {
        Self::FailedPrecondition(message.into())
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = OtpError::invalid_argument("Invalid OTP.");
        assert_eq!(err.to_string(), "Invalid OTP.");

        let err = OtpError::internal("Unable to verify OTP.");
        assert_eq!(err.to_string(), "Unable to verify OTP.");
    }

    #[test]
    fn kinds_are_distinguishable() {
        assert!(matches!(
            OtpError::not_found("x"),
            OtpError::NotFound(_)
        ));
        assert!(matches!(
            OtpError::failed_precondition("x"),
            OtpError::FailedPrecondition(_)
        ));
        assert_ne!(
            OtpError::not_found("same message"),
            OtpError::internal("same message")
        );
    }
}
