//! Error types for cup-identity
//!
//! Expected divergence (missing identity, stale record, duplicate profiles)
//! is never an error - it is reported through [`crate::drift::DriftReason`].
//! This type covers the unexpected failures: provider/API errors, database
//! errors, and exhausted confirmation loops. All of them terminate the run
//! with a non-zero exit.

use thiserror::Error;

/// Main error type for cup-identity operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Cloud identity API error
    #[error("provider error: {0}")]
    Provider(String),

    /// Credential store error
    #[error("store error: {0}")]
    Store(String),

    /// A confirmation loop ran out of attempts before the expected
    /// condition held
    #[error("{operation} not confirmed after {attempts} attempts")]
    RetryExhausted {
        /// Name of the operation being confirmed
        operation: String,
        /// Number of attempts made before giving up
        attempts: u32,
    },
}

impl Error {
    /// Create a provider error with the given message
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a store error with the given message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_name_the_failing_call() {
        let err = Error::provider("IAM GetUser failed: connection refused");
        assert!(err.to_string().contains("provider error"));
        assert!(err.to_string().contains("GetUser"));
    }

    #[test]
    fn store_errors_accept_string_and_str() {
        let err = Error::store(format!("lookup for role {} failed", "cup-admin"));
        assert!(err.to_string().contains("cup-admin"));

        let err = Error::store("static message");
        assert!(err.to_string().contains("store error: static message"));
    }

    #[test]
    fn retry_exhausted_reports_operation_and_attempts() {
        let err = Error::RetryExhausted {
            operation: "confirm policy attachment".to_string(),
            attempts: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("confirm policy attachment"));
        assert!(msg.contains("20 attempts"));
    }
}
