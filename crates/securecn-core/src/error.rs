//! Error types for the SecureCN core.

/// Core error type for the SecureCN provider.
#[derive(Debug, thiserror::Error)]
pub enum SecureCnError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for SecureCN operations.
pub type SecureCnResult<T> = Result<T, SecureCnError>;
