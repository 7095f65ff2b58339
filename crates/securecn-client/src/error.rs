//! Client error types.

use securecn_auth::AuthError;
use securecn_core::SecureCnError;

/// Errors returned by [`crate::SecureCnClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The provider configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] SecureCnError),

    /// Building credentials or signing the request failed. Nothing was sent.
    #[error("request authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The request URL could not be built.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Transport failure after all retries.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request or response body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server rejected the credentials or the signature.
    #[error("unauthorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code (401 or 403).
        status: u16,
        /// Response body.
        message: String,
    },

    /// Any other non-success response.
    #[error("SecureCN API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },
}

impl ClientError {
    /// HTTP status of a rejected request, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
