//! Error types for Escher request signing and verification.
//!
//! All failures are represented by [`AuthError`]. [`AuthError::kind`] groups the
//! variants into the four failure classes callers act on: configuration errors
//! abort client construction, signing and header-write errors abort a single
//! request, and rejections come from the verifying side.

/// Broad failure class of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Credentials or scope are unusable. Fatal at construction time.
    Configuration,
    /// The canonical request could not be built. The request must not be sent.
    Signing,
    /// The authentication headers could not be written onto the request.
    HeaderWrite,
    /// A signed request failed verification.
    Rejected,
}

/// Errors that can occur while signing or verifying Escher requests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access key ID is empty.
    #[error("access key id must not be empty")]
    EmptyAccessKey,

    /// The secret key is empty.
    #[error("secret key must not be empty")]
    EmptySecretKey,

    /// The secret key is not valid base64.
    #[error("secret key is not valid base64: {0}")]
    InvalidSecretKey(#[from] base64::DecodeError),

    /// The credential scope is malformed.
    #[error("invalid credential scope: {0:?}")]
    InvalidCredentialScope(String),

    /// A request was submitted for signing before credentials were bound.
    #[error("request authenticator is not configured")]
    NotConfigured,

    /// The authenticator already has credentials bound.
    #[error("request authenticator is already configured")]
    AlreadyConfigured,

    /// A header required for signing is absent from the request.
    #[error("missing required header: {0}")]
    MissingHeader(String),

    /// A header value is not valid visible ASCII / UTF-8 and cannot be canonicalized.
    #[error("header {0} has a value that cannot be canonicalized")]
    InvalidHeaderValue(String),

    /// The request body is not available as bytes (e.g. a streaming body).
    #[error("request body cannot be read for signing")]
    UnreadableBody,

    /// A header could not be written onto the outbound request.
    #[error("cannot set header {name}: {reason}")]
    HeaderWrite {
        /// Header name that failed.
        name: String,
        /// Underlying reason.
        reason: String,
    },

    /// The auth header is missing from a request under verification.
    #[error("missing Escher auth header")]
    MissingAuthHeader,

    /// The auth header could not be parsed.
    #[error("invalid Escher auth header format")]
    InvalidAuthHeader,

    /// The algorithm in the auth header is not `ESR-HMAC-SHA256`.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The `Credential` component is malformed.
    #[error("invalid credential format")]
    InvalidCredential,

    /// The credential scope in the auth header is not the one this verifier serves.
    #[error("credential scope mismatch: {0}")]
    CredentialScopeMismatch(String),

    /// The access key ID was not found in the credential store.
    #[error("access key not found: {0}")]
    AccessKeyNotFound(String),

    /// The date header is not in `YYYYMMDD'T'HHMMSS'Z'` form, or disagrees with
    /// the credential date.
    #[error("invalid request date: {0}")]
    InvalidDate(String),

    /// The request timestamp is outside the accepted clock-skew window.
    #[error("request timestamp {0} is outside the accepted window")]
    RequestExpired(String),

    /// A header the request claims to be signed over is absent or unreadable.
    #[error("signed header {0} is missing or unreadable")]
    UnverifiableHeader(String),

    /// The body of a request under verification cannot be read.
    #[error("request body cannot be read for verification")]
    UnverifiableBody,

    /// A header that must always be signed is not in `SignedHeaders`.
    #[error("header {0} must be signed")]
    UnsignedMandatoryHeader(String),

    /// The computed signature does not match the provided one.
    #[error("signature does not match")]
    SignatureDoesNotMatch,
}

impl AuthError {
    /// The failure class this error belongs to.
    #[must_use]
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::EmptyAccessKey
            | Self::EmptySecretKey
            | Self::InvalidSecretKey(_)
            | Self::InvalidCredentialScope(_)
            | Self::NotConfigured
            | Self::AlreadyConfigured => AuthErrorKind::Configuration,
            Self::MissingHeader(_) | Self::InvalidHeaderValue(_) | Self::UnreadableBody => {
                AuthErrorKind::Signing
            }
            Self::HeaderWrite { .. } => AuthErrorKind::HeaderWrite,
            Self::MissingAuthHeader
            | Self::InvalidAuthHeader
            | Self::UnsupportedAlgorithm(_)
            | Self::InvalidCredential
            | Self::CredentialScopeMismatch(_)
            | Self::AccessKeyNotFound(_)
            | Self::InvalidDate(_)
            | Self::RequestExpired(_)
            | Self::UnverifiableHeader(_)
            | Self::UnverifiableBody
            | Self::UnsignedMandatoryHeader(_)
            | Self::SignatureDoesNotMatch => AuthErrorKind::Rejected,
        }
    }
}
