//! Signing identity: access key, secret key, and credential scope.
//!
//! [`Credentials`] are built once when the client is configured and stay
//! immutable afterwards. The secret key is held as raw bytes inside
//! [`SecretKey`], which never prints its contents.
//!
//! The verifying side resolves secrets through the [`CredentialProvider`] trait;
//! [`StaticCredentialProvider`] is the in-memory implementation used by tests
//! and the debugging tools.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::AuthError;

/// Raw secret key bytes.
///
/// `Debug` and `Display` are redacted so the key cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptySecretKey`] if `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AuthError::EmptySecretKey);
        }
        Ok(Self(bytes))
    }

    /// Decode a base64 (standard alphabet, padded) secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSecretKey`] if the input is not valid base64,
    /// or [`AuthError::EmptySecretKey`] if it decodes to nothing.
    pub fn from_base64(encoded: &str) -> Result<Self, AuthError> {
        let bytes = BASE64.decode(encoded.trim())?;
        Self::new(bytes)
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(**redacted**)")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("**redacted**")
    }
}

/// An access key ID paired with its secret key.
///
/// # Examples
///
/// ```
/// use securecn_auth::credentials::Credentials;
///
/// let creds = Credentials::from_base64("AKIDEXAMPLE", "c2VjcmV0").unwrap();
/// assert_eq!(creds.access_key_id(), "AKIDEXAMPLE");
/// assert_eq!(creds.secret_key().as_bytes(), b"secret");
/// ```
#[derive(Debug, Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_key: SecretKey,
}

impl Credentials {
    /// Build credentials from an access key ID and raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyAccessKey`] or [`AuthError::EmptySecretKey`].
    pub fn new(
        access_key_id: impl Into<String>,
        secret_key: impl Into<Vec<u8>>,
    ) -> Result<Self, AuthError> {
        let access_key_id = access_key_id.into();
        if access_key_id.trim().is_empty() {
            return Err(AuthError::EmptyAccessKey);
        }
        Ok(Self {
            access_key_id,
            secret_key: SecretKey::new(secret_key)?,
        })
    }

    /// Build credentials from an access key ID and a base64-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns a configuration-class [`AuthError`] if either part is unusable.
    pub fn from_base64(
        access_key_id: impl Into<String>,
        secret_key: &str,
    ) -> Result<Self, AuthError> {
        let access_key_id = access_key_id.into();
        if access_key_id.trim().is_empty() {
            return Err(AuthError::EmptyAccessKey);
        }
        Ok(Self {
            access_key_id,
            secret_key: SecretKey::from_base64(secret_key)?,
        })
    }

    /// The access key ID.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret key.
    #[must_use]
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }
}

/// The namespace a signature is bound to, e.g. `global/services/portshift_request`.
///
/// Every `/`-separated part feeds one step of the signing key chain; the last
/// part is the terminator literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialScope(String);

impl CredentialScope {
    /// Scope of the SecureCN management API.
    pub const SECURECN: &str = "global/services/portshift_request";

    /// Validate and wrap a scope string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentialScope`] if the scope is empty or has
    /// an empty `/`-separated part.
    pub fn new(scope: impl Into<String>) -> Result<Self, AuthError> {
        let scope = scope.into();
        if scope.is_empty() || scope.split('/').any(str::is_empty) {
            return Err(AuthError::InvalidCredentialScope(scope));
        }
        Ok(Self(scope))
    }

    /// The SecureCN management API scope.
    #[must_use]
    pub fn securecn() -> Self {
        Self(Self::SECURECN.to_owned())
    }

    /// The scope as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `/`-separated parts, in key-chain order.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl Default for CredentialScope {
    fn default() -> Self {
        Self::securecn()
    }
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trait for looking up secret keys by access key ID on the verifying side.
pub trait CredentialProvider: Send + Sync {
    /// Retrieve the secret key for the given access key ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccessKeyNotFound`] if the access key ID is not recognized.
    fn get_secret_key(&self, access_key_id: &str) -> Result<SecretKey, AuthError>;
}

/// In-memory credential provider backed by a `HashMap`.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, SecretKey>,
}

impl StaticCredentialProvider {
    /// Create a provider from an iterable of credentials.
    pub fn new(credentials: impl IntoIterator<Item = Credentials>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|c| (c.access_key_id, c.secret_key))
                .collect(),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_secret_key(&self, access_key_id: &str) -> Result<SecretKey, AuthError> {
        self.credentials
            .get(access_key_id)
            .cloned()
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_owned()))
    }
}
