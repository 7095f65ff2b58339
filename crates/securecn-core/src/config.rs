//! Provider configuration.
//!
//! Provides [`SecureCnConfig`] for configuring access to the SecureCN management
//! API. Values are loaded from environment variables, matching the variables
//! the Terraform provider block falls back to.

use std::fmt;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{SecureCnError, SecureCnResult};

/// Default management API endpoint.
pub const DEFAULT_URL: &str = "https://securecn.cisco.com";

/// Default credential scope of the SecureCN management API.
const DEFAULT_CREDENTIAL_SCOPE: &str = "global/services/portshift_request";

/// SecureCN provider configuration.
///
/// The secret key is held in its base64 form as supplied by the user. It is
/// never serialized and is redacted from `Debug` output.
///
/// # Examples
///
/// ```
/// use securecn_core::SecureCnConfig;
///
/// let config = SecureCnConfig::builder()
///     .access_key("AKIDEXAMPLE".into())
///     .secret_key("c2VjcmV0".into())
///     .build();
/// assert_eq!(config.url, "https://securecn.cisco.com");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SecureCnConfig {
    /// Management API base URL.
    #[builder(default = String::from(DEFAULT_URL))]
    #[serde(default = "default_url")]
    pub url: String,

    /// Access key ID.
    #[builder(default)]
    #[serde(default)]
    pub access_key: String,

    /// Base64-encoded secret key.
    #[builder(default)]
    #[serde(default, skip_serializing)]
    pub secret_key: String,

    /// Credential scope requests are signed for.
    #[builder(default = String::from(DEFAULT_CREDENTIAL_SCOPE))]
    #[serde(default = "default_credential_scope")]
    pub credential_scope: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-request timeout in seconds.
    #[builder(default = 30)]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after a transient failure. Each retry is signed again.
    #[builder(default = 2)]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether to reuse the derived signing key for the rest of the UTC day.
    #[builder(default = true)]
    #[serde(default = "default_cache_signing_keys")]
    pub cache_signing_keys: bool,
}

impl Default for SecureCnConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            access_key: String::new(),
            secret_key: String::new(),
            credential_scope: default_credential_scope(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            cache_signing_keys: default_cache_signing_keys(),
        }
    }
}

impl fmt::Debug for SecureCnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCnConfig")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"**redacted**")
            .field("credential_scope", &self.credential_scope)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("cache_signing_keys", &self.cache_signing_keys)
            .finish()
    }
}

impl SecureCnConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SECURECN_URL` | `https://securecn.cisco.com` |
    /// | `SECURECN_ACCESS_KEY` | empty |
    /// | `SECURECN_SECRET_KEY` | empty |
    /// | `SECURECN_CREDENTIAL_SCOPE` | `global/services/portshift_request` |
    /// | `LOG_LEVEL` | `info` |
    /// | `SECURECN_REQUEST_TIMEOUT` | `30` |
    /// | `SECURECN_MAX_RETRIES` | `2` |
    /// | `SECURECN_CACHE_SIGNING_KEYS` | `true` |
    ///
    /// Unparsable numbers keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("SECURECN_URL") {
            config.url = v;
        }
        if let Some(v) = lookup("SECURECN_ACCESS_KEY") {
            config.access_key = v;
        }
        if let Some(v) = lookup("SECURECN_SECRET_KEY") {
            config.secret_key = v;
        }
        if let Some(v) = lookup("SECURECN_CREDENTIAL_SCOPE") {
            config.credential_scope = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("SECURECN_REQUEST_TIMEOUT") {
            if let Ok(n) = v.parse::<u64>() {
                config.request_timeout_secs = n;
            }
        }
        if let Some(v) = lookup("SECURECN_MAX_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                config.max_retries = n;
            }
        }
        if let Some(v) = lookup("SECURECN_CACHE_SIGNING_KEYS") {
            config.cache_signing_keys = parse_bool(&v);
        }

        config
    }

    /// Check that the values needed to reach the API are present.
    ///
    /// Does not decode the secret; that happens when credentials are built.
    ///
    /// # Errors
    ///
    /// Returns [`SecureCnError::Config`] naming the first missing or invalid value.
    pub fn validate(&self) -> SecureCnResult<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(SecureCnError::Config("url must not be empty".to_owned()));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(SecureCnError::Config(format!(
                "url must start with http:// or https://, got {url}"
            )));
        }
        if self.access_key.trim().is_empty() {
            return Err(SecureCnError::Config(
                "access key must not be empty".to_owned(),
            ));
        }
        if self.secret_key.trim().is_empty() {
            return Err(SecureCnError::Config(
                "secret key must not be empty".to_owned(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SecureCnError::Config(
                "request timeout must be at least one second".to_owned(),
            ));
        }
        Ok(())
    }

    /// The base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}

fn default_url() -> String {
    String::from(DEFAULT_URL)
}

fn default_credential_scope() -> String {
    String::from(DEFAULT_CREDENTIAL_SCOPE)
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_cache_signing_keys() -> bool {
    true
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
