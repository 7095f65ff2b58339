//! Escher request signing.
//!
//! Signing a request takes four steps:
//!
//! 1. Build the canonical request from the request view and the signing time.
//! 2. Build the string to sign from the timestamp, dated credential scope, and
//!    canonical request hash.
//! 3. Derive the signing key with an HMAC-SHA256 chain over the date and each
//!    part of the credential scope.
//! 4. HMAC the string to sign with the derived key and hex-encode it.
//!
//! [`EscherSigner::sign`] is pure: it returns the header values without touching
//! the request. [`EscherSigner::authenticate_request`] samples the clock once,
//! signs, and writes the headers onto the request.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cache::{SIGNING_KEY_LEN, SigningKeyCache};
use crate::canonical::{build_canonical_request, build_signed_headers_string, hash_payload};
use crate::credentials::{CredentialScope, Credentials};
use crate::error::AuthError;
use crate::header::{
    AUTH_HEADER, DATE_HEADER, HOST_HEADER, SignedHeaders, apply_signed_headers,
    format_authorization_header,
};
use crate::request::{RequestView, SignableRequest};

/// Prefix prepended to the secret to seed the key chain.
pub const ALGORITHM_PREFIX: &str = "ESR";

/// Algorithm identifier used in the auth header and the string to sign.
pub const ALGORITHM: &str = "ESR-HMAC-SHA256";

/// `strftime` format of the date header and the string-to-sign timestamp.
pub const LONG_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// `strftime` format of the key-chain date and the credential date.
pub const SHORT_DATE_FORMAT: &str = "%Y%m%d";

type HmacSha256 = Hmac<Sha256>;

/// The single UTC instant a request is signed at.
///
/// Both the date header and the key-chain date are rendered from the same
/// value, so they cannot straddle a day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SigningTime(DateTime<Utc>);

impl SigningTime {
    /// Sample the current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Use a fixed instant.
    #[must_use]
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Parse a `YYYYMMDD'T'HHMMSS'Z'` timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidDate`] if the value is not in that form.
    pub fn parse_long_date(value: &str) -> Result<Self, AuthError> {
        if value.len() != 16 {
            return Err(AuthError::InvalidDate(value.to_owned()));
        }
        NaiveDateTime::parse_from_str(value, LONG_DATE_FORMAT)
            .map(|naive| Self(naive.and_utc()))
            .map_err(|_| AuthError::InvalidDate(value.to_owned()))
    }

    /// `YYYYMMDD'T'HHMMSS'Z'`.
    #[must_use]
    pub fn long_date(&self) -> String {
        self.0.format(LONG_DATE_FORMAT).to_string()
    }

    /// `YYYYMMDD`.
    #[must_use]
    pub fn short_date(&self) -> String {
        self.0.format(SHORT_DATE_FORMAT).to_string()
    }

    /// The underlying instant.
    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for SigningTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.long_date())
    }
}

/// Everything computed while signing one request.
///
/// Kept around so a rejected request can be compared against the server's
/// canonical form.
#[derive(Debug, Clone)]
pub struct RequestSignature {
    /// The canonical request.
    pub canonical_request: String,
    /// The string to sign.
    pub string_to_sign: String,
    /// `;`-separated signed header names.
    pub signed_headers: String,
    /// Hex-encoded signature.
    pub signature: String,
    /// Header values to inject.
    pub headers: SignedHeaders,
}

/// Build the Escher string to sign.
///
/// Format:
/// ```text
/// ESR-HMAC-SHA256\n
/// <long date>\n
/// <short date>/<credential scope>\n
/// <hex(SHA256(canonical_request))>
/// ```
///
/// # Examples
///
/// ```
/// use securecn_auth::signer::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "20240101T000000Z",
///     "20240101/global/services/portshift_request",
///     "89c8f6bbb36df64cf65e6388907c06f905ac764a27b7a4ab26f219c3f1cfd7de",
/// );
/// assert!(sts.starts_with("ESR-HMAC-SHA256\n20240101T000000Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    long_date: &str,
    dated_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{long_date}\n{dated_scope}\n{canonical_request_hash}")
}

/// Derive the signing key.
///
/// ```text
/// key = HMAC-SHA256("ESR" + secret, short_date)
/// key = HMAC-SHA256(key, part)        for each part of the credential scope
/// ```
///
/// With the SecureCN scope the chain is date, `global`, `services`,
/// `portshift_request`.
#[must_use]
pub fn derive_signing_key(
    secret_key: &[u8],
    short_date: &str,
    scope: &CredentialScope,
) -> [u8; SIGNING_KEY_LEN] {
    let mut seed = Vec::with_capacity(ALGORITHM_PREFIX.len() + secret_key.len());
    seed.extend_from_slice(ALGORITHM_PREFIX.as_bytes());
    seed.extend_from_slice(secret_key);

    let mut key = hmac_sha256(&seed, short_date.as_bytes());
    for part in scope.parts() {
        key = hmac_sha256(&key, part.as_bytes());
    }
    key
}

/// Compute the hex-encoded HMAC-SHA256 of `string_to_sign` under `signing_key`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()))
}

/// Signs outbound requests with one set of credentials.
///
/// Holds only immutable state (plus an optional key cache behind a mutex), so a
/// single signer can be shared across tasks and threads.
#[derive(Debug)]
pub struct EscherSigner {
    credentials: Credentials,
    scope: CredentialScope,
    additional_signed_headers: Vec<String>,
    key_cache: Option<SigningKeyCache>,
}

impl EscherSigner {
    /// Create a signer that signs `host` and the date header.
    #[must_use]
    pub fn new(credentials: Credentials, scope: CredentialScope) -> Self {
        Self {
            credentials,
            scope,
            additional_signed_headers: Vec::new(),
            key_cache: None,
        }
    }

    /// Also sign these headers when the request carries them.
    ///
    /// Names are case-insensitive. The auth header can never be signed and is
    /// ignored here.
    #[must_use]
    pub fn with_signed_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim().to_ascii_lowercase();
            if name.is_empty()
                || name == AUTH_HEADER
                || self.additional_signed_headers.contains(&name)
            {
                continue;
            }
            self.additional_signed_headers.push(name);
        }
        self
    }

    /// Reuse the derived signing key for all requests signed on the same UTC date.
    #[must_use]
    pub fn with_key_cache(mut self) -> Self {
        self.key_cache = Some(SigningKeyCache::new());
        self
    }

    /// The access key ID requests are signed with.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        self.credentials.access_key_id()
    }

    /// The credential scope requests are bound to.
    #[must_use]
    pub fn credential_scope(&self) -> &CredentialScope {
        &self.scope
    }

    /// Sign `request` as of `time` without modifying it.
    ///
    /// Any auth or date header already on the request is ignored; the date
    /// header is signed with the value rendered from `time`. When the request
    /// has no `Host` header the transport's authority is signed instead.
    ///
    /// # Errors
    ///
    /// Returns a signing-class [`AuthError`] if the request cannot be
    /// canonicalized (missing host, unreadable body, non-text header value).
    pub fn sign<R: RequestView + ?Sized>(
        &self,
        request: &R,
        time: SigningTime,
    ) -> Result<RequestSignature, AuthError> {
        let long_date = time.long_date();
        let short_date = time.short_date();

        let pairs = request.header_pairs()?;
        let has_host = pairs
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(HOST_HEADER));
        let authority = if has_host {
            None
        } else {
            Some(
                request
                    .authority()
                    .ok_or_else(|| AuthError::MissingHeader(HOST_HEADER.to_owned()))?,
            )
        };

        let mut headers: Vec<(&str, &str)> = pairs
            .into_iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case(DATE_HEADER) && !name.eq_ignore_ascii_case(AUTH_HEADER)
            })
            .collect();
        if let Some(authority) = authority.as_deref() {
            headers.push((HOST_HEADER, authority));
        }
        headers.push((DATE_HEADER, &long_date));

        let mut signed: Vec<&str> = vec![HOST_HEADER, DATE_HEADER];
        for name in &self.additional_signed_headers {
            if headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                signed.push(name);
            }
        }

        let payload_hash = hash_payload(request.body()?);
        let canonical_request = build_canonical_request(
            request.method(),
            request.path(),
            request.query().unwrap_or(""),
            &headers,
            &signed,
            &payload_hash,
        );

        debug!(canonical_request = %canonical_request, "Built canonical request");

        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let dated_scope = format!("{short_date}/{}", self.scope);
        let string_to_sign = build_string_to_sign(&long_date, &dated_scope, &canonical_hash);

        debug!(string_to_sign = %string_to_sign, "Built string to sign");

        let signing_key = self.signing_key(&short_date);
        let signature = compute_signature(&signing_key, &string_to_sign);
        let signed_headers = build_signed_headers_string(&signed);
        let authorization = format_authorization_header(
            self.credentials.access_key_id(),
            &dated_scope,
            &signed_headers,
            &signature,
        );

        Ok(RequestSignature {
            canonical_request,
            string_to_sign,
            signed_headers,
            signature,
            headers: SignedHeaders {
                authorization,
                date: long_date,
            },
        })
    }

    /// Sign `request` with a fresh timestamp and write the auth and date headers.
    ///
    /// Call this once per send attempt; a retried request must be signed again.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if signing or header injection fails. The
    /// request must not be sent in that case.
    pub fn authenticate_request<R: SignableRequest + ?Sized>(
        &self,
        request: &mut R,
    ) -> Result<(), AuthError> {
        self.authenticate_request_at(request, SigningTime::now())
    }

    /// [`authenticate_request`](Self::authenticate_request) at a fixed instant.
    ///
    /// # Errors
    ///
    /// See [`authenticate_request`](Self::authenticate_request).
    pub fn authenticate_request_at<R: SignableRequest + ?Sized>(
        &self,
        request: &mut R,
        time: SigningTime,
    ) -> Result<(), AuthError> {
        let signature = self.sign(&*request, time)?;
        apply_signed_headers(request, &signature.headers)?;

        debug!(
            access_key_id = %self.credentials.access_key_id(),
            date = %signature.headers.date,
            signed_headers = %signature.signed_headers,
            "Signed request"
        );
        Ok(())
    }

    fn signing_key(&self, short_date: &str) -> [u8; SIGNING_KEY_LEN] {
        let secret = self.credentials.secret_key().as_bytes();
        match &self.key_cache {
            Some(cache) => cache.get_or_derive(short_date, self.scope.as_str(), || {
                derive_signing_key(secret, short_date, &self.scope)
            }),
            None => derive_signing_key(secret, short_date, &self.scope),
        }
    }
}

/// Compute HMAC-SHA256 and return the raw bytes.
fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; SIGNING_KEY_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    let mut out = [0u8; SIGNING_KEY_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
