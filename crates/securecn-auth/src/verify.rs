//! Escher signature verification.
//!
//! The receiving side of [`crate::signer`]. Used by test servers and local
//! mocks of the SecureCN API to check that a client signs the way the real
//! service expects:
//!
//! 1. Parse the auth header into algorithm, credential, signed headers, and
//!    signature.
//! 2. Check the credential scope, the date header, and the clock skew window.
//! 3. Rebuild the canonical request from the headers the client claims to have
//!    signed.
//! 4. Derive the signing key from the provider's secret and compare the
//!    expected signature in constant time.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{build_canonical_request, hash_payload};
use crate::credentials::{CredentialProvider, CredentialScope};
use crate::error::AuthError;
use crate::header::{AUTH_HEADER, DATE_HEADER, HOST_HEADER};
use crate::request::RequestView;
use crate::signer::{
    ALGORITHM, SigningTime, build_string_to_sign, compute_signature, derive_signing_key,
};

/// Default tolerated distance between the request date and the verifier's clock.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 300;

/// Parsed components of an auth header.
///
/// Format:
/// ```text
/// ESR-HMAC-SHA256 Credential=AKID/20240101/global/services/portshift_request,
///   SignedHeaders=host;x-escher-date,
///   Signature=<hex-signature>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuth {
    /// The signing algorithm.
    pub algorithm: String,
    /// The access key ID.
    pub access_key_id: String,
    /// The credential date (YYYYMMDD).
    pub date: String,
    /// The credential scope following the date.
    pub scope: String,
    /// Signed header names, lowercase, in header order.
    pub signed_headers: Vec<String>,
    /// The hex-encoded signature.
    pub signature: String,
}

/// The result of a successful verification.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The access key ID that signed the request.
    pub access_key_id: String,
    /// The instant from the date header.
    pub request_time: DateTime<Utc>,
    /// The headers covered by the signature.
    pub signed_headers: Vec<String>,
}

/// Parse an auth header value.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if a component is missing,
/// [`AuthError::UnsupportedAlgorithm`] for anything but `ESR-HMAC-SHA256`, or
/// [`AuthError::InvalidCredential`] if the credential is not
/// `AKID/YYYYMMDD/scope`.
pub fn parse_auth_header(header: &str) -> Result<ParsedAuth, AuthError> {
    let (algorithm, rest) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;

    if algorithm != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let credential = credential.ok_or(AuthError::InvalidAuthHeader)?;
    let signed_headers = signed_headers.ok_or(AuthError::InvalidAuthHeader)?;
    let signature = signature.ok_or(AuthError::InvalidAuthHeader)?;

    let mut cred_parts = credential.splitn(3, '/');
    let (Some(access_key_id), Some(date), Some(scope)) =
        (cred_parts.next(), cred_parts.next(), cred_parts.next())
    else {
        return Err(AuthError::InvalidCredential);
    };
    if access_key_id.is_empty()
        || scope.is_empty()
        || date.len() != 8
        || !date.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AuthError::InvalidCredential);
    }

    Ok(ParsedAuth {
        algorithm: algorithm.to_owned(),
        access_key_id: access_key_id.to_owned(),
        date: date.to_owned(),
        scope: scope.to_owned(),
        signed_headers: signed_headers
            .split(';')
            .filter(|h| !h.is_empty())
            .map(str::to_ascii_lowercase)
            .collect(),
        signature: signature.to_owned(),
    })
}

/// Verifies Escher-signed requests against a credential provider.
pub struct EscherVerifier {
    provider: Arc<dyn CredentialProvider>,
    scope: CredentialScope,
    clock_skew: TimeDelta,
}

impl std::fmt::Debug for EscherVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscherVerifier")
            .field("scope", &self.scope)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl EscherVerifier {
    /// Create a verifier for `scope` with the default clock skew.
    #[must_use]
    pub fn new(provider: Arc<dyn CredentialProvider>, scope: CredentialScope) -> Self {
        Self {
            provider,
            scope,
            clock_skew: TimeDelta::seconds(DEFAULT_CLOCK_SKEW_SECS),
        }
    }

    /// Override the tolerated clock skew.
    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: TimeDelta) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Verify `request` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns a rejection-class [`AuthError`] describing the first check that
    /// failed.
    pub fn verify<R: RequestView + ?Sized>(
        &self,
        request: &R,
        now: DateTime<Utc>,
    ) -> Result<AuthResult, AuthError> {
        let pairs = request.header_pairs().map_err(|e| match e {
            AuthError::InvalidHeaderValue(name) => AuthError::UnverifiableHeader(name),
            other => other,
        })?;

        let auth_value = single_header(&pairs, AUTH_HEADER).ok_or(AuthError::MissingAuthHeader)?;
        let parsed = parse_auth_header(auth_value)?;

        if parsed.scope != self.scope.as_str() {
            return Err(AuthError::CredentialScopeMismatch(parsed.scope));
        }

        let date_value = single_header(&pairs, DATE_HEADER)
            .ok_or_else(|| AuthError::UnverifiableHeader(DATE_HEADER.to_owned()))?;
        let request_time = SigningTime::parse_long_date(date_value)?;
        if request_time.short_date() != parsed.date {
            return Err(AuthError::InvalidDate(date_value.to_owned()));
        }

        let skew = (now - request_time.as_datetime()).abs();
        if skew > self.clock_skew {
            return Err(AuthError::RequestExpired(date_value.to_owned()));
        }

        for mandatory in [HOST_HEADER, DATE_HEADER] {
            if !parsed.signed_headers.iter().any(|h| h == mandatory) {
                return Err(AuthError::UnsignedMandatoryHeader(mandatory.to_owned()));
            }
        }

        let secret_key = self.provider.get_secret_key(&parsed.access_key_id)?;

        let authority = request.authority();
        let mut headers: Vec<(&str, &str)> = pairs
            .into_iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(AUTH_HEADER))
            .collect();
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(HOST_HEADER))
        {
            let authority = authority
                .as_deref()
                .ok_or_else(|| AuthError::UnverifiableHeader(HOST_HEADER.to_owned()))?;
            headers.push((HOST_HEADER, authority));
        }

        let signed: Vec<&str> = parsed.signed_headers.iter().map(String::as_str).collect();
        for name in &signed {
            if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                return Err(AuthError::UnverifiableHeader((*name).to_owned()));
            }
        }

        let canonical_request = build_canonical_request(
            request.method(),
            request.path(),
            request.query().unwrap_or(""),
            &headers,
            &signed,
            &hash_payload(request.body().map_err(|_| AuthError::UnverifiableBody)?),
        );
        debug!(canonical_request = %canonical_request, "Rebuilt canonical request");

        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let dated_scope = format!("{}/{}", parsed.date, parsed.scope);
        let string_to_sign = build_string_to_sign(date_value, &dated_scope, &canonical_hash);

        let signing_key = derive_signing_key(secret_key.as_bytes(), &parsed.date, &self.scope);
        let expected_signature = compute_signature(&signing_key, &string_to_sign);

        if parsed
            .signature
            .as_bytes()
            .ct_eq(expected_signature.as_bytes())
            .into()
        {
            debug!(access_key_id = %parsed.access_key_id, "Signature verification succeeded");
            Ok(AuthResult {
                access_key_id: parsed.access_key_id,
                request_time: request_time.as_datetime(),
                signed_headers: parsed.signed_headers,
            })
        } else {
            debug!(
                access_key_id = %parsed.access_key_id,
                string_to_sign = %string_to_sign,
                "Signature mismatch"
            );
            Err(AuthError::SignatureDoesNotMatch)
        }
    }
}

/// The first value of `name`, if present.
fn single_header<'a>(pairs: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::credentials::{Credentials, StaticCredentialProvider};
    use crate::error::AuthErrorKind;
    use crate::signer::EscherSigner;

    const TEST_SECRET_KEY: &[u8] = b"wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn credentials(secret: &[u8]) -> Credentials {
        Credentials::new("AKIDEXAMPLE", secret.to_vec()).unwrap()
    }

    fn verifier() -> EscherVerifier {
        let provider = StaticCredentialProvider::new([credentials(TEST_SECRET_KEY)]);
        EscherVerifier::new(Arc::new(provider), CredentialScope::securecn())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn signed_request(secret: &[u8]) -> http::Request<Vec<u8>> {
        let mut request = http::Request::builder()
            .method("POST")
            .uri("https://securecn.cisco.com/kubernetesClusters")
            .header("Host", "securecn.cisco.com")
            .header("Content-Type", "application/json")
            .body(br#"{"name":"test"}"#.to_vec())
            .unwrap();
        EscherSigner::new(credentials(secret), CredentialScope::securecn())
            .authenticate_request_at(&mut request, SigningTime::from_datetime(now()))
            .unwrap();
        request
    }

    #[test]
    fn test_should_parse_auth_header() {
        let parsed = parse_auth_header(
            "ESR-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/global/services/portshift_request, \
             SignedHeaders=host;x-escher-date, Signature=abc123",
        )
        .unwrap();
        assert_eq!(parsed.access_key_id, "AKIDEXAMPLE");
        assert_eq!(parsed.date, "20240101");
        assert_eq!(parsed.scope, "global/services/portshift_request");
        assert_eq!(parsed.signed_headers, vec!["host", "x-escher-date"]);
        assert_eq!(parsed.signature, "abc123");
    }

    #[test]
    fn test_should_reject_unsupported_algorithm() {
        let result = parse_auth_header(
            "AWS4-HMAC-SHA256 Credential=a/20240101/x, SignedHeaders=host, Signature=00",
        );
        assert!(matches!(
            result,
            Err(AuthError::UnsupportedAlgorithm(a)) if a == "AWS4-HMAC-SHA256"
        ));
    }

    #[test]
    fn test_should_reject_malformed_credential() {
        let result = parse_auth_header(
            "ESR-HMAC-SHA256 Credential=AKIDEXAMPLE/2024-01-01, SignedHeaders=host, Signature=00",
        );
        assert!(matches!(result, Err(AuthError::InvalidCredential)));

        let result = parse_auth_header("ESR-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/x");
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[test]
    fn test_should_verify_signed_request() {
        let result = verifier().verify(&signed_request(TEST_SECRET_KEY), now()).unwrap();
        assert_eq!(result.access_key_id, "AKIDEXAMPLE");
        assert_eq!(result.request_time, now());
        assert_eq!(result.signed_headers, vec!["host", "x-escher-date"]);
    }

    #[test]
    fn test_should_verify_within_clock_skew() {
        let later = now() + TimeDelta::seconds(DEFAULT_CLOCK_SKEW_SECS);
        assert!(verifier().verify(&signed_request(TEST_SECRET_KEY), later).is_ok());
    }

    #[test]
    fn test_should_reject_expired_request() {
        let later = now() + TimeDelta::seconds(DEFAULT_CLOCK_SKEW_SECS + 1);
        let result = verifier().verify(&signed_request(TEST_SECRET_KEY), later);
        assert!(matches!(result, Err(AuthError::RequestExpired(_))));
    }

    #[test]
    fn test_should_reject_wrong_secret() {
        let result = verifier().verify(&signed_request(b"not-the-secret"), now());
        assert!(matches!(result, Err(AuthError::SignatureDoesNotMatch)));
    }

    #[test]
    fn test_should_reject_tampered_body() {
        let mut request = signed_request(TEST_SECRET_KEY);
        *request.body_mut() = br#"{"name":"evil"}"#.to_vec();
        let result = verifier().verify(&request, now());
        assert!(matches!(result, Err(AuthError::SignatureDoesNotMatch)));
    }

    #[test]
    fn test_should_ignore_unsigned_header_changes() {
        let mut request = signed_request(TEST_SECRET_KEY);
        request
            .headers_mut()
            .insert("content-type", "text/plain".parse().unwrap());
        assert!(verifier().verify(&request, now()).is_ok());
    }

    #[test]
    fn test_should_reject_missing_auth_header() {
        let mut request = signed_request(TEST_SECRET_KEY);
        request.headers_mut().remove(AUTH_HEADER);
        let result = verifier().verify(&request, now());
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[test]
    fn test_should_reject_unknown_access_key() {
        let provider =
            StaticCredentialProvider::new([Credentials::new("OTHER", b"x".to_vec()).unwrap()]);
        let verifier = EscherVerifier::new(Arc::new(provider), CredentialScope::securecn());
        let result = verifier.verify(&signed_request(TEST_SECRET_KEY), now());
        assert!(matches!(result, Err(AuthError::AccessKeyNotFound(k)) if k == "AKIDEXAMPLE"));
    }

    #[test]
    fn test_should_reject_scope_mismatch() {
        let provider = StaticCredentialProvider::new([credentials(TEST_SECRET_KEY)]);
        let verifier = EscherVerifier::new(
            Arc::new(provider),
            CredentialScope::new("eu/services/portshift_request").unwrap(),
        );
        let result = verifier.verify(&signed_request(TEST_SECRET_KEY), now());
        assert!(matches!(result, Err(AuthError::CredentialScopeMismatch(_))));
    }

    #[test]
    fn test_should_reject_date_header_outside_credential_date() {
        let mut request = signed_request(TEST_SECRET_KEY);
        request
            .headers_mut()
            .insert(DATE_HEADER, "20240102T000000Z".parse().unwrap());
        let result = verifier().verify(&request, now());
        assert!(matches!(result, Err(AuthError::InvalidDate(_))));
    }

    #[test]
    fn test_should_require_host_to_be_signed() {
        let mut request = signed_request(TEST_SECRET_KEY);
        let auth = request.headers()[AUTH_HEADER]
            .to_str()
            .unwrap()
            .replace("SignedHeaders=host;x-escher-date", "SignedHeaders=x-escher-date");
        request
            .headers_mut()
            .insert(AUTH_HEADER, auth.parse().unwrap());
        let result = verifier().verify(&request, now());
        assert!(matches!(result, Err(AuthError::UnsignedMandatoryHeader(h)) if h == "host"));
    }

    #[test]
    fn test_should_reject_missing_signed_header() {
        let mut request = signed_request(TEST_SECRET_KEY);
        let auth = request.headers()[AUTH_HEADER]
            .to_str()
            .unwrap()
            .replace(
                "SignedHeaders=host;x-escher-date",
                "SignedHeaders=content-type;host;x-escher-date",
            );
        request
            .headers_mut()
            .insert(AUTH_HEADER, auth.parse().unwrap());
        request.headers_mut().remove("content-type");

        let result = verifier().verify(&request, now());

        assert!(matches!(
            &result,
            Err(AuthError::UnverifiableHeader(h)) if h == "content-type"
        ));
        assert_eq!(result.unwrap_err().kind(), AuthErrorKind::Rejected);
    }

    #[test]
    fn test_should_reject_missing_date_header() {
        let mut request = signed_request(TEST_SECRET_KEY);
        request.headers_mut().remove(DATE_HEADER);

        let result = verifier().verify(&request, now());

        assert!(matches!(&result, Err(AuthError::UnverifiableHeader(h)) if h == DATE_HEADER));
        assert_eq!(result.unwrap_err().kind(), AuthErrorKind::Rejected);
    }
}
