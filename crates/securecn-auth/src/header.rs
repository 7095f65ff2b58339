//! Authentication header formatting and injection.
//!
//! A signed request carries exactly two extra headers:
//!
//! ```text
//! X-Escher-Auth: ESR-HMAC-SHA256 Credential=AKID/20240101/global/services/portshift_request,
//!                SignedHeaders=host;x-escher-date, Signature=<hex>
//! X-Escher-Date: 20240101T000000Z
//! ```
//!
//! Both are written with overwrite semantics so re-signing a request (for
//! example on retry) never leaves duplicates behind.

use crate::error::AuthError;
use crate::request::SignableRequest;
use crate::signer::ALGORITHM;

/// Name of the header carrying the signature.
pub const AUTH_HEADER: &str = "x-escher-auth";

/// Name of the header carrying the signing timestamp.
pub const DATE_HEADER: &str = "x-escher-date";

/// Name of the host header, which is always signed.
pub const HOST_HEADER: &str = "host";

/// The two header values produced by signing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value for [`AUTH_HEADER`].
    pub authorization: String,
    /// Value for [`DATE_HEADER`], in `YYYYMMDD'T'HHMMSS'Z'` form.
    pub date: String,
}

/// Format the auth header value.
///
/// `dated_scope` is `<short date>/<credential scope>`.
///
/// # Examples
///
/// ```
/// use securecn_auth::header::format_authorization_header;
///
/// let value = format_authorization_header(
///     "AKIDEXAMPLE",
///     "20240101/global/services/portshift_request",
///     "host;x-escher-date",
///     "00ff",
/// );
/// assert_eq!(
///     value,
///     "ESR-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/global/services/portshift_request, \
///      SignedHeaders=host;x-escher-date, Signature=00ff"
/// );
/// ```
#[must_use]
pub fn format_authorization_header(
    access_key_id: &str,
    dated_scope: &str,
    signed_headers: &str,
    signature: &str,
) -> String {
    format!(
        "{ALGORITHM} Credential={access_key_id}/{dated_scope}, SignedHeaders={signed_headers}, Signature={signature}"
    )
}

/// Write the auth and date headers onto `request`, replacing any previous values.
///
/// # Errors
///
/// Returns [`AuthError::HeaderWrite`] if either header cannot be set.
pub fn apply_signed_headers<R: SignableRequest + ?Sized>(
    request: &mut R,
    headers: &SignedHeaders,
) -> Result<(), AuthError> {
    request.set_header(DATE_HEADER, &headers.date)?;
    request.set_header(AUTH_HEADER, &headers.authorization)
}
