//! The narrow request interface the signer depends on.
//!
//! [`RequestView`] is everything needed to canonicalize a request;
//! [`SignableRequest`] adds the single write the header injector performs.
//! Transports implement these with a thin wrapper instead of the signer
//! reaching into a concrete request type.

use std::borrow::Cow;

use http::HeaderValue;
use http::header::HeaderName;

use crate::error::AuthError;

/// Read-only view of an outbound HTTP request.
pub trait RequestView {
    /// HTTP method, any case.
    fn method(&self) -> &str;

    /// URL path as it will appear on the wire.
    fn path(&self) -> &str;

    /// Raw query string without the leading `?`, if any.
    fn query(&self) -> Option<&str>;

    /// Every header occurrence as `(name, value)`, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeaderValue`] if a value is not valid text.
    fn header_pairs(&self) -> Result<Vec<(&str, &str)>, AuthError>;

    /// The complete request body. Empty for bodiless requests.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnreadableBody`] if the body is not buffered.
    fn body(&self) -> Result<&[u8], AuthError>;

    /// The `host[:port]` the transport will send when no `Host` header is set.
    ///
    /// Userinfo is never part of it, and the port only appears when it differs
    /// from the scheme default.
    fn authority(&self) -> Option<Cow<'_, str>> {
        None
    }
}

/// A request the authentication headers can be written onto.
pub trait SignableRequest: RequestView {
    /// Set `name` to `value`, replacing every existing value of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HeaderWrite`] if the header cannot be set.
    fn set_header(&mut self, name: &'static str, value: &str) -> Result<(), AuthError>;
}

impl<B: AsRef<[u8]>> RequestView for http::Request<B> {
    fn method(&self) -> &str {
        self.method().as_str()
    }

    fn path(&self) -> &str {
        self.uri().path()
    }

    fn query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn header_pairs(&self) -> Result<Vec<(&str, &str)>, AuthError> {
        collect_header_pairs(self.headers())
    }

    fn body(&self) -> Result<&[u8], AuthError> {
        Ok(self.body().as_ref())
    }

    fn authority(&self) -> Option<Cow<'_, str>> {
        let uri = self.uri();
        let host = uri.host()?;
        let default_port = match uri.scheme_str() {
            Some("https") => Some(443),
            Some("http") => Some(80),
            _ => None,
        };
        Some(match uri.port_u16() {
            Some(port) if Some(port) != default_port => Cow::Owned(format!("{host}:{port}")),
            _ => Cow::Borrowed(host),
        })
    }
}

impl<B: AsRef<[u8]>> SignableRequest for http::Request<B> {
    fn set_header(&mut self, name: &'static str, value: &str) -> Result<(), AuthError> {
        insert_header(self.headers_mut(), name, value)
    }
}

/// Collect an `http::HeaderMap` into `(name, value)` pairs.
///
/// Shared by transport adapters built on the `http` types.
///
/// # Errors
///
/// Returns [`AuthError::InvalidHeaderValue`] for values that are not visible ASCII.
pub fn collect_header_pairs(headers: &http::HeaderMap) -> Result<Vec<(&str, &str)>, AuthError> {
    headers
        .iter()
        .map(|(name, value)| {
            value
                .to_str()
                .map(|value| (name.as_str(), value))
                .map_err(|_| AuthError::InvalidHeaderValue(name.as_str().to_owned()))
        })
        .collect()
}

/// Insert a header into an `http::HeaderMap`, replacing existing values.
///
/// # Errors
///
/// Returns [`AuthError::HeaderWrite`] if the name or value is not a valid header.
pub fn insert_header(
    headers: &mut http::HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), AuthError> {
    let header_name =
        HeaderName::from_lowercase(name.as_bytes()).map_err(|e| AuthError::HeaderWrite {
            name: name.to_owned(),
            reason: e.to_string(),
        })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| AuthError::HeaderWrite {
        name: name.to_owned(),
        reason: e.to_string(),
    })?;
    headers.insert(header_name, header_value);
    Ok(())
}
