//! [`RequestView`]/[`SignableRequest`] adapter over `reqwest::Request`.

use std::borrow::Cow;

use securecn_auth::AuthError;
use securecn_auth::request::{
    RequestView, SignableRequest, collect_header_pairs, insert_header,
};

/// Borrows a `reqwest::Request` so it can be signed in place.
///
/// A request without a body canonicalizes as an empty body. A streaming body
/// cannot be hashed and fails with [`AuthError::UnreadableBody`].
#[derive(Debug)]
pub struct ReqwestRequest<'a>(&'a mut reqwest::Request);

impl<'a> ReqwestRequest<'a> {
    /// Wrap `request`.
    #[must_use]
    pub fn new(request: &'a mut reqwest::Request) -> Self {
        Self(request)
    }
}

impl RequestView for ReqwestRequest<'_> {
    fn method(&self) -> &str {
        self.0.method().as_str()
    }

    fn path(&self) -> &str {
        self.0.url().path()
    }

    fn query(&self) -> Option<&str> {
        self.0.url().query()
    }

    fn header_pairs(&self) -> Result<Vec<(&str, &str)>, AuthError> {
        collect_header_pairs(self.0.headers())
    }

    fn body(&self) -> Result<&[u8], AuthError> {
        match self.0.body() {
            None => Ok(&[]),
            Some(body) => body.as_bytes().ok_or(AuthError::UnreadableBody),
        }
    }

    fn authority(&self) -> Option<Cow<'_, str>> {
        let url = self.0.url();
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => Cow::Owned(format!("{host}:{port}")),
            None => Cow::Borrowed(host),
        })
    }
}

impl SignableRequest for ReqwestRequest<'_> {
    fn set_header(&mut self, name: &'static str, value: &str) -> Result<(), AuthError> {
        insert_header(self.0.headers_mut(), name, value)
    }
}
