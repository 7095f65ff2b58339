//! Escher-signing HTTP client for the SecureCN management API.
//!
//! [`SecureCnClient`] wraps a `reqwest::Client`. Every send attempt, retries
//! included, is signed with a fresh timestamp immediately before it goes on the
//! wire. [`ReqwestRequest`] adapts `reqwest::Request` to the signer's request
//! interface and can be used directly with other `reqwest` clients.

pub mod client;
pub mod error;
pub mod request;

pub use client::SecureCnClient;
pub use error::ClientError;
pub use request::ReqwestRequest;
