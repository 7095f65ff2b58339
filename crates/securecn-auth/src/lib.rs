//! Escher (`ESR-HMAC-SHA256`) request signing for the SecureCN management API.
//!
//! Every call the SecureCN provider makes to the management API carries two
//! extra headers: `X-Escher-Date`, the signing timestamp, and `X-Escher-Auth`,
//! an HMAC-SHA256 signature over a canonical form of the request. This crate
//! computes those headers on the client side and can verify them on the
//! receiving side for tests and local mocks.
//!
//! # Usage
//!
//! ```rust
//! use securecn_auth::credentials::{CredentialScope, Credentials};
//! use securecn_auth::header::{AUTH_HEADER, DATE_HEADER};
//! use securecn_auth::signer::EscherSigner;
//!
//! let credentials = Credentials::from_base64(
//!     "AKIDEXAMPLE",
//!     "d0phbHJYVXRuRkVNSS9LN01ERU5HK2JQeFJmaUNZRVhBTVBMRUtFWQ==",
//! )
//! .unwrap();
//! let signer = EscherSigner::new(credentials, CredentialScope::securecn());
//!
//! let mut request = http::Request::builder()
//!     .method("GET")
//!     .uri("https://securecn.cisco.com/api/kubernetesClusters?limit=10")
//!     .body(Vec::new())
//!     .unwrap();
//! signer.authenticate_request(&mut request).unwrap();
//!
//! assert!(request.headers().contains_key(AUTH_HEADER));
//! assert!(request.headers().contains_key(DATE_HEADER));
//! ```
//!
//! # Modules
//!
//! - [`authenticator`] - Configured-or-not authenticator shared by a provider instance
//! - [`cache`] - Per-date signing key cache
//! - [`canonical`] - Canonical request construction
//! - [`credentials`] - Access key, secret key, credential scope, and credential lookup
//! - [`error`] - Authentication error types
//! - [`header`] - Auth and date header formatting and injection
//! - [`request`] - The request interface the signer reads and writes through
//! - [`signer`] - Key derivation, string to sign, and request signing
//! - [`verify`] - Signature verification for test servers and mocks

pub mod authenticator;
pub mod cache;
pub mod canonical;
pub mod credentials;
pub mod error;
pub mod header;
pub mod request;
pub mod signer;
pub mod verify;

pub use authenticator::{AuthenticatorState, RequestAuthenticator};
pub use credentials::{
    CredentialProvider, CredentialScope, Credentials, SecretKey, StaticCredentialProvider,
};
pub use error::{AuthError, AuthErrorKind};
pub use header::{AUTH_HEADER, DATE_HEADER, SignedHeaders};
pub use request::{RequestView, SignableRequest};
pub use signer::{EscherSigner, RequestSignature, SigningTime};
pub use verify::{AuthResult, EscherVerifier};
