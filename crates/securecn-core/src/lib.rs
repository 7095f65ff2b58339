//! Configuration and shared error types for the SecureCN provider.
//!
//! The provider is configured once with the management API URL and an access
//! key pair; every other crate in the workspace takes a [`SecureCnConfig`].

mod config;
mod error;

pub use config::{DEFAULT_URL, SecureCnConfig};
pub use error::{SecureCnError, SecureCnResult};
