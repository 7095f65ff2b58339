//! Shared request authenticator.
//!
//! A [`RequestAuthenticator`] is created once per provider instance and is
//! either unconfigured or bound to exactly one [`EscherSigner`]. Binding happens
//! at most once; afterwards the authenticator is read-only and safe to share.

use std::sync::OnceLock;

use tracing::info;

use crate::error::AuthError;
use crate::request::SignableRequest;
use crate::signer::{EscherSigner, SigningTime};

/// Whether an authenticator has credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorState {
    /// No signer has been bound yet. Every authentication attempt fails.
    Unconfigured,
    /// A signer is bound. Authentication attempts sign the request.
    Configured,
}

/// Signs outbound requests once configured with credentials.
#[derive(Debug, Default)]
pub struct RequestAuthenticator {
    signer: OnceLock<EscherSigner>,
}

impl RequestAuthenticator {
    /// Create an unconfigured authenticator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an authenticator already bound to `signer`.
    #[must_use]
    pub fn configured(signer: EscherSigner) -> Self {
        let authenticator = Self::new();
        let _ = authenticator.signer.set(signer);
        authenticator
    }

    /// Bind `signer`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AlreadyConfigured`] if a signer is already bound.
    pub fn configure(&self, signer: EscherSigner) -> Result<(), AuthError> {
        let access_key_id = signer.access_key_id().to_owned();
        self.signer
            .set(signer)
            .map_err(|_| AuthError::AlreadyConfigured)?;
        info!(%access_key_id, "Request authenticator configured");
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AuthenticatorState {
        if self.signer.get().is_some() {
            AuthenticatorState::Configured
        } else {
            AuthenticatorState::Unconfigured
        }
    }

    /// Whether a signer is bound.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.state() == AuthenticatorState::Configured
    }

    /// The bound signer, if any.
    #[must_use]
    pub fn signer(&self) -> Option<&EscherSigner> {
        self.signer.get()
    }

    /// Sign `request` and write the auth and date headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] before [`configure`](Self::configure)
    /// has succeeded, otherwise any error from
    /// [`EscherSigner::authenticate_request`].
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
        self.signer
            .get()
            .ok_or(AuthError::NotConfigured)?
            .authenticate_request_at(request, time)
    }
}
