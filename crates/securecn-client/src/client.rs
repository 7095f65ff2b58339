//! Signing, retrying client for the SecureCN management API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use securecn_auth::{CredentialScope, Credentials, EscherSigner, RequestAuthenticator};
use securecn_core::SecureCnConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::request::ReqwestRequest;

/// Delay before the first retry. Doubles on each further attempt.
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound on a single backoff sleep.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Client for the SecureCN management API.
///
/// Cheap to clone; clones share the connection pool and the authenticator.
#[derive(Debug, Clone)]
pub struct SecureCnClient {
    http: reqwest::Client,
    base_url: String,
    authenticator: Arc<RequestAuthenticator>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl SecureCnClient {
    /// Build a client from provider configuration.
    ///
    /// Decodes the secret key once and binds it to a configured authenticator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] for incomplete configuration,
    /// [`ClientError::Auth`] for an undecodable secret or invalid scope, or
    /// [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &SecureCnConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let credentials = Credentials::from_base64(&config.access_key, &config.secret_key)?;
        let scope = CredentialScope::new(&config.credential_scope)?;
        let mut signer = EscherSigner::new(credentials, scope);
        if config.cache_signing_keys {
            signer = signer.with_key_cache();
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        info!(
            url = %config.base_url(),
            access_key_id = %signer.access_key_id(),
            max_retries = config.max_retries,
            "SecureCN client configured"
        );

        Ok(Self {
            http,
            base_url: config.base_url().to_owned(),
            authenticator: Arc::new(RequestAuthenticator::configured(signer)),
            max_retries: config.max_retries,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        })
    }

    /// Override the delay before the first retry.
    #[must_use]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// The authenticator signing this client's requests.
    #[must_use]
    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    /// The base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `method path` with an optional JSON body and return the successful response.
    ///
    /// Each attempt builds a fresh request and signs it immediately before it is
    /// sent. Connection errors and 502/503/504 responses are retried up to the
    /// configured limit with exponential backoff capped at 30 seconds. Timeouts
    /// are retried only for idempotent methods, since a timed-out `POST` may
    /// already have been applied.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] if signing fails (nothing is sent),
    /// [`ClientError::Unauthorized`] for 401/403, [`ClientError::Api`] for other
    /// non-success statuses, or [`ClientError::Http`] for transport failures.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path)?;
        let mut attempt: u32 = 0;

        loop {
            let mut request = build_request(&method, &url, body.as_deref());
            self.authenticator
                .authenticate_request(&mut ReqwestRequest::new(&mut request))?;

            debug!(%method, %url, attempt, "Sending SecureCN request");

            let can_retry = attempt < self.max_retries;
            let retry_reason = match self.http.execute(request).await {
                Ok(response) if can_retry && is_retryable_status(response.status()) => {
                    response.status().to_string()
                }
                Ok(response) => return check_status(response).await,
                Err(e) if can_retry && is_retryable_error(&method, &e) => e.to_string(),
                Err(e) => return Err(e.into()),
            };

            let delay = retry_delay(self.retry_base_delay, attempt);
            warn!(
                %method,
                %url,
                attempt,
                reason = %retry_reason,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying SecureCN request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// `GET path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); also [`ClientError::Http`] if the body is
    /// not valid JSON for `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.execute(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`get_json`](Self::get_json); also [`ClientError::Json`] if `body`
    /// cannot be serialized.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let response = self.execute(Method::POST, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// `PUT path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`post_json`](Self::post_json).
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        let response = self.execute(Method::PUT, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// `DELETE path`, discarding the response body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.execute(Method::DELETE, path, None).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let path = path.trim_start_matches('/');
        let raw = format!("{}/{path}", self.base_url);
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))
    }
}

fn build_request(method: &Method, url: &Url, body: Option<&[u8]>) -> reqwest::Request {
    let mut request = reqwest::Request::new(method.clone(), url.clone());
    let headers = request.headers_mut();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    if let Some(body) = body {
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        *request.body_mut() = Some(body.to_vec().into());
    }
    request
}

fn is_retryable_error(method: &Method, error: &reqwest::Error) -> bool {
    error.is_connect() || (error.is_timeout() && method.is_idempotent())
}

fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_RETRY_DELAY)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        Err(ClientError::Unauthorized {
            status: status.as_u16(),
            message,
        })
    } else {
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
