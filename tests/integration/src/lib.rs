//! Integration tests for SecureCN request signing.
//!
//! Each test starts an in-process HTTP server on `127.0.0.1:0` that verifies
//! Escher signatures the way the management API does, then drives it with the
//! `reqwest`-based [`securecn_client::SecureCnClient`].
//!
//! Run them with:
//! ```text
//! cargo test -p securecn-integration
//! ```

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use parking_lot::Mutex;
use securecn_auth::{
    AUTH_HEADER, CredentialScope, Credentials, DATE_HEADER, EscherVerifier,
    StaticCredentialProvider,
};
use securecn_client::SecureCnClient;
use securecn_core::SecureCnConfig;
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Access key ID the mock server accepts.
pub const TEST_ACCESS_KEY: &str = "AKIDEXAMPLE";

/// Base64 of the secret the mock server holds for [`TEST_ACCESS_KEY`].
pub const TEST_SECRET_KEY_B64: &str = "d0phbHJYVXRuRkVNSS9LN01ERU5HK2JQeFJmaUNZRVhBTVBMRUtFWQ==";

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// The signing headers of one request the server received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Method and path.
    pub target: String,
    /// Every auth header value, in order.
    pub auth_headers: Vec<String>,
    /// Every date header value, in order.
    pub date_headers: Vec<String>,
    /// Whether the signature verified.
    pub verified: bool,
}

struct ServerState {
    verifier: EscherVerifier,
    unavailable_remaining: AtomicUsize,
    recorded: Mutex<Vec<RecordedRequest>>,
}

/// A running in-process SecureCN mock.
#[derive(Debug)]
pub struct MockSecureCn {
    /// The endpoint URL where the server is listening.
    pub endpoint: String,
    state: Arc<ServerState>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl MockSecureCn {
    /// Start a server that verifies every request.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_unavailable(0).await
    }

    /// Start a server that answers the first `unavailable` requests with 503.
    pub async fn start_with_unavailable(unavailable: usize) -> anyhow::Result<Self> {
        init_tracing();

        let credentials = Credentials::from_base64(TEST_ACCESS_KEY, TEST_SECRET_KEY_B64)?;
        let provider = StaticCredentialProvider::new([credentials]);
        let state = Arc::new(ServerState {
            verifier: EscherVerifier::new(Arc::new(provider), CredentialScope::securecn()),
            unavailable_remaining: AtomicUsize::new(unavailable),
            recorded: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let endpoint = format!("http://{}", listener.local_addr()?);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { continue };
                        let state = Arc::clone(&server_state);
                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle(req, Arc::clone(&state)));
                            if let Err(e) = HttpConnBuilder::new(TokioExecutor::new())
                                .serve_connection(TokioIo::new(stream), service)
                                .await
                            {
                                debug!(error = %e, "Connection closed with error");
                            }
                        });
                    }
                }
            }
        });

        Ok(Self {
            endpoint,
            state,
            shutdown_tx,
        })
    }

    /// Requests received so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.state.recorded.lock().clone()
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn config(&self, secret_key_b64: &str, max_retries: u32) -> SecureCnConfig {
        SecureCnConfig::builder()
            .url(self.endpoint.clone())
            .access_key(TEST_ACCESS_KEY.into())
            .secret_key(secret_key_b64.into())
            .request_timeout_secs(5)
            .max_retries(max_retries)
            .build()
    }

    /// A client for this server with the accepted credentials.
    pub fn client(&self, max_retries: u32) -> anyhow::Result<SecureCnClient> {
        let client = SecureCnClient::from_config(&self.config(TEST_SECRET_KEY_B64, max_retries))?;
        Ok(client.with_retry_base_delay(std::time::Duration::from_millis(10)))
    }

    /// Stop the server.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return Ok(json_response(StatusCode::BAD_REQUEST, r#"{"message":"bad body"}"#));
        }
    };
    let request = http::Request::from_parts(parts, body.to_vec());
    let target = format!("{} {}", request.method(), request.uri());

    let unavailable = state
        .unavailable_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();

    let verification = state.verifier.verify(&request, chrono::Utc::now());
    state.recorded.lock().push(RecordedRequest {
        target: target.clone(),
        auth_headers: header_values(&request, AUTH_HEADER),
        date_headers: header_values(&request, DATE_HEADER),
        verified: verification.is_ok(),
    });

    if unavailable {
        return Ok(json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"message":"try again"}"#,
        ));
    }

    Ok(match verification {
        Ok(auth) => {
            let body = serde_json::json!({
                "accessKeyId": auth.access_key_id,
                "target": target,
                "body": String::from_utf8_lossy(request.body()),
            });
            json_response(StatusCode::OK, &body.to_string())
        }
        Err(e) => {
            debug!(error = %e, "Rejected request");
            let body = serde_json::json!({ "message": e.to_string() });
            json_response(StatusCode::UNAUTHORIZED, &body.to_string())
        }
    })
}

fn header_values(request: &http::Request<Vec<u8>>, name: &str) -> Vec<String> {
    request
        .headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToOwned::to_owned))
        .collect()
}

fn json_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_owned())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

mod test_retry;
mod test_signing;
