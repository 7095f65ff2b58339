//! securecn-sign - print the Escher headers for a SecureCN API request.
//!
//! Signs a described request with the configured access key pair and prints
//! the `X-Escher-Date` and `X-Escher-Auth` headers. With `--show-canonical` it
//! also prints the canonical request and the string to sign, so a request the
//! server rejects can be compared against the server's own computation.
//!
//! # Usage
//!
//! ```text
//! SECURECN_ACCESS_KEY=... SECURECN_SECRET_KEY=... \
//!   securecn-sign -X POST -d '{"name":"test"}' https://securecn.cisco.com/kubernetesClusters
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SECURECN_ACCESS_KEY` | *(required)* | Access key ID |
//! | `SECURECN_SECRET_KEY` | *(required)* | Base64-encoded secret key |
//! | `SECURECN_CREDENTIAL_SCOPE` | `global/services/portshift_request` | Credential scope |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use anyhow::{Context, Result, bail};
use clap::Parser;
use securecn_auth::{
    AUTH_HEADER, CredentialScope, Credentials, DATE_HEADER, EscherSigner, RequestSignature,
    SigningTime,
};
use securecn_core::SecureCnConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Sign a SecureCN management API request and print the Escher headers
#[derive(Parser, Debug)]
#[command(name = "securecn-sign", version, about, long_about = None)]
struct Cli {
    /// Absolute request URL, including any query string
    url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request body
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Extra request header as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Additional header name to include in the signature (repeatable)
    #[arg(long = "sign-header")]
    sign_headers: Vec<String>,

    /// Sign at a fixed `YYYYMMDD'T'HHMMSS'Z'` instant instead of now
    #[arg(long)]
    timestamp: Option<String>,

    /// Access key ID
    #[arg(long, env = "SECURECN_ACCESS_KEY")]
    access_key: Option<String>,

    /// Base64-encoded secret key
    #[arg(long, env = "SECURECN_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Credential scope
    #[arg(long, env = "SECURECN_CREDENTIAL_SCOPE")]
    scope: Option<String>,

    /// Also print the canonical request and the string to sign
    #[arg(long)]
    show_canonical: bool,
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so stdout carries only the headers.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Merge command-line overrides into the environment configuration.
fn load_config(cli: &Cli) -> Result<SecureCnConfig> {
    let mut config = SecureCnConfig::from_env();
    if let Some(access_key) = &cli.access_key {
        config.access_key.clone_from(access_key);
    }
    if let Some(secret_key) = &cli.secret_key {
        config.secret_key.clone_from(secret_key);
    }
    if let Some(scope) = &cli.scope {
        config.credential_scope.clone_from(scope);
    }
    config.validate()?;
    Ok(config)
}

/// Build the request described on the command line.
fn build_request(cli: &Cli) -> Result<http::Request<Vec<u8>>> {
    let mut builder = http::Request::builder()
        .method(cli.method.to_ascii_uppercase().as_str())
        .uri(cli.url.as_str());

    for header in &cli.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header must be `Name: value`, got {header:?}");
        };
        builder = builder.header(name.trim(), value.trim());
    }

    let body = cli.data.clone().unwrap_or_default().into_bytes();
    builder
        .body(body)
        .with_context(|| format!("invalid request {} {}", cli.method, cli.url))
}

fn print_signature(signature: &RequestSignature, show_canonical: bool) {
    if show_canonical {
        println!("--- canonical request ---");
        println!("{}", signature.canonical_request);
        println!("--- string to sign ---");
        println!("{}", signature.string_to_sign);
        println!("---");
    }
    println!("{DATE_HEADER}: {}", signature.headers.date);
    println!("{AUTH_HEADER}: {}", signature.headers.authorization);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.log_level)?;

    let credentials = Credentials::from_base64(&config.access_key, &config.secret_key)
        .context("failed to load SecureCN credentials")?;
    let scope = CredentialScope::new(&config.credential_scope)
        .context("invalid credential scope")?;
    let signer = EscherSigner::new(credentials, scope).with_signed_headers(&cli.sign_headers);

    let time = match &cli.timestamp {
        Some(ts) => SigningTime::parse_long_date(ts).context("invalid --timestamp")?,
        None => SigningTime::now(),
    };

    let request = build_request(&cli)?;
    info!(
        method = %request.method(),
        uri = %request.uri(),
        access_key_id = %signer.access_key_id(),
        time = %time,
        "Signing request"
    );

    let signature = signer
        .sign(&request, time)
        .context("failed to sign request")?;
    print_signature(&signature, cli.show_canonical);

    Ok(())
}
