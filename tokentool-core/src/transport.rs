//! HTTP transport for the Keystone token API.
//!
//! [`KeystoneClient`] posts an [`AuthRequest`] to `{endpoint}/auth/tokens` and
//! hands back the [`RawResponse`]: status, `X-Subject-Token` and body bytes.
//! It never retries; every failure is terminal for the invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::request::AuthRequest;
use crate::store::Secret;

/// Response header carrying the issued token.
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Default timeout for the token request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for the token request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client certificate or key could not be loaded.
    #[error("unusable client certificate {path}: {message}")]
    BadClientCertificate { path: PathBuf, message: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    Client { message: String },

    /// Network failure, timeout, or a non-2xx answer from Keystone.
    #[error("{}", describe_failure(.status, .message))]
    AuthenticationFailed {
        status: Option<u16>,
        message: String,
    },

    /// A 2xx answer that is not a token creation result.
    #[error("unexpected response from identity service: {message}")]
    UnexpectedResponseShape { message: String },
}

fn describe_failure(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("authentication failed with HTTP {}: {}", status, message),
        None => format!("authentication failed: {}", message),
    }
}

/// Whether the response should include the service catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogMode {
    /// Append `?nocatalog`; the response body stays small.
    #[default]
    Suppress,
    /// Ask for the full service catalog.
    Include,
}

/// PEM client certificate and key presented for mutual TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl ClientCertificate {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Load both files into a `reqwest` identity. A single file holding
    /// certificate and key is read once.
    fn load(&self) -> Result<reqwest::Identity, TransportError> {
        let mut pem = read_pem(&self.cert_path)?;
        if self.key_path != self.cert_path {
            if !pem.ends_with(b"\n") {
                pem.push(b'\n');
            }
            pem.extend_from_slice(&read_pem(&self.key_path)?);
        }

        reqwest::Identity::from_pem(&pem).map_err(|e| TransportError::BadClientCertificate {
            path: self.cert_path.clone(),
            message: e.to_string(),
        })
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|e| TransportError::BadClientCertificate {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Options for [`KeystoneClient::new`].
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub client_certificate: Option<ClientCertificate>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            client_certificate: None,
        }
    }
}

/// The raw answer to a successful token request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub subject_token: Secret,
    pub body: Vec<u8>,
}

/// Something that can exchange an [`AuthRequest`] for a token response.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(
        &self,
        request: &AuthRequest,
        catalog: CatalogMode,
    ) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed Keystone client.
#[derive(Debug, Clone)]
pub struct KeystoneClient {
    endpoint: Url,
    http: reqwest::Client,
}

impl KeystoneClient {
    /// Create a client for an identity v3 endpoint.
    pub fn new(endpoint: Url, options: &TransportOptions) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .user_agent(concat!("token-tool/", env!("CARGO_PKG_VERSION")));

        if let Some(certificate) = &options.client_certificate {
            tracing::debug!(cert = %certificate.cert_path.display(), "using client certificate");
            builder = builder.identity(certificate.load()?);
        }

        let http = builder.build().map_err(|e| TransportError::Client {
            message: e.to_string(),
        })?;

        Ok(Self { endpoint, http })
    }

    /// The identity endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// URL of the token creation call.
    pub fn tokens_url(&self, catalog: CatalogMode) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/auth/tokens", url.path().trim_end_matches('/'));
        url.set_path(&path);
        match catalog {
            CatalogMode::Suppress => url.set_query(Some("nocatalog")),
            CatalogMode::Include => url.set_query(None),
        }
        url
    }
}

#[async_trait]
impl TokenIssuer for KeystoneClient {
    async fn issue(
        &self,
        request: &AuthRequest,
        catalog: CatalogMode,
    ) -> Result<RawResponse, TransportError> {
        let url = self.tokens_url(catalog);
        tracing::debug!(%url, method = ?request.method(), "requesting token");
        let payload = request.to_json().map_err(encode_error)?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await
            .map_err(|e| TransportError::AuthenticationFailed {
                status: None,
                message: network_message(&e),
            })?;

        let status = response.status();
        let subject_token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(Secret::new);

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::AuthenticationFailed {
                status: Some(status.as_u16()),
                message: format!("failed to read response body: {}", e),
            })?
            .to_vec();

        if !status.is_success() {
            return Err(TransportError::AuthenticationFailed {
                status: Some(status.as_u16()),
                message: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        let subject_token = subject_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| TransportError::UnexpectedResponseShape {
                message: format!(
                    "HTTP {} without a {} header",
                    status.as_u16(),
                    SUBJECT_TOKEN_HEADER
                ),
            })?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "token issued");

        Ok(RawResponse {
            status: status.as_u16(),
            subject_token,
            body,
        })
    }
}

fn encode_error(error: serde_json::Error) -> TransportError {
    TransportError::Client {
        message: format!("failed to encode request body: {}", error),
    }
}

fn network_message(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("deadline exceeded: {}", error)
    } else {
        error.to_string()
    }
}
