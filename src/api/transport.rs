//! Transport used for initial privileged calls, replays and verification uploads.
//!
//! `HttpTransport` keeps request construction, timeouts and error mapping in one
//! place. Non-success statuses are returned as responses, not errors, because the
//! caller needs to inspect them for the "verification required" signal.
//!
//! Security boundary: the bearer token comes from the injected credential store
//! and is marked sensitive on the outgoing header; it is never logged.

use super::{ApiError, ApiResponse, RequestDescriptor, build_url_with_base, decode_body};
use crate::session::CredentialStore;
use async_trait::async_trait;
use http::{HeaderValue, header};
use secrecy::ExposeSecret;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, instrument};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends a described request and returns the response whatever its status.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse, ApiError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<Arc<dyn CredentialStore>>,
}

impl HttpTransport {
    /// Build a transport for the given API base URL.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the base URL is not an absolute http(s) URL or
    /// the HTTP client cannot be constructed.
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|err| ApiError::Config(format!("Invalid API base URL: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "Invalid API base URL: unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim().to_string(),
            credentials: None,
        })
    }

    #[must_use]
    pub fn with_credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Full URL for an API path.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the path does not start with `/`.
    pub fn endpoint_url(&self, path: &str) -> Result<String, ApiError> {
        if !path.starts_with('/') {
            return Err(ApiError::Config(format!("API path must start with /: {path}")));
        }
        Ok(build_url_with_base(&self.base_url, path))
    }

    fn bearer(&self) -> Result<Option<HeaderValue>, ApiError> {
        let Some(token) = self
            .credentials
            .as_ref()
            .and_then(|store| store.access_token())
        else {
            return Ok(None);
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| ApiError::Config("Access token is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        Ok(Some(value))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(request_id = %request.id(), method = %request.method(), path = request.path()))]
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint_url(request.path())?;
        debug!("api request: {} {}", request.method(), url);

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some(bearer) = self.bearer()? {
            builder = builder.header(header::AUTHORIZATION, bearer);
        }
        builder = builder.headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        debug!("api response: {} {}", status, url);

        Ok(ApiResponse {
            url,
            status,
            headers,
            body: decode_body(&text),
        })
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials.as_ref().map(|_| "***"))
            .finish()
    }
}
