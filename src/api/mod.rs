//! HTTP plumbing for privileged API calls.
//!
//! Requests are described up front as [`RequestDescriptor`] values so they can be
//! parked while a challenge runs and replayed later with exactly the same method,
//! path, headers and body. Responses come back as [`ApiResponse`] regardless of
//! status; callers decide which statuses are errors.

mod error;
mod transport;

pub use error::ApiError;
pub use transport::{DEFAULT_REQUEST_TIMEOUT, HttpTransport, Transport};

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde_json::Value;
use ulid::Ulid;

/// Marker header attached to replays after a successful challenge.
pub const CRUCIAL_VERIFIED_HEADER: HeaderName = HeaderName::from_static("x-crucial-verified");

/// Maximum number of error body characters surfaced to the UI.
const MAX_ERROR_CHARS: usize = 200;

/// Everything needed to send (and later replay) one API call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    id: Ulid,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Value>,
}

impl RequestDescriptor {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Correlation id, stable across the initial attempt and the replay.
    #[must_use]
    pub fn id(&self) -> Ulid {
        self.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Whether this request already carries the verification marker.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.headers
            .get(CRUCIAL_VERIFIED_HEADER)
            .is_some_and(|value| value == "true")
    }

    /// Same request with the verification marker attached.
    #[must_use]
    pub fn into_verified(self) -> Self {
        self.with_header(CRUCIAL_VERIFIED_HEADER, HeaderValue::from_static("true"))
    }
}

/// Response wrapper for API requests.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Human-readable failure message taken from the body.
    ///
    /// Prefers the JSON `message` field, then `error`, then the raw body.
    #[must_use]
    pub fn error_message(&self) -> String {
        let field = |name: &str| self.body.get(name).and_then(Value::as_str);

        match field("message").or_else(|| field("error")) {
            Some(message) => sanitize_body(message),
            None => match &self.body {
                Value::String(text) => sanitize_body(text),
                Value::Null => sanitize_body(""),
                other => sanitize_body(&other.to_string()),
            },
        }
    }

    /// Convert non-success statuses into [`ApiError::Http`].
    ///
    /// # Errors
    /// Returns `ApiError::Http` with a sanitized message when the status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Http {
                status: self.status.as_u16(),
                message: self.error_message(),
            })
        }
    }
}

/// Builds a URL from an explicit base URL and the provided path.
#[must_use]
pub fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Sanitizes HTTP error bodies for user-facing messages by trimming and truncating.
#[must_use]
pub fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

/// Decode a response body: JSON when possible, plain text otherwise, `Null` when empty.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
