//! Face verification submission.
//!
//! The captured frame is posted as base64 JSON to the verification endpoint. A 2xx
//! answer means the face matched; anything else is a rejection the user may retry.

use super::{CapturedImage, VerificationError};
use crate::api::{ApiError, RequestDescriptor, Transport};
use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use serde::Deserialize;
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::{debug, instrument, warn};

pub const DEFAULT_VERIFY_PATH: &str = "/api/face/verify";

const DEFAULT_SUCCESS_MESSAGE: &str = "Verification succeeded.";

/// Success answer from the verification endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerificationReceipt {
    #[serde(default)]
    pub message: String,
}

#[async_trait]
pub trait FaceVerifier: Send + Sync {
    async fn verify(&self, image: &CapturedImage) -> Result<VerificationReceipt, VerificationError>;
}

#[derive(Clone)]
pub struct HttpFaceVerifier {
    transport: Arc<dyn Transport>,
    path: String,
}

impl HttpFaceVerifier {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }
}

#[async_trait]
impl FaceVerifier for HttpFaceVerifier {
    #[instrument(skip_all, fields(path = %self.path, len = image.bytes.len()))]
    async fn verify(&self, image: &CapturedImage) -> Result<VerificationReceipt, VerificationError> {
        let request = RequestDescriptor::post(self.path.clone()).with_json(json!({
            "image": Base64::encode_string(&image.bytes),
            "mime_type": image.mime_type,
        }));

        let response = self.transport.send(&request).await.map_err(|err| match err {
            ApiError::Timeout(message) | ApiError::Network(message) => {
                VerificationError::Unavailable(message)
            }
            other => VerificationError::Unavailable(other.to_string()),
        })?;

        if !response.is_success() {
            let message = response.error_message();
            warn!(status = %response.status, "face verification rejected: {message}");
            return Err(VerificationError::Rejected(message));
        }

        let mut receipt = serde_json::from_value::<VerificationReceipt>(response.body)
            .unwrap_or(VerificationReceipt {
                message: String::new(),
            });
        if receipt.message.trim().is_empty() {
            receipt.message = DEFAULT_SUCCESS_MESSAGE.to_string();
        }
        debug!("face verification accepted");

        Ok(receipt)
    }
}

impl fmt::Debug for HttpFaceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFaceVerifier")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
