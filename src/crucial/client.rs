use super::{CrucialAuthManager, CrucialError, presenter::ChallengeContext};
use crate::api::{ApiResponse, RequestDescriptor, Transport};
use http::StatusCode;
use serde_json::Value;
use std::{fmt, sync::Arc};
use tracing::{debug, info, instrument};

/// Error string the backend uses to demand a fresh biometric proof.
pub const DEFAULT_TRIGGER_ERROR: &str = "CRUCIAL_AUTH_REQUIRED";

/// Recognizes the "verification required" response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPolicy {
    pub status: StatusCode,
    pub error_code: String,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            error_code: DEFAULT_TRIGGER_ERROR.to_string(),
        }
    }
}

impl TriggerPolicy {
    /// True when the status matches and the body carries the error code in its
    /// `error` or `code` field, or as the plain-text body.
    #[must_use]
    pub fn matches(&self, response: &ApiResponse) -> bool {
        if response.status != self.status {
            return false;
        }

        let code = self.error_code.as_str();
        match &response.body {
            Value::Object(fields) => ["error", "code"]
                .iter()
                .filter_map(|name| fields.get(*name).and_then(Value::as_str))
                .any(|value| value == code),
            Value::String(text) => text.trim() == code,
            _ => false,
        }
    }
}

/// HTTP client front door: sends privileged requests and routes the trigger
/// response into the challenge flow.
#[derive(Clone)]
pub struct CrucialClient {
    transport: Arc<dyn Transport>,
    manager: CrucialAuthManager,
    trigger: TriggerPolicy,
}

impl CrucialClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, manager: CrucialAuthManager) -> Self {
        Self {
            transport,
            manager,
            trigger: TriggerPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: TriggerPolicy) -> Self {
        self.trigger = trigger;
        self
    }

    #[must_use]
    pub fn manager(&self) -> &CrucialAuthManager {
        &self.manager
    }

    /// Send a request, running a challenge with the default prompt if required.
    ///
    /// # Errors
    /// See [`CrucialClient::send_with_context`].
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, CrucialError> {
        self.send_with_context(descriptor, None).await
    }

    /// Send a request, running a challenge with `context` if required.
    ///
    /// # Errors
    /// - `CrucialError::Request` if the transport fails or answers with a
    ///   non-success status other than the trigger.
    /// - Any error from [`CrucialAuthManager::require_challenge`] once the trigger
    ///   has been seen.
    #[instrument(skip_all, fields(request_id = %descriptor.id(), method = %descriptor.method(), path = descriptor.path()))]
    pub async fn send_with_context(
        &self,
        descriptor: RequestDescriptor,
        context: Option<ChallengeContext>,
    ) -> Result<ApiResponse, CrucialError> {
        let response = self
            .transport
            .send(&descriptor)
            .await
            .map_err(CrucialError::Request)?;

        // A verified replay that trips the trigger again is a plain failure.
        if !descriptor.is_verified() && self.trigger.matches(&response) {
            info!("privileged request needs verification");
            return self.manager.require_challenge(descriptor, context).await;
        }

        debug!(status = %response.status, "privileged request completed");
        response.error_for_status().map_err(CrucialError::Request)
    }
}

impl fmt::Debug for CrucialClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrucialClient")
            .field("manager", &self.manager)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}
