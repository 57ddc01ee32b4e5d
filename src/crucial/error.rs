use crate::api::ApiError;
use thiserror::Error;

/// Terminal outcomes of a privileged call that did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CrucialError {
    /// The user declined the challenge.
    #[error("verification cancelled")]
    Cancelled,
    /// The request failed even after a successful challenge.
    #[error(transparent)]
    Replay(ApiError),
    /// The initial request failed for a reason unrelated to verification.
    #[error(transparent)]
    Request(ApiError),
    #[error("verification abandoned before an outcome was reported")]
    Abandoned,
}

impl CrucialError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Underlying transport error for replay and request failures.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Replay(err) | Self::Request(err) => Some(err),
            Self::Cancelled | Self::Abandoned => None,
        }
    }
}
