use super::ChallengeState;
use thiserror::Error;

/// Failures inside one challenge presentation.
///
/// These are recoverable in place: the session returns to `Ready` and the user
/// may retry. They never settle the waiting privileged call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("camera permission was not granted")]
    PermissionDenied,
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("{0}")]
    Rejected(String),
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
    #[error("not possible while the challenge is {0:?}")]
    InvalidState(ChallengeState),
}
