//! Headless biometric challenge: the state machine behind the face-capture modal.
//!
//! A [`ChallengeSession`] is opened for every [`crate::crucial::ChallengePrompt`].
//! It owns the display brightness override for its whole lifetime and reports
//! exactly one outcome back through the prompt's handle.

mod brightness;
mod camera;
mod error;
mod session;
mod verifier;

pub use brightness::{Brightness, BrightnessGuard, MAX_BRIGHTNESS, SoftwareBrightness};
pub use camera::{Camera, CapturedImage, FileCamera};
pub use error::VerificationError;
pub use session::{ChallengeDevices, ChallengeSession, ChallengeState};
pub use verifier::{DEFAULT_VERIFY_PATH, FaceVerifier, HttpFaceVerifier, VerificationReceipt};
