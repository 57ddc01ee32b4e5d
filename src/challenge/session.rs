//! One presentation of the face challenge.
//!
//! Flow Overview: the session starts in `PermissionPending`, moves to `Ready` once
//! the camera is available, and each `verify` runs `Capturing` then `Submitting`.
//! A rejected attempt drops back to `Ready` with the error kept for display; a
//! match ends in `Succeeded`. `cancel` ends in `Cancelled` from any non-terminal
//! state, including while a submission is in flight.
//!
//! Every attempt is numbered. When a capture or submission finishes, its result
//! is applied only if the session is still on that attempt in the expected state,
//! so a late answer after a cancel is dropped.
//!
//! The brightness override is taken on `open` and released exactly once: on the
//! terminal transition, or when the session is dropped.

use super::{
    Brightness, BrightnessGuard, Camera, FaceVerifier, VerificationError, VerificationReceipt,
};
use crate::crucial::{ChallengeContext, ChallengeHandle, ChallengePrompt};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeState {
    PermissionPending,
    Ready,
    Capturing,
    Submitting,
    Succeeded,
    Cancelled,
}

impl ChallengeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled)
    }
}

/// Device collaborators shared by every session.
#[derive(Clone)]
pub struct ChallengeDevices {
    pub camera: Arc<dyn Camera>,
    pub verifier: Arc<dyn FaceVerifier>,
    pub brightness: Arc<dyn Brightness>,
}

impl fmt::Debug for ChallengeDevices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeDevices").finish_non_exhaustive()
    }
}

struct SessionInner {
    state: ChallengeState,
    attempt: u64,
    last_error: Option<VerificationError>,
    status_message: Option<String>,
    brightness: Option<BrightnessGuard>,
}

impl SessionInner {
    /// Move to a terminal state; returns the guard so it is released outside the lock.
    fn settle(&mut self, state: ChallengeState) -> Option<BrightnessGuard> {
        self.state = state;
        self.brightness.take()
    }
}

pub struct ChallengeSession {
    context: ChallengeContext,
    handle: ChallengeHandle,
    camera: Arc<dyn Camera>,
    verifier: Arc<dyn FaceVerifier>,
    inner: Mutex<SessionInner>,
}

impl ChallengeSession {
    /// Show the challenge for `prompt` and take the brightness override.
    #[must_use]
    pub fn open(prompt: ChallengePrompt, devices: &ChallengeDevices) -> Self {
        let brightness = BrightnessGuard::acquire(devices.brightness.clone());
        debug!(generation = prompt.generation(), "challenge session opened");

        Self {
            context: prompt.context().clone(),
            handle: prompt.handle().clone(),
            camera: devices.camera.clone(),
            verifier: devices.verifier.clone(),
            inner: Mutex::new(SessionInner {
                state: ChallengeState::PermissionPending,
                attempt: 0,
                last_error: None,
                status_message: None,
                brightness: Some(brightness),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.handle.generation()
    }

    #[must_use]
    pub fn context(&self) -> &ChallengeContext {
        &self.context
    }

    #[must_use]
    pub fn state(&self) -> ChallengeState {
        self.lock().state
    }

    /// Inline error from the last failed step, cleared when a new attempt starts.
    #[must_use]
    pub fn last_error(&self) -> Option<VerificationError> {
        self.lock().last_error.clone()
    }

    /// Success message returned by the verification endpoint.
    #[must_use]
    pub fn status_message(&self) -> Option<String> {
        self.lock().status_message.clone()
    }

    /// Ask for camera access.
    ///
    /// # Errors
    /// - `VerificationError::PermissionDenied` if access is refused; the session
    ///   stays in `PermissionPending` so the request can be repeated.
    /// - `VerificationError::InvalidState` if the session already ended.
    pub async fn request_permission(&self) -> Result<ChallengeState, VerificationError> {
        match self.state() {
            ChallengeState::PermissionPending => {}
            state if state.is_terminal() => return Err(VerificationError::InvalidState(state)),
            state => return Ok(state),
        }

        let granted = self.camera.request_permission().await;

        let mut inner = self.lock();
        if inner.state != ChallengeState::PermissionPending {
            return Err(VerificationError::InvalidState(inner.state));
        }
        if granted {
            inner.state = ChallengeState::Ready;
            inner.last_error = None;
            Ok(ChallengeState::Ready)
        } else {
            inner.last_error = Some(VerificationError::PermissionDenied);
            Err(VerificationError::PermissionDenied)
        }
    }

    /// Capture a frame and submit it.
    ///
    /// On a match the session ends in `Succeeded` and reports success to the
    /// manager. On failure it returns to `Ready` and the error is kept for display.
    ///
    /// # Errors
    /// - `VerificationError::InvalidState` if the session is not `Ready`, or was
    ///   cancelled while this attempt was in flight.
    /// - Capture or verification failures from the devices.
    #[instrument(skip(self), fields(generation = self.generation()))]
    pub async fn verify(&self) -> Result<VerificationReceipt, VerificationError> {
        let attempt = {
            let mut inner = self.lock();
            if inner.state != ChallengeState::Ready {
                return Err(VerificationError::InvalidState(inner.state));
            }
            inner.state = ChallengeState::Capturing;
            inner.attempt += 1;
            inner.last_error = None;
            inner.status_message = None;
            inner.attempt
        };

        let image = self.camera.capture().await;
        let image = {
            let mut inner = self.lock();
            if inner.attempt != attempt || inner.state != ChallengeState::Capturing {
                debug!(attempt, "dropping capture for a finished attempt");
                return Err(VerificationError::InvalidState(inner.state));
            }
            match image {
                Ok(image) => {
                    inner.state = ChallengeState::Submitting;
                    image
                }
                Err(err) => {
                    warn!("capture failed: {err}");
                    inner.state = ChallengeState::Ready;
                    inner.last_error = Some(err.clone());
                    return Err(err);
                }
            }
        };

        let verdict = self.verifier.verify(&image).await;
        let released = {
            let mut inner = self.lock();
            if inner.attempt != attempt || inner.state != ChallengeState::Submitting {
                debug!(attempt, "ignoring late verification result");
                return Err(VerificationError::InvalidState(inner.state));
            }
            match &verdict {
                Ok(receipt) => {
                    inner.status_message = Some(receipt.message.clone());
                    inner.settle(ChallengeState::Succeeded)
                }
                Err(err) => {
                    warn!("verification failed: {err}");
                    inner.state = ChallengeState::Ready;
                    inner.last_error = Some(err.clone());
                    return Err(err.clone());
                }
            }
        };
        drop(released);

        info!("face verified");
        if !self.handle.succeeded() {
            warn!("verification succeeded but the privileged call is no longer waiting");
        }
        verdict
    }

    /// Close the challenge without verifying. Returns `false` if it already ended.
    pub fn cancel(&self) -> bool {
        let released = {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                return false;
            }
            inner.settle(ChallengeState::Cancelled)
        };
        drop(released);

        info!(generation = self.generation(), "challenge cancelled by user");
        self.handle.cancelled();
        true
    }
}

impl Drop for ChallengeSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.state.is_terminal() {
            return;
        }
        drop(inner.settle(ChallengeState::Cancelled));
        debug!(generation = self.handle.generation(), "challenge closed without an outcome");
        self.handle.cancelled();
    }
}

impl fmt::Debug for ChallengeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ChallengeSession")
            .field("generation", &self.handle.generation())
            .field("state", &inner.state)
            .field("attempt", &inner.attempt)
            .finish_non_exhaustive()
    }
}
