//! UI side of the challenge contract.

use super::manager::ManagerState;
use std::{
    fmt,
    sync::{Arc, Weak},
};
use tokio::sync::mpsc;
use tracing::warn;

const DEFAULT_TITLE: &str = "Verify it's you";
const DEFAULT_DESCRIPTION: &str = "This action requires face verification.";

/// Display strings for one challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext {
    pub title: String,
    pub description: String,
}

impl ChallengeContext {
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

impl Default for ChallengeContext {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_DESCRIPTION)
    }
}

/// Reports the outcome of one presentation back to the manager.
///
/// Only the first report for a generation is honored; later or stale reports
/// return `false` and change nothing.
#[derive(Clone)]
pub struct ChallengeHandle {
    state: Weak<ManagerState>,
    generation: u64,
}

impl ChallengeHandle {
    pub(crate) fn new(state: &Arc<ManagerState>, generation: u64) -> Self {
        Self {
            state: Arc::downgrade(state),
            generation,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The user passed the challenge; the manager replays the parked request.
    pub fn succeeded(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.on_challenge_succeeded(self.generation))
    }

    /// The user declined; the waiting caller fails with `CrucialError::Cancelled`.
    pub fn cancelled(&self) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.on_challenge_cancelled(self.generation))
    }
}

impl fmt::Debug for ChallengeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// What the UI receives when a challenge must be shown.
#[derive(Debug, Clone)]
pub struct ChallengePrompt {
    context: ChallengeContext,
    handle: ChallengeHandle,
}

impl ChallengePrompt {
    pub(crate) fn new(context: ChallengeContext, handle: ChallengeHandle) -> Self {
        Self { context, handle }
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
    pub fn handle(&self) -> &ChallengeHandle {
        &self.handle
    }
}

/// Observer the manager drives to show and hide the challenge UI.
///
/// `present` is called once per challenge; `dismiss` follows once the pending
/// request is settled, whatever the outcome.
pub trait ChallengePresenter: Send + Sync {
    fn present(&self, prompt: ChallengePrompt);

    fn dismiss(&self, generation: u64);
}

#[derive(Debug, Clone)]
pub enum PresenterEvent {
    Present(ChallengePrompt),
    Dismiss { generation: u64 },
}

/// Forwards presenter calls to a single consumer, typically the root UI loop.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    events: mpsc::UnboundedSender<PresenterEvent>,
}

impl ChannelPresenter {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PresenterEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }
}

impl ChallengePresenter for ChannelPresenter {
    fn present(&self, prompt: ChallengePrompt) {
        let handle = prompt.handle().clone();
        if self.events.send(PresenterEvent::Present(prompt)).is_err() {
            // Nobody can answer the challenge, so the caller must not wait forever.
            warn!(
                generation = handle.generation(),
                "challenge UI is gone, cancelling"
            );
            handle.cancelled();
        }
    }

    fn dismiss(&self, generation: u64) {
        let _ = self.events.send(PresenterEvent::Dismiss { generation });
    }
}
