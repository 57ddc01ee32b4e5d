//! Single-flight coordinator for privileged requests awaiting a challenge.
//!
//! Flow Overview: `require_challenge` parks the intercepted request in the pending
//! slot under a fresh generation and presents the challenge. The UI reports back
//! through a `ChallengeHandle`; success hands the request back to the waiting
//! caller, which replays it with the verification marker. Every exit path (success,
//! cancel, replay failure, caller dropped) clears the slot and dismisses the UI.
//!
//! Invariants:
//! - The slot holds at most one request. Challenges are serialized by a fair async
//!   lock, so a second interception waits for the first to settle instead of
//!   overwriting it.
//! - A report is honored only if its generation matches the awaiting request, so
//!   late or duplicate callbacks cannot settle anything twice.

use super::{
    error::CrucialError,
    presenter::{ChallengeContext, ChallengeHandle, ChallengePresenter, ChallengePrompt},
};
use crate::api::{ApiResponse, RequestDescriptor, Transport};
use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{Mutex as FlightLock, oneshot};
use tracing::{debug, info, instrument, warn};

enum ChallengeOutcome {
    Verified(RequestDescriptor),
    Cancelled,
}

struct PendingPrivilegedRequest {
    generation: u64,
    descriptor: RequestDescriptor,
    completion: oneshot::Sender<ChallengeOutcome>,
}

enum Slot {
    Idle,
    Awaiting(PendingPrivilegedRequest),
    Replaying { generation: u64 },
}

impl Slot {
    fn generation(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Awaiting(pending) => Some(pending.generation),
            Self::Replaying { generation } => Some(*generation),
        }
    }
}

pub(crate) struct ManagerState {
    slot: Mutex<Slot>,
    generation: AtomicU64,
    flight: FlightLock<()>,
    transport: Arc<dyn Transport>,
    presenter: Arc<dyn ChallengePresenter>,
}

impl ManagerState {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn on_challenge_succeeded(&self, generation: u64) -> bool {
        let mut slot = self.lock_slot();
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Awaiting(pending) if pending.generation == generation => {
                *slot = Slot::Replaying { generation };
                drop(slot);
                debug!(generation, "challenge succeeded");
                pending
                    .completion
                    .send(ChallengeOutcome::Verified(pending.descriptor))
                    .is_ok()
            }
            other => {
                *slot = other;
                debug!(generation, "ignoring stale challenge success");
                false
            }
        }
    }

    pub(crate) fn on_challenge_cancelled(&self, generation: u64) -> bool {
        let mut slot = self.lock_slot();
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Awaiting(pending) if pending.generation == generation => {
                drop(slot);
                debug!(generation, "challenge cancelled");
                pending.completion.send(ChallengeOutcome::Cancelled).is_ok()
            }
            other => {
                *slot = other;
                debug!(generation, "ignoring stale challenge cancellation");
                false
            }
        }
    }
}

/// Clears the slot and dismisses the UI when the owning call finishes or is dropped.
struct SlotGuard<'a> {
    state: &'a ManagerState,
    generation: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.state.lock_slot();
        if slot.generation() == Some(self.generation) {
            *slot = Slot::Idle;
        }
        drop(slot);
        self.state.presenter.dismiss(self.generation);
    }
}

/// Coordinator for "this action needs a fresh biometric proof".
///
/// Construct one at the root of the application and share clones of it; all clones
/// use the same pending slot.
#[derive(Clone)]
pub struct CrucialAuthManager {
    state: Arc<ManagerState>,
}

impl CrucialAuthManager {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, presenter: Arc<dyn ChallengePresenter>) -> Self {
        Self {
            state: Arc::new(ManagerState {
                slot: Mutex::new(Slot::Idle),
                generation: AtomicU64::new(0),
                flight: FlightLock::new(()),
                transport,
                presenter,
            }),
        }
    }

    /// Park `descriptor`, present a challenge and wait for its outcome.
    ///
    /// Resolves with the replayed response once the challenge succeeds and the
    /// replay returns a success status. If another challenge is in progress this
    /// call waits for it to settle first.
    ///
    /// # Errors
    /// - `CrucialError::Cancelled` if the user declines the challenge.
    /// - `CrucialError::Replay` if the replay fails, carrying the transport error.
    /// - `CrucialError::Abandoned` if the outcome channel closes without a report.
    #[instrument(skip_all, fields(request_id = %descriptor.id(), method = %descriptor.method(), path = descriptor.path()))]
    pub async fn require_challenge(
        &self,
        descriptor: RequestDescriptor,
        context: Option<ChallengeContext>,
    ) -> Result<ApiResponse, CrucialError> {
        let _flight = self.state.flight.lock().await;

        let generation = self.state.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (completion, outcome) = oneshot::channel();
        {
            let mut slot = self.state.lock_slot();
            debug_assert!(matches!(*slot, Slot::Idle), "pending slot must be idle");
            *slot = Slot::Awaiting(PendingPrivilegedRequest {
                generation,
                descriptor,
                completion,
            });
        }
        let guard = SlotGuard {
            state: &self.state,
            generation,
        };

        info!(generation, "crucial verification required");
        let handle = ChallengeHandle::new(&self.state, generation);
        self.state
            .presenter
            .present(ChallengePrompt::new(context.unwrap_or_default(), handle));

        let result = match outcome.await {
            Ok(ChallengeOutcome::Verified(descriptor)) => self.replay(descriptor).await,
            Ok(ChallengeOutcome::Cancelled) => Err(CrucialError::Cancelled),
            Err(_) => {
                warn!(generation, "challenge outcome channel closed");
                Err(CrucialError::Abandoned)
            }
        };

        drop(guard);
        result
    }

    async fn replay(&self, descriptor: RequestDescriptor) -> Result<ApiResponse, CrucialError> {
        let descriptor = descriptor.into_verified();
        let response = self
            .state
            .transport
            .send(&descriptor)
            .await
            .map_err(|err| {
                warn!("replay failed: {err}");
                CrucialError::Replay(err)
            })?;

        match response.error_for_status() {
            Ok(response) => {
                info!(status = %response.status, "replay succeeded");
                Ok(response)
            }
            Err(err) => {
                warn!("replay rejected: {err}");
                Err(CrucialError::Replay(err))
            }
        }
    }

    /// Whether a request is currently parked or being replayed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending_generation().is_some()
    }

    #[must_use]
    pub fn pending_generation(&self) -> Option<u64> {
        self.state.lock_slot().generation()
    }
}

impl fmt::Debug for CrucialAuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrucialAuthManager")
            .field("pending_generation", &self.pending_generation())
            .finish_non_exhaustive()
    }
}
