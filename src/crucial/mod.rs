//! Crucial action coordination.
//!
//! [`CrucialAuthManager`] owns the single pending privileged request and runs the
//! challenge-response cycle; [`CrucialClient`] detects the trigger response and
//! hands intercepted requests to the manager. The UI side of the contract is the
//! [`ChallengePresenter`] observer plus the [`ChallengeHandle`] it receives with
//! every prompt.

mod client;
mod error;
mod manager;
mod presenter;

pub use client::{CrucialClient, DEFAULT_TRIGGER_ERROR, TriggerPolicy};
pub use error::CrucialError;
pub use manager::CrucialAuthManager;
pub use presenter::{
    ChallengeContext, ChallengeHandle, ChallengePresenter, ChallengePrompt, ChannelPresenter,
    PresenterEvent,
};
