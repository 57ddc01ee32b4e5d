//! # Crucial Auth (privileged action re-verification)
//!
//! `crucial_auth` is the client-side core that keeps privileged API calls working
//! when the backend demands a fresh biometric proof. A request refused with the
//! "verification required" signal is parked, the UI is asked to run a face
//! challenge, and the original request is replayed with the
//! `X-Crucial-Verified: true` marker once the challenge succeeds.
//!
//! ## Flow Overview
//!
//! 1. A caller sends a [`api::RequestDescriptor`] through [`crucial::CrucialClient`].
//! 2. The transport answers with the trigger (HTTP 403 + `CRUCIAL_AUTH_REQUIRED`).
//! 3. [`crucial::CrucialAuthManager`] stores the request in its single pending slot
//!    and asks the [`crucial::ChallengePresenter`] to show the challenge.
//! 4. The UI drives a [`challenge::ChallengeSession`] (permission, capture, submit)
//!    and reports exactly one outcome through the prompt's handle.
//! 5. The caller's future resolves with the replayed response or fails with
//!    [`crucial::CrucialError::Cancelled`].
//!
//! ## Single Flight
//!
//! Challenges never overlap. A second interception waits its turn behind the
//! current one; nothing is overwritten and no caller is left hanging.

pub mod api;
pub mod challenge;
pub mod cli;
pub mod crucial;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
