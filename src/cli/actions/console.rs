//! Line-based challenge UI.
//!
//! Consumes presenter events at the root of the binary: each `Present` opens a
//! [`ChallengeSession`] and walks the user through permission and verification.
//! Enter continues, `c` (or end of input) cancels. A dismiss from the manager
//! closes the open session while the prompt is waiting.

use crate::challenge::{ChallengeDevices, ChallengeSession, ChallengeState, VerificationError};
use crate::crucial::PresenterEvent;
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

pub struct ConsoleUi<R, W> {
    events: UnboundedReceiver<PresenterEvent>,
    devices: ChallengeDevices,
    input: Lines<R>,
    output: W,
}

impl<R, W> ConsoleUi<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        events: UnboundedReceiver<PresenterEvent>,
        devices: ChallengeDevices,
        input: R,
        output: W,
    ) -> Self {
        Self {
            events,
            devices,
            input: input.lines(),
            output,
        }
    }

    /// Serve challenges until the presenter goes away.
    ///
    /// # Errors
    /// Returns an error if the console cannot be read or written.
    pub async fn run(&mut self) -> Result<()> {
        let mut pending = None;
        loop {
            let event = match pending.take() {
                Some(event) => event,
                None => match self.events.recv().await {
                    Some(event) => event,
                    None => return Ok(()),
                },
            };
            match event {
                PresenterEvent::Present(prompt) => {
                    let session = ChallengeSession::open(prompt, &self.devices);
                    pending = self.drive(&session).await?;
                }
                PresenterEvent::Dismiss { generation } => {
                    debug!(generation, "challenge dismissed");
                }
            }
        }
    }

    /// Walk one session until it ends or the manager dismisses it.
    ///
    /// Returns an event that arrived for a later challenge, if any.
    async fn drive(&mut self, session: &ChallengeSession) -> Result<Option<PresenterEvent>> {
        let context = session.context();
        writeln!(self.output, "\n{}\n{}", context.title, context.description)?;

        loop {
            let state = session.state();
            let next = match state {
                ChallengeState::PermissionPending => match session.request_permission().await {
                    Ok(_) => continue,
                    Err(VerificationError::InvalidState(_)) => return Ok(None),
                    Err(err) => {
                        writeln!(self.output, "{err}")?;
                        "retry camera access"
                    }
                },
                ChallengeState::Ready => "verify",
                _ => return Ok(None),
            };

            write!(self.output, "Press Enter to {next}, or type c to cancel: ")?;
            self.output.flush()?;

            let line = loop {
                tokio::select! {
                    line = self.input.next_line() => break line?,
                    event = self.events.recv() => match event {
                        Some(PresenterEvent::Dismiss { generation })
                            if generation != session.generation() =>
                        {
                            debug!(generation, "ignoring dismiss for another challenge");
                        }
                        Some(PresenterEvent::Dismiss { .. }) | None => {
                            writeln!(self.output, "\nVerification closed.")?;
                            return Ok(None);
                        }
                        Some(event) => return Ok(Some(event)),
                    },
                }
            };
            if matches!(line.as_deref().map(str::trim), None | Some("c" | "cancel")) {
                session.cancel();
                writeln!(self.output, "Verification cancelled.")?;
                return Ok(None);
            }

            if state != ChallengeState::Ready {
                continue;
            }

            match session.verify().await {
                Ok(receipt) => {
                    writeln!(self.output, "{}", receipt.message)?;
                    return Ok(None);
                }
                Err(VerificationError::InvalidState(_)) => return Ok(None),
                Err(err) => writeln!(self.output, "{err}")?,
            }
        }
    }
}
