use crate::cli::actions::{Action, invoke};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Invoke(args) => invoke::execute(args).await,
    }
}
