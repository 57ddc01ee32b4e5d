//! Maps validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, invoke::Args};
use crate::cli::commands::{api, challenge};
use anyhow::Result;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let api = api::Options::parse(matches)?;
    let challenge = challenge::Options::parse(matches)?;

    Ok(Action::Invoke(Args { api, challenge }))
}
