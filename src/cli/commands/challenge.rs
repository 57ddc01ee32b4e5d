//! Face challenge inputs for the console UI.

use crate::challenge::DEFAULT_VERIFY_PATH;
use crate::crucial::ChallengeContext;
use anyhow::{Context, bail};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const ARG_VERIFY_PATH: &str = "verify-path";
pub const ARG_CAPTURE: &str = "capture";
pub const ARG_TITLE: &str = "title";
pub const ARG_DESCRIPTION: &str = "description";

#[derive(Debug, Clone)]
pub struct Options {
    pub verify_path: String,
    pub capture: PathBuf,
    pub context: ChallengeContext,
}

impl Options {
    /// Parse challenge arguments from matches.
    ///
    /// # Errors
    /// Returns an error if `--capture` is missing or `--verify-path` is not absolute.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let verify_path =
            get_non_empty(ARG_VERIFY_PATH).unwrap_or_else(|| DEFAULT_VERIFY_PATH.to_string());
        if !verify_path.starts_with('/') {
            bail!("--{ARG_VERIFY_PATH} must start with /, got {verify_path}");
        }

        let capture = get_non_empty(ARG_CAPTURE)
            .map(PathBuf::from)
            .with_context(|| format!("missing required argument: --{ARG_CAPTURE}"))?;

        let defaults = ChallengeContext::default();
        let context = ChallengeContext::new(
            get_non_empty(ARG_TITLE).unwrap_or(defaults.title),
            get_non_empty(ARG_DESCRIPTION).unwrap_or(defaults.description),
        );

        Ok(Self {
            verify_path,
            capture,
            context,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERIFY_PATH)
                .long(ARG_VERIFY_PATH)
                .help("Face verification endpoint path")
                .env("CRUCIAL_VERIFY_PATH")
                .default_value(DEFAULT_VERIFY_PATH),
        )
        .arg(
            Arg::new(ARG_CAPTURE)
                .short('c')
                .long(ARG_CAPTURE)
                .help("Image file used as the camera frame")
                .env("CRUCIAL_CAPTURE")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TITLE)
                .long(ARG_TITLE)
                .help("Challenge title shown to the user"),
        )
        .arg(
            Arg::new(ARG_DESCRIPTION)
                .long(ARG_DESCRIPTION)
                .help("Challenge description shown to the user"),
        )
}
