use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; the index is the `-v` count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts a count (`0..=5`) or a level name, as set through `CRUCIAL_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|level: &str| -> Result<u8, String> {
        let level = level.trim();
        if let Ok(count) = level.parse::<u8>()
            && count <= 5
        {
            return Ok(count);
        }

        LEVEL_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(level))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level: {level}"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("CRUCIAL_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(level: &str) -> Result<u8, clap::error::ErrorKind> {
        Command::new("log-test")
            .arg(Arg::new("level").long("level").value_parser(validator_log_level()))
            .try_get_matches_from(["log-test", "--level", level])
            .map(|matches| matches.get_one::<u8>("level").copied().unwrap_or_default())
            .map_err(|err| err.kind())
    }

    #[test]
    fn accepts_names_and_counts() {
        for (index, name) in LEVEL_NAMES.iter().enumerate() {
            assert_eq!(parse(name).ok(), u8::try_from(index).ok());
        }
        assert_eq!(parse("DEBUG"), Ok(3));
        assert_eq!(parse("5"), Ok(5));
    }

    #[test]
    fn rejects_unknown_levels() {
        assert_eq!(parse("loud"), Err(clap::error::ErrorKind::ValueValidation));
        assert_eq!(parse("6"), Err(clap::error::ErrorKind::ValueValidation));
    }
}
