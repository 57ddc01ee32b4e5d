pub mod api;
pub mod challenge;
pub mod logging;

use clap::{
    ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("crucial-auth")
        .about("Send a privileged request, re-verifying with a face challenge when asked")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles);

    let command = api::with_args(command);
    let command = challenge::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "crucial-auth",
        "--api-base-url",
        "https://lms.example.com",
        "--path",
        "/api/secure-action",
        "--capture",
        "/tmp/face.jpg",
    ];

    fn with_cleared_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars(
            [
                ("CRUCIAL_API_BASE_URL", None::<&str>),
                ("CRUCIAL_CAPTURE", None),
                ("CRUCIAL_LOG_LEVEL", None),
            ],
            f,
        )
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "crucial-auth");
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        assert!(command.get_about().is_some());
    }

    #[test]
    fn test_required_args() {
        with_cleared_env(|| {
            let result = new().try_get_matches_from(["crucial-auth", "--path", "/api"]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
            assert!(new().try_get_matches_from(REQUIRED).is_ok());
        });
    }

    #[test]
    fn test_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("CRUCIAL_LOG_LEVEL", Some(level)),
                    ("CRUCIAL_API_BASE_URL", Some("https://lms.example.com")),
                    ("CRUCIAL_CAPTURE", Some("/tmp/face.jpg")),
                ],
                || {
                    let matches =
                        new().get_matches_from(["crucial-auth", "--path", "/api/secure-action"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_log_level_verbosity() {
        for index in 0..5 {
            with_cleared_env(|| {
                let mut args: Vec<String> = REQUIRED.iter().map(ToString::to_string).collect();
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
