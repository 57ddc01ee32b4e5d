//! Backend connection and the privileged request to send.

use crate::crucial::DEFAULT_TRIGGER_ERROR;
use anyhow::{Context, bail};
use clap::{Arg, ArgMatches, Command};
use http::{Method, StatusCode};
use secrecy::SecretString;
use serde_json::Value;
use std::time::Duration;

pub const ARG_API_BASE_URL: &str = "api-base-url";
pub const ARG_ACCESS_TOKEN: &str = "access-token";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_REQUEST_TIMEOUT_SECONDS: &str = "request-timeout-seconds";
pub const ARG_TRIGGER_STATUS: &str = "trigger-status";
pub const ARG_TRIGGER_ERROR: &str = "trigger-error";
pub const ARG_METHOD: &str = "method";
pub const ARG_PATH: &str = "path";
pub const ARG_BODY: &str = "body";

#[derive(Debug)]
pub struct Options {
    pub base_url: String,
    pub access_token: Option<SecretString>,
    pub token_ttl: Option<Duration>,
    pub request_timeout: Duration,
    pub trigger_status: StatusCode,
    pub trigger_error: String,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Options {
    /// Parse API arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing or a value is malformed.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = get_non_empty(ARG_API_BASE_URL)
            .with_context(|| format!("missing required argument: --{ARG_API_BASE_URL}"))?;

        let path = get_non_empty(ARG_PATH)
            .with_context(|| format!("missing required argument: --{ARG_PATH}"))?;
        if !path.starts_with('/') {
            bail!("--{ARG_PATH} must start with /, got {path}");
        }

        let method = get_non_empty(ARG_METHOD).unwrap_or_else(|| Method::POST.to_string());
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid --{ARG_METHOD}: {method}"))?;

        let body = get_non_empty(ARG_BODY)
            .map(|raw| serde_json::from_str::<Value>(&raw))
            .transpose()
            .with_context(|| format!("--{ARG_BODY} is not valid JSON"))?;

        let status = matches
            .get_one::<u16>(ARG_TRIGGER_STATUS)
            .copied()
            .unwrap_or(403);
        let trigger_status = StatusCode::from_u16(status)
            .with_context(|| format!("invalid --{ARG_TRIGGER_STATUS}: {status}"))?;

        let timeout = matches
            .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(10);

        Ok(Self {
            base_url,
            access_token: get_non_empty(ARG_ACCESS_TOKEN).map(SecretString::from),
            token_ttl: matches
                .get_one::<u64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .map(Duration::from_secs),
            request_timeout: Duration::from_secs(timeout),
            trigger_status,
            trigger_error: get_non_empty(ARG_TRIGGER_ERROR)
                .unwrap_or_else(|| DEFAULT_TRIGGER_ERROR.to_string()),
            method,
            path,
            body,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_BASE_URL)
                .long(ARG_API_BASE_URL)
                .help("Backend base URL, example: https://lms.example.com")
                .env("CRUCIAL_API_BASE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN)
                .long(ARG_ACCESS_TOKEN)
                .help("Bearer token sent with every request")
                .env("CRUCIAL_ACCESS_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Seconds before the access token is treated as expired")
                .env("CRUCIAL_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_SECONDS)
                .long(ARG_REQUEST_TIMEOUT_SECONDS)
                .help("Per-request timeout in seconds")
                .env("CRUCIAL_REQUEST_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TRIGGER_STATUS)
                .long(ARG_TRIGGER_STATUS)
                .help("HTTP status that signals verification is required")
                .env("CRUCIAL_TRIGGER_STATUS")
                .default_value("403")
                .value_parser(clap::value_parser!(u16).range(400..=599)),
        )
        .arg(
            Arg::new(ARG_TRIGGER_ERROR)
                .long(ARG_TRIGGER_ERROR)
                .help("Error code that signals verification is required")
                .env("CRUCIAL_TRIGGER_ERROR")
                .default_value(DEFAULT_TRIGGER_ERROR),
        )
        .arg(
            Arg::new(ARG_METHOD)
                .short('X')
                .long(ARG_METHOD)
                .help("HTTP method of the privileged request")
                .default_value("POST"),
        )
        .arg(
            Arg::new(ARG_PATH)
                .long(ARG_PATH)
                .help("API path of the privileged request, example: /api/secure-action")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BODY)
                .short('d')
                .long(ARG_BODY)
                .help("JSON body of the privileged request"),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    fn command() -> Command {
        with_args(Command::new("crucial-auth"))
    }

    fn without_env<R>(f: impl FnOnce() -> R) -> R {
        temp_env::with_vars(
            [
                ("CRUCIAL_API_BASE_URL", None::<&str>),
                ("CRUCIAL_ACCESS_TOKEN", None),
                ("CRUCIAL_TOKEN_TTL_SECONDS", None),
                ("CRUCIAL_REQUEST_TIMEOUT_SECONDS", None),
                ("CRUCIAL_TRIGGER_STATUS", None),
                ("CRUCIAL_TRIGGER_ERROR", None),
            ],
            f,
        )
    }

    #[test]
    fn parses_defaults() {
        without_env(|| {
            let matches = command().get_matches_from([
                "crucial-auth",
                "--api-base-url",
                "https://lms.example.com",
                "--path",
                "/api/secure-action",
            ]);
            let options = Options::parse(&matches).unwrap();
            assert_eq!(options.base_url, "https://lms.example.com");
            assert_eq!(options.method, Method::POST);
            assert_eq!(options.trigger_status, StatusCode::FORBIDDEN);
            assert_eq!(options.trigger_error, DEFAULT_TRIGGER_ERROR);
            assert_eq!(options.request_timeout, Duration::from_secs(10));
            assert!(options.access_token.is_none());
            assert!(options.token_ttl.is_none());
            assert!(options.body.is_none());
        });
    }

    #[test]
    fn parses_request_arguments() {
        without_env(|| {
            let matches = command().get_matches_from([
                "crucial-auth",
                "--api-base-url",
                "https://lms.example.com",
                "-X",
                "delete",
                "--path",
                "/api/users/7",
                "--body",
                r#"{"reason": "graduated"}"#,
                "--token-ttl-seconds",
                "900",
            ]);
            let options = Options::parse(&matches).unwrap();
            assert_eq!(options.method, Method::DELETE);
            assert_eq!(options.path, "/api/users/7");
            assert_eq!(options.body, Some(json!({"reason": "graduated"})));
            assert_eq!(options.token_ttl, Some(Duration::from_secs(900)));
        });
    }

    #[test]
    fn reads_environment() {
        temp_env::with_vars(
            [
                ("CRUCIAL_API_BASE_URL", Some("http://127.0.0.1:8080")),
                ("CRUCIAL_ACCESS_TOKEN", Some("token-abc")),
                ("CRUCIAL_REQUEST_TIMEOUT_SECONDS", Some("30")),
                ("CRUCIAL_TRIGGER_STATUS", Some("401")),
                ("CRUCIAL_TRIGGER_ERROR", Some("STEP_UP_REQUIRED")),
            ],
            || {
                let matches =
                    command().get_matches_from(["crucial-auth", "--path", "/api/grades"]);
                let options = Options::parse(&matches).unwrap();
                assert_eq!(options.base_url, "http://127.0.0.1:8080");
                assert_eq!(
                    options.access_token.as_ref().map(ExposeSecret::expose_secret),
                    Some("token-abc")
                );
                assert_eq!(options.request_timeout, Duration::from_secs(30));
                assert_eq!(options.trigger_status, StatusCode::UNAUTHORIZED);
                assert_eq!(options.trigger_error, "STEP_UP_REQUIRED");
            },
        );
    }

    #[test]
    fn rejects_invalid_values() {
        without_env(|| {
            let matches = command().get_matches_from([
                "crucial-auth",
                "--api-base-url",
                "https://lms.example.com",
                "--path",
                "api/no-slash",
            ]);
            let err = Options::parse(&matches).unwrap_err();
            assert!(err.to_string().contains("must start with /"));

            let matches = command().get_matches_from([
                "crucial-auth",
                "--api-base-url",
                "https://lms.example.com",
                "--path",
                "/api/grades",
                "--body",
                "{not json",
            ]);
            let err = Options::parse(&matches).unwrap_err();
            assert!(err.to_string().contains("not valid JSON"));

            let result = command().try_get_matches_from([
                "crucial-auth",
                "--api-base-url",
                "https://lms.example.com",
                "--path",
                "/api/grades",
                "--trigger-status",
                "200",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );
        });
    }

    #[test]
    fn base_url_is_required() {
        without_env(|| {
            let result = command().try_get_matches_from(["crucial-auth", "--path", "/api"]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
