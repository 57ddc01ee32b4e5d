use thiserror::Error;

/// Transport-level failures surfaced to callers and, unchanged, through replays.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Non-success status that is not a verification trigger.
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("unreadable response: {0}")]
    Parse(String),
    #[error("request could not be built: {0}")]
    Serialization(String),
}

impl ApiError {
    /// HTTP status of the failed response, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_builder() {
            Self::Serialization(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn http_error_display_includes_status() {
        let err = ApiError::Http {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "request failed (500): boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn transport_errors_name_their_kind() {
        assert_eq!(
            ApiError::Timeout("after 10s".to_string()).to_string(),
            "request timed out: after 10s"
        );
        assert_eq!(
            ApiError::Config("relative base URL".to_string()).to_string(),
            "invalid client configuration: relative base URL"
        );
    }

    #[test]
    fn non_http_errors_have_no_status() {
        assert_eq!(ApiError::Network("down".to_string()).status(), None);
        assert_eq!(ApiError::Timeout("slow".to_string()).status(), None);
    }
}
