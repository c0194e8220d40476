use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A 401 from the backend. Recoverable on a first attempt, terminal
    /// once the request has been retried or the refresh failed.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Http {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Maximum length for error response bodies in log output
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Best-effort human readable message from a JSON error body.
    /// Looks at `message` first, then `error`.
    fn extract_message(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        ["message", "error"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find_map(|field| field.as_str())
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body).unwrap_or_else(|| {
            if !body.is_empty() {
                debug!(status = status.as_u16(), body = %Self::truncate_body(body), "Unstructured error body");
            }
            format!("HTTP {}", status.as_u16())
        });

        if status == reqwest::StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Http { status, message }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// HTTP status of the failed call, when the backend answered.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ApiError::Unauthorized(_) => Some(reqwest::StatusCode::UNAUTHORIZED),
            ApiError::Http { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_message_field_preferred() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message": "Receita não encontrada", "error": "Bad Request"}"#,
        );
        assert_eq!(err.to_string(), "Receita não encontrada");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_error_field_fallback() {
        let err = ApiError::from_status(StatusCode::CONFLICT, r#"{"error": "Email already in use"}"#);
        assert_eq!(err.to_string(), "Email already in use");
    }

    #[test]
    fn test_generic_message_for_unparseable_body() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>upstream down</html>");
        assert_eq!(err.to_string(), "HTTP 502");

        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.to_string(), "HTTP 500");

        let err = ApiError::from_status(StatusCode::NOT_FOUND, r#"{"message": 42}"#);
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn test_unauthorized_classification() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message": "Token expired"}"#);
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Token expired");

        let err = ApiError::from_status(StatusCode::FORBIDDEN, "{}");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
