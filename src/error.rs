//! Error types for authbroker
//!
//! This module defines the broker's error taxonomy using `thiserror`.
//! Fallible functions return [`Result`], an `anyhow` alias, and HTTP
//! handlers recover the [`BrokerError`] variant with `downcast_ref` to pick
//! a status code.

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for authbroker operations
///
/// The first group of variants is the broker taxonomy surfaced to HTTP
/// callers. The remaining variants wrap library errors so they can be
/// propagated with `?`.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Unknown registration identifier
    #[error("Registration not found: {0}")]
    NotFound(String),

    /// Missing or malformed request parameter
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unknown, expired, or reused CSRF state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The authorization server redirected back with an `error` parameter
    #[error("Authorization denied by provider: {error}{}", description_suffix(.description))]
    UpstreamDenied {
        /// OAuth2 error code, e.g. `access_denied`
        error: String,
        /// Optional human-readable `error_description`
        description: Option<String>,
    },

    /// The code-for-token exchange failed
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    /// Triple store or filesystem I/O failure
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed stored record or token
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn description_suffix(description: &Option<String>) -> String {
    match description {
        Some(d) if !d.is_empty() => format!(" ({d})"),
        _ => String::new(),
    }
}

impl BrokerError {
    /// HTTP status code reported to the browser for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::InvalidState(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamDenied { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for authbroker operations
///
/// Uses `anyhow::Error` so callers can attach context; the underlying
/// [`BrokerError`] stays reachable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;

/// Returns the HTTP status for an arbitrary error chain.
///
/// Errors that do not carry a [`BrokerError`] map to `500`.
pub fn status_for(err: &anyhow::Error) -> StatusCode {
    err.downcast_ref::<BrokerError>()
        .map(BrokerError::status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_display() {
        let error = BrokerError::NotFound("svc-a".to_string());
        assert_eq!(error.to_string(), "Registration not found: svc-a");
    }

    #[test]
    fn test_upstream_denied_display_with_description() {
        let error = BrokerError::UpstreamDenied {
            error: "access_denied".to_string(),
            description: Some("user cancelled".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Authorization denied by provider: access_denied (user cancelled)"
        );
    }

    #[test]
    fn test_upstream_denied_display_without_description() {
        let error = BrokerError::UpstreamDenied {
            error: "access_denied".to_string(),
            description: None,
        };
        assert_eq!(
            error.to_string(),
            "Authorization denied by provider: access_denied"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BrokerError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            BrokerError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BrokerError::InvalidState("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BrokerError::ExchangeFailed("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            BrokerError::BackendUnavailable("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_for_downcasts_through_anyhow() {
        let err: anyhow::Error = BrokerError::InvalidState("unknown".into()).into();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);

        let err = err.context("while verifying callback");
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_for_plain_anyhow_is_500() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: BrokerError = io_error.into();
        assert!(matches!(error, BrokerError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: BrokerError = json_error.into();
        assert!(matches!(error, BrokerError::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BrokerError>();
    }
}
