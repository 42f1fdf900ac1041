//! Platform client error types.

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the platform client.
///
/// The variants let callers tell "authorize again" apart from "the request
/// was wrong" and "try later".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// Credentials were rejected; the channel must be authorized again.
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    /// The platform refused the request (4xx) or answered with an unusable body.
    #[error("Rejected by platform ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// Network failure or server-side error (5xx).
    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    /// Client configuration is malformed.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
}

/// `{"error": {"code": 403, "message": "...", "errors": [{"reason": "..."}]}}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorReason {
    #[serde(default)]
    reason: Option<String>,
}

impl PlatformError {
    /// Classify a non-2xx data API response.
    pub fn from_api_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => {
                let reason = parsed.error.errors.iter().find_map(|e| e.reason.clone());
                match (parsed.error.message, reason) {
                    (Some(msg), Some(reason)) => format!("{msg} [{reason}]"),
                    (Some(msg), None) => msg,
                    (None, Some(reason)) => reason,
                    (None, None) => body.to_string(),
                }
            }
            Err(_) => body.to_string(),
        };

        match status {
            401 => Self::AuthExpired(message),
            429 | 500..=599 => Self::Unavailable(format!("HTTP {status}: {message}")),
            _ => Self::RemoteRejected { status, message },
        }
    }

    /// Classify a non-2xx token endpoint response, keeping the body verbatim.
    pub fn from_token_response(status: u16, body: &str) -> Self {
        if status >= 500 {
            return Self::Unavailable(format!("HTTP {status}: {body}"));
        }
        // A revoked or expired refresh token comes back as invalid_grant.
        if body.contains("invalid_grant") || status == 401 {
            return Self::AuthExpired(body.to_string());
        }
        Self::RemoteRejected {
            status,
            message: body.to_string(),
        }
    }

    pub(crate) fn missing_field(what: &str) -> Self {
        Self::RemoteRejected {
            status: 200,
            message: format!("response is missing {what}"),
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::RemoteRejected {
                status: err.status().map(|s| s.as_u16()).unwrap_or(200),
                message: format!("undecodable response: {err}"),
            }
        } else if err.is_builder() {
            Self::ConfigInvalid(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
