//! Application-wide error types.

use thiserror::Error;

use crate::platform::PlatformError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured kind of an [`Error`], suitable for display next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum ErrorKind {
    ConfigInvalid,
    AuthExpired,
    RemoteRejected,
    Unavailable,
    SessionAlreadyActive,
    EncoderLaunchFailed,
    EncoderRuntimeError,
    NotFound,
    Persistence,
    Internal,
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Authorization expired or revoked: {0}")]
    AuthExpired(String),

    #[error("Platform rejected the request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    #[error("A streaming session is already active: {session_id}")]
    SessionAlreadyActive { session_id: String },

    #[error("Failed to launch encoder: {0}")]
    EncoderLaunchFailed(String),

    #[error("Encoder {0}")]
    EncoderRuntimeError(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigInvalid(_) => ErrorKind::ConfigInvalid,
            Self::AuthExpired(_) => ErrorKind::AuthExpired,
            Self::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::SessionAlreadyActive { .. } => ErrorKind::SessionAlreadyActive,
            Self::EncoderLaunchFailed(_) => ErrorKind::EncoderLaunchFailed,
            Self::EncoderRuntimeError(_) => ErrorKind::EncoderRuntimeError,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DatabaseSqlx(_) | Self::Migration(_) => ErrorKind::Persistence,
            Self::Serialization(_) | Self::Io(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Short message for direct display, prefixed with hints where the
    /// caller can act on the failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthExpired(_) => {
                "Channel authorization expired; authorize the channel again".to_string()
            }
            Self::SessionAlreadyActive { .. } => {
                "A stream is already running; stop it before starting another".to_string()
            }
            Self::EncoderLaunchFailed(detail) => {
                format!("Could not start ffmpeg ({detail}); check that it is installed")
            }
            other => other.to_string(),
        }
    }
}

impl From<PlatformError> for Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::AuthExpired(msg) => Self::AuthExpired(msg),
            PlatformError::RemoteRejected { status, message } => {
                Self::RemoteRejected { status, message }
            }
            PlatformError::Unavailable(msg) => Self::Unavailable(msg),
            PlatformError::ConfigInvalid(msg) => Self::ConfigInvalid(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_errors_keep_their_kind() {
        let err: Error = PlatformError::RemoteRejected {
            status: 403,
            message: "quota".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
        assert!(err.to_string().contains("quota"));

        let err: Error = PlatformError::AuthExpired("invalid_grant".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::AuthExpired);
        assert!(err.user_message().contains("authorize"));
    }

    #[test]
    fn kind_display_is_the_variant_name() {
        let err = Error::SessionAlreadyActive {
            session_id: "s1".to_string(),
        };
        assert_eq!(err.kind().to_string(), "SessionAlreadyActive");
    }
}
