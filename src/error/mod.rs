//! Error types for keyward.

pub mod kind;

pub use kind::ErrorKind;

use thiserror::Error;

use crate::auth::AuthError;

/// Crate-level error for configuration and command handling.
///
/// Session operations return [`AuthError`] directly; this type wraps it for
/// callers that also deal with configuration and local I/O.
#[derive(Error, Debug)]
pub enum KeywardError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl KeywardError {
    /// Classify this error into a kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(err) => err.kind(),
            Self::Network(err) => AuthError::from_reqwest(err).kind(),
            Self::InvalidArgument(_) => ErrorKind::ValidationError,
            Self::Configuration(_) | Self::Io(_) => ErrorKind::Unknown,
        }
    }

    /// Message suitable for display to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(err) => err.user_message(),
            Self::Configuration(msg) | Self::InvalidArgument(msg) => msg.clone(),
            other => other.kind().user_message().to_string(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, KeywardError>;
