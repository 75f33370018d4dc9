use thiserror::Error;

use crate::error::ErrorKind;

/// Authentication and session errors.
///
/// Every variant carries its [`ErrorKind`] so callers never have to guess
/// the failure class from the message. The type is `Clone` so one refresh
/// outcome can be handed to every waiter of a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Malformed response: {0}")]
    Parse(String),
    #[error("Credential storage error: {0}")]
    Storage(String),
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotLoggedIn | Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::Server { .. } => ErrorKind::ServerError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Storage(_) | Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Message suitable for display to an end user.
    ///
    /// Validation failures keep their own text ("Email is already in use");
    /// everything else uses the kind's generic message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) if !message.is_empty() => message.clone(),
            Self::NotLoggedIn => "Please log in to continue".to_string(),
            Self::Storage(_) => "Could not access secure storage".to_string(),
            other => other.kind().user_message().to_string(),
        }
    }

    /// Build an error from an HTTP status and an optional server message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match ErrorKind::from_status(status) {
            ErrorKind::Unauthorized => Self::Unauthorized(message),
            ErrorKind::ValidationError => Self::Validation(message),
            ErrorKind::ServerError => Self::Server { status, message },
            _ => Self::Unknown(format!("unexpected status {status}: {message}")),
        }
    }

    /// Classify a transport error by what failed rather than by its text.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            return Self::NetworkUnavailable(error.to_string());
        }
        if error.is_decode() || error.is_body() {
            return Self::Parse(error.to_string());
        }
        if let Some(status) = error.status() {
            return Self::from_status(status.as_u16(), error.to_string());
        }
        Self::Unknown(error.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::from_reqwest(&error)
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Storage(error.to_string())
    }
}
