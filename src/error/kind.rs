//! Typed error classification and user-facing messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Broad failure kind attached where an error is produced.
///
/// The kind drives both recovery (is the session still usable?) and the
/// message shown to the user. It is never inferred from error text.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NetworkUnavailable,
    Unauthorized,
    ServerError,
    ValidationError,
    ParseError,
    Unknown,
}

impl ErrorKind {
    /// Message suitable for direct display.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NetworkUnavailable => "No network available",
            Self::Unauthorized => "Session expired, please log in again",
            Self::ServerError => "Server error. Please try again later.",
            Self::ValidationError => "The request was rejected. Please check your input.",
            Self::ParseError => "Received an unexpected response from the server",
            Self::Unknown => "An unknown error occurred",
        }
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkUnavailable | Self::ServerError)
    }

    /// Whether the failure means the current session can no longer be used.
    pub fn ends_session(self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            400..=499 => Self::ValidationError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}
