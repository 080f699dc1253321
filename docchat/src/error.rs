//! Error types.

use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the API client, the channel and local validation.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// The backend answered with an error status or `success: false`.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Emit attempted while the channel is down.
    #[error("Not connected to the chat server")]
    NotConnected,

    /// No credentials available from the identity provider.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// URL with the wrong scheme for its use
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel frame with an event name this client does not know.
    #[error("Unknown channel event: {0}")]
    UnknownEvent(String),
}

impl Error {
    /// Human-readable text for a notice.
    ///
    /// Prefers the message the server sent, then the transport's own error
    /// text, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let text = match self {
            Self::Api { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Api { status, .. } => format!("Request failed with status code {status}"),
            other => other.to_string(),
        };
        if text.trim().is_empty() {
            fallback.to_string()
        } else {
            text
        }
    }
}

/// A store action that failed; carries the message already shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Rejected(pub String);
