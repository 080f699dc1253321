//! Channel frame parsing.
//!
//! Every frame is one JSON text message `{"event": "<name>", "data": {...}}`.
//! Incoming frames become a closed `ServerEvent`; names this client does not
//! know are rejected at parse time instead of being half-handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::AssistantState;

/// Chat events for the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ChatEvent {
    /// The assistant is thinking or generating; replaces the placeholder.
    AiState {
        state: AssistantState,
        #[serde(default)]
        message: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// An assistant answer starts.
    StreamStart {
        message_id: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Next piece of an answer.
    StreamChunk {
        message_id: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// The answer is complete.
    StreamEnd {
        message_id: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    SystemMessage {
        message: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// The backend failed to answer.
    Error {
        message: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

impl ChatEvent {
    pub const NAMES: [&'static str; 6] = [
        "ai_state",
        "stream_start",
        "stream_chunk",
        "stream_end",
        "system_message",
        "error",
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::AiState { .. } => "ai_state",
            Self::StreamStart { .. } => "stream_start",
            Self::StreamChunk { .. } => "stream_chunk",
            Self::StreamEnd { .. } => "stream_end",
            Self::SystemMessage { .. } => "system_message",
            Self::Error { .. } => "error",
        }
    }
}

/// Document processing events that follow an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum DocumentEvent {
    DocumentProcessingStarted {
        document_id: String,
        #[serde(default)]
        filename: String,
    },
    /// `progress` is a percentage, nominally 0 to 100.
    DocumentProcessingProgress { document_id: String, progress: f64 },
    DocumentProcessingCompleted {
        document_id: String,
        session_id: String,
    },
    UploadError { message: String },
}

impl DocumentEvent {
    pub const NAMES: [&'static str; 4] = [
        "document_processing_started",
        "document_processing_progress",
        "document_processing_completed",
        "upload_error",
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::DocumentProcessingStarted { .. } => "document_processing_started",
            Self::DocumentProcessingProgress { .. } => "document_processing_progress",
            Self::DocumentProcessingCompleted { .. } => "document_processing_completed",
            Self::UploadError { .. } => "upload_error",
        }
    }
}

/// Any event the backend pushes over the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Chat(ChatEvent),
    Document(DocumentEvent),
}

impl ServerEvent {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let name = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnknownEvent("<missing event name>".to_string()))?;

        if ChatEvent::NAMES.contains(&name) {
            Ok(Self::Chat(serde_json::from_value(value)?))
        } else if DocumentEvent::NAMES.contains(&name) {
            Ok(Self::Document(serde_json::from_value(value)?))
        } else {
            Err(Error::UnknownEvent(name.to_string()))
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Chat(event) => event.name(),
            Self::Document(event) => event.name(),
        }
    }
}

/// Events this client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Subscribe to a session's room.
    JoinSession { session_id: String },
    SendMessage {
        session_id: String,
        message: String,
        #[serde(rename = "clerkId")]
        owner_id: String,
    },
    /// Upload over the channel. `file` is the base64-encoded file.
    UploadDocument {
        file: String,
        filename: String,
        #[serde(rename = "clerkId")]
        owner_id: String,
    },
}

impl ClientEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinSession { .. } => "join_session",
            Self::SendMessage { .. } => "send_message",
            Self::UploadDocument { .. } => "upload_document",
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What the channel task reports to its owner: lifecycle plus server events.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Connected; carries the connection id.
    Connected { socket_id: String },
    /// A connection attempt failed.
    ConnectError { message: String },
    /// An established connection dropped; reconnection follows.
    Disconnected { reason: String },
    /// Every attempt failed; the channel has stopped.
    ReconnectFailed,
    Server(ServerEvent),
}
