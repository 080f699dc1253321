//! Message model representing one entry in a chat session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::generate_id;

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the assistant.
    Assistant,
    /// System message.
    System,
}

impl MessageRole {
    /// Convert role to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse role from its wire string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the assistant reports it is doing before the answer streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantState {
    Thinking,
    Generating,
}

/// A passage of the document an answer was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSource {
    /// Page number in the document.
    pub page: u32,
    /// Snippet of the cited text.
    pub content: String,
}

/// Optional bookkeeping the backend attaches to assistant answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub tokens: Option<u64>,
    /// Milliseconds the backend spent producing the answer.
    pub processing_time: Option<u64>,
    #[serde(default)]
    pub sources: Vec<MessageSource>,
}

/// A message in a chat session.
///
/// `is_streaming` and `is_state` only exist on the client: the first marks an
/// assistant answer still receiving chunks, the second marks the transient
/// "thinking" placeholder shown before the answer starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server id, or a client-generated id for local messages.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Role of the message sender.
    pub role: MessageRole,
    /// Content of the message.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// When the message was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AssistantState>,
}

impl Message {
    fn base(id: String, role: MessageRole, content: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            role,
            content,
            metadata: None,
            created_at,
            is_streaming: false,
            is_state: false,
            state: None,
        }
    }

    /// Optimistic copy of a message the user just sent. Display-only.
    pub fn user(content: impl Into<String>) -> Self {
        Self::base(
            generate_id("local"),
            MessageRole::User,
            content.into(),
            Utc::now(),
        )
    }

    /// Empty assistant answer about to receive chunks.
    pub fn streaming(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let mut message = Self::base(id.into(), MessageRole::Assistant, String::new(), created_at);
        message.is_streaming = true;
        message
    }

    /// The transient "thinking/generating" placeholder.
    pub fn placeholder(
        state: AssistantState,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut message = Self::base(
            generate_id("state"),
            MessageRole::Assistant,
            text.into(),
            created_at,
        );
        message.is_streaming = true;
        message.is_state = true;
        message.state = Some(state);
        message
    }

    /// Finished assistant-authored text (system notes, error reports).
    pub fn assistant_text(
        id_prefix: &str,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::base(
            generate_id(id_prefix),
            MessageRole::Assistant,
            text.into(),
            created_at,
        )
    }
}
