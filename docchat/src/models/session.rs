//! Session model: a conversation thread bound to one document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Document, Identified, Message, Reference, User};

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Archived,
}

impl SessionStatus {
    /// Convert status to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Usage counters the backend keeps per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// A chat session over one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Backend id.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Owner, as an id or the populated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Reference<User>>,
    #[serde(rename = "clerkId", default)]
    pub owner_id: String,
    /// The document this session chats with.
    pub document: Reference<Document>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Messages embedded by the backend; usually empty, history is fetched separately.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub metadata: SessionMetadata,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Id of the session's document, whether or not it was populated.
    pub fn document_id(&self) -> &str {
        self.document.id()
    }

    /// Title to show in lists: the title, else the document name, else "Untitled".
    pub fn display_title(&self) -> &str {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title;
        }
        match self.document.expanded() {
            Some(document) if !document.display_name().is_empty() => document.display_name(),
            _ => "Untitled",
        }
    }

    /// Advance `updated_at` to `at`. Never moves it backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}

impl Identified for Session {
    fn id(&self) -> &str {
        &self.id
    }
}
