//! Document model representing an uploaded file and its indexing status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Identified, Reference, User};

/// Indexing status of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Uploaded, waiting for the indexer.
    #[default]
    Pending,
    /// Being chunked and embedded.
    Processing,
    /// Ready to chat with.
    #[serde(alias = "completed")]
    Indexed,
    /// Indexing failed; see `Document::error`.
    Failed,
}

impl DocumentStatus {
    /// Convert status to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        }
    }

    /// Parse status from its wire string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "indexed" | "completed" => Some(Self::Indexed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Owner, as an id or the populated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Reference<User>>,
    /// Owner's identity-provider id.
    #[serde(rename = "clerkId", default)]
    pub owner_id: String,
    /// Name the backend stored the file under.
    #[serde(default)]
    pub filename: String,
    /// Name of the file as the user picked it.
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Vector-index namespace holding the document's chunks.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub chunk_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Name to show the user: the original file name when known.
    pub fn display_name(&self) -> &str {
        if self.original_name.is_empty() {
            &self.filename
        } else {
            &self.original_name
        }
    }
}

impl Identified for Document {
    fn id(&self) -> &str {
        &self.id
    }
}
