//! User model (the owner of documents and sessions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

/// A user as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend id.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Id issued by the identity provider.
    #[serde(rename = "clerkId", default)]
    pub owner_id: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// When the user was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Identified for User {
    fn id(&self) -> &str {
        &self.id
    }
}
