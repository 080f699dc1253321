//! Credentials from the identity provider.
//!
//! Tokens are short-lived, so nothing here caches: every REST call and every
//! channel connection attempt asks the provider again.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header carrying the identity provider's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// What the identity provider hands out for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Bearer token for `Authorization`.
    pub token: String,
    /// Provider session id, sent as `x-session-id`.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Provider user id, sent as `clerkId` in channel payloads.
    pub user_id: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            session_id: None,
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Source of credentials. `None` means nobody is signed in.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Option<Credentials>;
}

/// Fixed credentials (embedding, tests).
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<Credentials>);

impl StaticCredentials {
    pub const fn new(credentials: Credentials) -> Self {
        Self(Some(credentials))
    }

    /// A provider for a signed-out user.
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

/// Reads `DOCCHAT_TOKEN`, `DOCCHAT_AUTH_SESSION` and `DOCCHAT_USER_ID` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn credentials(&self) -> Option<Credentials> {
        let token = std::env::var("DOCCHAT_TOKEN").ok().filter(|t| !t.is_empty())?;
        let user_id = std::env::var("DOCCHAT_USER_ID").unwrap_or_default();
        let session_id = std::env::var("DOCCHAT_AUTH_SESSION")
            .ok()
            .filter(|s| !s.is_empty());
        Some(Credentials {
            token,
            session_id,
            user_id,
        })
    }
}

/// Reads a JSON credentials file on every call, so an external login tool
/// can refresh it underneath a running client.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.docchat/credentials.json`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".docchat").join("credentials.json"))
    }
}

#[async_trait]
impl CredentialProvider for FileCredentials {
    async fn credentials(&self) -> Option<Credentials> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No credentials at {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Credentials>(&raw) {
            Ok(credentials) if !credentials.token.is_empty() => Some(credentials),
            Ok(_) => None,
            Err(e) => {
                debug!("Unreadable credentials file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

/// Environment first, then the default credentials file.
#[derive(Debug, Clone, Default)]
pub struct DefaultCredentials {
    file: Option<FileCredentials>,
}

impl DefaultCredentials {
    pub fn new() -> Self {
        Self {
            file: FileCredentials::default_path().map(FileCredentials::new),
        }
    }
}

#[async_trait]
impl CredentialProvider for DefaultCredentials {
    async fn credentials(&self) -> Option<Credentials> {
        if let Some(credentials) = EnvCredentials.credentials().await {
            return Some(credentials);
        }
        match &self.file {
            Some(file) => file.credentials().await,
            None => None,
        }
    }
}
