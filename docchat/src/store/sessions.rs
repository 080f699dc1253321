//! Session list, selected session and session CRUD.

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use super::grouping::{group_sessions, SessionGroup};
use super::reject;
use crate::api::ChatApi;
use crate::error::{Error, Rejected};
use crate::models::Session;
use crate::notice::Notices;

#[derive(Debug)]
pub struct SessionStore {
    sessions: Vec<Session>,
    selected: Option<Session>,
    is_loading: bool,
    error: Option<String>,
    notices: Notices,
}

impl SessionStore {
    pub const fn new(notices: Notices) -> Self {
        Self {
            sessions: Vec::new(),
            selected: None,
            is_loading: false,
            error: None,
            notices,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub const fn selected(&self) -> Option<&Session> {
        self.selected.as_ref()
    }

    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn start(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn fail(&mut self, err: &Error, fallback: &str, notify: bool) -> Rejected {
        self.is_loading = false;
        let notices = notify.then_some(&self.notices);
        reject(&mut self.error, notices, err, fallback)
    }

    /// Replace `session` in the list (and the selection) by id.
    fn merge(&mut self, session: &Session) {
        if let Some(existing) = self.sessions.iter_mut().find(|s| s.id == session.id) {
            *existing = session.clone();
        }
        if let Some(selected) = self.selected.as_mut().filter(|s| s.id == session.id) {
            *selected = session.clone();
        }
    }

    /// Create a session for a document. The list changes only once the
    /// backend confirms.
    pub async fn create(
        &mut self,
        api: &dyn ChatApi,
        document_id: &str,
    ) -> Result<Session, Rejected> {
        self.start();
        match api.create_session(document_id).await {
            Ok(reply) => {
                self.is_loading = false;
                self.notices
                    .success(reply.message_or("Session created successfully"));
                info!("Created session {} for document {}", reply.data.id, document_id);
                self.sessions.push(reply.data.clone());
                Ok(reply.data)
            }
            Err(e) => Err(self.fail(&e, "Failed to create session", true)),
        }
    }

    /// Reload the whole list.
    pub async fn list_all(&mut self, api: &dyn ChatApi) -> Result<(), Rejected> {
        self.start();
        match api.list_sessions().await {
            Ok(reply) => {
                self.is_loading = false;
                self.sessions = reply.data;
                Ok(())
            }
            Err(e) => Err(self.fail(&e, "Failed to fetch sessions", false)),
        }
    }

    /// Fetch one session and make it the selected one.
    pub async fn get_one(&mut self, api: &dyn ChatApi, id: &str) -> Result<Session, Rejected> {
        self.start();
        match api.get_session(id).await {
            Ok(reply) => {
                self.is_loading = false;
                self.selected = Some(reply.data.clone());
                Ok(reply.data)
            }
            Err(e) => Err(self.fail(&e, "Failed to fetch session", false)),
        }
    }

    /// Rename a session. Blank titles are rejected without a call.
    pub async fn rename(
        &mut self,
        api: &dyn ChatApi,
        id: &str,
        title: &str,
    ) -> Result<Session, Rejected> {
        let title = title.trim();
        if title.is_empty() {
            return Err(self.fail(
                &Error::Validation("Title cannot be empty".to_string()),
                "Failed to update session",
                true,
            ));
        }
        self.start();
        match api.rename_session(id, title).await {
            Ok(reply) => {
                self.is_loading = false;
                self.notices
                    .success(reply.message_or("Session updated successfully"));
                self.merge(&reply.data);
                Ok(reply.data)
            }
            Err(e) => Err(self.fail(&e, "Failed to update session", true)),
        }
    }

    /// Flip the pinned flag; the backend's answer is merged by id.
    pub async fn toggle_pin(&mut self, api: &dyn ChatApi, id: &str) -> Result<Session, Rejected> {
        self.start();
        match api.toggle_pin(id).await {
            Ok(reply) => {
                self.is_loading = false;
                let fallback = if reply.data.is_pinned {
                    "Session pinned"
                } else {
                    "Session unpinned"
                };
                self.notices.success(reply.message_or(fallback));
                self.merge(&reply.data);
                Ok(reply.data)
            }
            Err(e) => Err(self.fail(&e, "Failed to pin session", true)),
        }
    }

    /// Delete a session; clears the selection if it was the deleted one.
    pub async fn delete(&mut self, api: &dyn ChatApi, id: &str) -> Result<(), Rejected> {
        self.start();
        match api.delete_session(id).await {
            Ok(message) => {
                self.is_loading = false;
                self.notices.success(
                    message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| "Session deleted successfully".to_string()),
                );
                self.sessions.retain(|s| s.id != id);
                if self.selected.as_ref().is_some_and(|s| s.id == id) {
                    self.selected = None;
                }
                info!("Deleted session {}", id);
                Ok(())
            }
            Err(e) => Err(self.fail(&e, "Failed to delete session", true)),
        }
    }

    /// Record local activity on a session. `updated_at` never moves back.
    pub fn touch(&mut self, id: &str, at: DateTime<Utc>) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            session.touch(at);
        }
        if let Some(selected) = self.selected.as_mut().filter(|s| s.id == id) {
            selected.touch(at);
        }
    }

    pub fn grouped<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<SessionGroup> {
        group_sessions(&self.sessions, now)
    }

    pub fn reset(&mut self) {
        self.sessions.clear();
        self.selected = None;
        self.is_loading = false;
        self.error = None;
    }
}
