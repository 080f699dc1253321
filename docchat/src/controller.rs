//! One chat view: active session, send gates, and routing of channel events
//! into the stores.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::channel::{ChannelEvent, ChatEvent, ClientEvent, ConnectionState, ServerEvent, Transport};
use crate::credentials::CredentialProvider;
use crate::error::Rejected;
use crate::models::Session;
use crate::notice::Notices;
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, MessageStore, SessionGroup, SessionStore};
use crate::upload::{FileInput, UploadCoordinator, UploadEffect, UploadOutcome, UploadPath, UploadSource};

const DISCONNECTED: &str = "Disconnected or connecting...";

/// Requests in flight for the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loading {
    /// Session or history load.
    pub fetch: bool,
    /// A message was sent and its answer has not ended yet.
    pub submit: bool,
}

/// Why `send_message` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendRejection {
    #[error("not signed in")]
    Unauthenticated,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no session selected")]
    NoSession,
    #[error("not connected")]
    Disconnected,
    #[error("another request is in flight")]
    Busy,
}

pub struct ChatController {
    api: Arc<dyn ChatApi>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    notices: Notices,
    session_id: Option<String>,
    loading: Loading,
    debug_info: String,
    connection: ConnectionState,
    messages: MessageStore,
    sessions: SessionStore,
    documents: DocumentStore,
    uploads: UploadCoordinator,
}

impl ChatController {
    pub fn new(
        api: Arc<dyn ChatApi>,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        notices: Notices,
    ) -> Self {
        Self {
            api,
            transport,
            credentials,
            messages: MessageStore::new(notices.clone()),
            sessions: SessionStore::new(notices.clone()),
            documents: DocumentStore::new(notices.clone()),
            uploads: UploadCoordinator::new(notices.clone()),
            notices,
            session_id: None,
            loading: Loading::default(),
            debug_info: DISCONNECTED.to_string(),
            connection: ConnectionState::default(),
        }
    }

    #[must_use]
    pub fn with_upload_retry(mut self, policy: RetryPolicy) -> Self {
        self.uploads = UploadCoordinator::new(self.notices.clone()).with_retry(policy);
        self
    }

    /// Id of the active session.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub const fn selected_session(&self) -> Option<&Session> {
        self.sessions.selected()
    }

    pub const fn loading(&self) -> Loading {
        self.loading
    }

    /// Human-readable connection status.
    pub fn debug_info(&self) -> &str {
        &self.debug_info
    }

    pub const fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub const fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub const fn uploads(&self) -> &UploadCoordinator {
        &self.uploads
    }

    fn join(&self, session_id: &str) {
        if !self.transport.is_connected() {
            return;
        }
        let event = ClientEvent::JoinSession {
            session_id: session_id.to_string(),
        };
        if let Err(e) = self.transport.emit(event) {
            warn!("Could not join session {}: {}", session_id, e);
        }
    }

    /// Make `id` the active session: fetch it, join its room, load history.
    pub async fn select_session(&mut self, id: &str) -> Result<(), Rejected> {
        info!("Selecting session {}", id);
        self.session_id = Some(id.to_string());
        self.messages.clear();
        self.loading.fetch = true;
        let result = self.load_session(id).await;
        self.loading.fetch = false;
        result
    }

    async fn load_session(&mut self, id: &str) -> Result<(), Rejected> {
        self.sessions.get_one(self.api.as_ref(), id).await?;
        self.join(id);
        self.messages.fetch_history(self.api.as_ref(), id).await
    }

    /// Send `text` to the active session over the channel.
    ///
    /// On success the user's message is shown right away and `submit` stays
    /// set until the answer ends.
    pub async fn send_message(&mut self, text: &str) -> Result<(), SendRejection> {
        let Some(credentials) = self.credentials.credentials().await else {
            self.notices.error("Please log in first.");
            return Err(SendRejection::Unauthenticated);
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(SendRejection::EmptyMessage);
        }
        let Some(session_id) = self.session_id.clone() else {
            return Err(SendRejection::NoSession);
        };
        if !self.transport.is_connected() {
            return Err(SendRejection::Disconnected);
        }
        if self.loading.submit || self.loading.fetch {
            return Err(SendRejection::Busy);
        }

        let event = ClientEvent::SendMessage {
            session_id: session_id.clone(),
            message: text.to_string(),
            owner_id: credentials.user_id,
        };
        if let Err(e) = self.transport.emit(event) {
            warn!("Could not send message: {}", e);
            return Err(SendRejection::Disconnected);
        }
        self.messages.push_user(text);
        self.loading.submit = true;
        self.sessions.touch(&session_id, Utc::now());
        Ok(())
    }

    /// Checks shared by the HTTP send paths: the trimmed text and the active
    /// session id.
    fn http_turn(&self, text: &str) -> Result<(String, String), Rejected> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Rejected("Message cannot be empty".to_string()));
        }
        let Some(session_id) = self.session_id.clone() else {
            return Err(Rejected("No session selected".to_string()));
        };
        if self.loading.submit || self.loading.fetch {
            return Err(Rejected("Another request is in flight".to_string()));
        }
        Ok((text.to_string(), session_id))
    }

    /// Send over REST and append the stored answer the backend returns.
    pub async fn send_message_rest(&mut self, text: &str) -> Result<(), Rejected> {
        let (text, session_id) = self.http_turn(text)?;
        self.messages.push_user(&text);
        self.sessions.touch(&session_id, Utc::now());
        self.loading.submit = true;
        let result = self
            .messages
            .post_message(self.api.as_ref(), &session_id, &text)
            .await;
        self.loading.submit = false;
        if result.is_ok() {
            self.sessions.touch(&session_id, Utc::now());
        }
        result
    }

    /// Ask over the chunked-HTTP endpoint instead of the channel. `on_piece`
    /// sees each piece of the answer as it arrives.
    pub async fn stream_message_http(
        &mut self,
        text: &str,
        on_piece: impl FnMut(&str),
    ) -> Result<(), Rejected> {
        let (text, session_id) = self.http_turn(text)?;
        self.messages.push_user(&text);
        self.sessions.touch(&session_id, Utc::now());
        self.loading.submit = true;
        let before = self.messages.messages().len();
        let result = self
            .messages
            .stream_reply(self.api.as_ref(), &session_id, &text, on_piece)
            .await;
        self.loading.submit = false;
        if self.messages.messages().len() > before {
            self.sessions.touch(&session_id, Utc::now());
        }
        result
    }

    /// Route one channel event.
    pub async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected { socket_id } => {
                info!("Connected with socket ID: {}", socket_id);
                self.debug_info = format!("Connected with socket ID: {socket_id}");
                self.connection = ConnectionState {
                    connected: true,
                    last_error: None,
                    socket_id: Some(socket_id),
                };
                if let Some(id) = self.session_id.clone() {
                    self.join(&id);
                }
            }
            ChannelEvent::ConnectError { message } => {
                self.debug_info = format!("Connection error: {message}");
                self.connection.connected = false;
                self.connection.socket_id = None;
                self.connection.last_error = Some(message);
            }
            ChannelEvent::Disconnected { reason } => {
                debug!("Disconnected: {}", reason);
                self.debug_info = DISCONNECTED.to_string();
                self.connection.connected = false;
                self.connection.socket_id = None;
            }
            ChannelEvent::ReconnectFailed => {
                self.debug_info = "Connection error: unable to reconnect".to_string();
                self.connection.connected = false;
                self.connection.socket_id = None;
                self.notices.error("Unable to reach the server");
            }
            ChannelEvent::Server(ServerEvent::Chat(event)) => self.handle_chat(event),
            ChannelEvent::Server(ServerEvent::Document(event)) => {
                if let UploadEffect::Completed { session_id, .. } = self.uploads.handle(event) {
                    self.open_processed(&session_id).await;
                }
            }
        }
    }

    fn handle_chat(&mut self, event: ChatEvent) {
        let ends_turn = matches!(event, ChatEvent::StreamEnd { .. } | ChatEvent::Error { .. });
        if let ChatEvent::Error { message, .. } = &event {
            self.debug_info = format!("Socket error: {message}");
        }
        // events that append a message to the list
        let appended_at = match &event {
            ChatEvent::StreamStart { timestamp, .. }
            | ChatEvent::SystemMessage { timestamp, .. }
            | ChatEvent::Error { timestamp, .. } => Some(timestamp.unwrap_or_else(Utc::now)),
            _ => None,
        };
        self.messages.apply(event);
        if let (Some(at), Some(id)) = (appended_at, self.session_id.as_deref()) {
            self.sessions.touch(id, at);
        }
        if ends_turn {
            self.loading.submit = false;
        }
    }

    /// Refresh the list and switch to the session created for a processed document.
    async fn open_processed(&mut self, session_id: &str) {
        if let Err(rejected) = self.sessions.list_all(self.api.as_ref()).await {
            debug!("Session refresh failed: {}", rejected);
        }
        if let Err(rejected) = self.select_session(session_id).await {
            debug!("Could not open session {}: {}", session_id, rejected);
        }
    }

    /// Upload the file selected in `input`.
    ///
    /// The REST path switches to the new session once it exists; the channel
    /// path returns `Pending` and switches when processing completes. The
    /// input is reset afterwards whatever the outcome, so the same file can
    /// be picked again.
    pub async fn upload(
        &mut self,
        input: &mut FileInput,
        source: UploadSource,
        path: UploadPath,
    ) -> UploadOutcome {
        let outcome = self.start_upload(input, source, path).await;
        input.reset();
        outcome
    }

    async fn start_upload(
        &mut self,
        input: &mut FileInput,
        source: UploadSource,
        path: UploadPath,
    ) -> UploadOutcome {
        let credentials = self.credentials.credentials().await;
        let (file, user_id) = match self.uploads.begin(input, source, credentials.as_ref()) {
            Ok(accepted) => accepted,
            Err(outcome) => return outcome,
        };
        match path {
            UploadPath::Rest => {
                let outcome = self
                    .uploads
                    .upload_via_rest(
                        file,
                        user_id,
                        self.api.as_ref(),
                        &mut self.documents,
                        &mut self.sessions,
                    )
                    .await;
                if let UploadOutcome::SessionReady(session) = &outcome {
                    if let Err(rejected) = self.select_session(&session.id).await {
                        debug!("Could not open session {}: {}", session.id, rejected);
                    }
                }
                outcome
            }
            UploadPath::Channel => {
                self.uploads
                    .upload_via_channel(file, user_id, self.transport.as_ref())
                    .await
            }
        }
    }

    /// Reload the session list.
    pub async fn refresh_sessions(&mut self) -> Result<(), Rejected> {
        self.sessions.list_all(self.api.as_ref()).await
    }

    /// Start a conversation about `document_id` and make it active.
    pub async fn new_session(&mut self, document_id: &str) -> Result<Session, Rejected> {
        let session = self.sessions.create(self.api.as_ref(), document_id).await?;
        self.select_session(&session.id).await?;
        Ok(session)
    }

    pub async fn rename_session(&mut self, id: &str, title: &str) -> Result<Session, Rejected> {
        self.sessions.rename(self.api.as_ref(), id, title).await
    }

    pub async fn toggle_pin(&mut self, id: &str) -> Result<Session, Rejected> {
        self.sessions.toggle_pin(self.api.as_ref(), id).await
    }

    /// Delete a session. Deleting the active one leaves no session active.
    pub async fn delete_session(&mut self, id: &str) -> Result<(), Rejected> {
        self.sessions.delete(self.api.as_ref(), id).await?;
        if self.session_id.as_deref() == Some(id) {
            self.session_id = None;
            self.messages.clear();
            self.loading = Loading::default();
        }
        Ok(())
    }

    pub fn grouped_sessions<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<SessionGroup> {
        self.sessions.grouped(now)
    }

    pub async fn list_documents(&mut self) -> Result<(), Rejected> {
        self.documents.list_all(self.api.as_ref()).await
    }

    pub async fn delete_document(&mut self, id: &str) -> Result<(), Rejected> {
        self.documents.delete(self.api.as_ref(), id).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::DocumentEvent;
    use crate::credentials::{Credentials, StaticCredentials};
    use crate::models::{AssistantState, MessageRole};
    use crate::notice::{Notice, NoticeLevel};
    use crate::testing::{at, history_message, session, FakeApi, FakeTransport};
    use crate::upload::SelectedFile;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        api: Arc<FakeApi>,
        transport: Arc<FakeTransport>,
        controller: ChatController,
        notices: UnboundedReceiver<Notice>,
    }

    fn harness_with(api: FakeApi, credentials: StaticCredentials) -> Harness {
        let api = Arc::new(api);
        let transport = Arc::new(FakeTransport::new(true));
        let (notices, rx) = Notices::channel();
        let controller = ChatController::new(
            api.clone(),
            transport.clone(),
            Arc::new(credentials),
            notices,
        )
        .with_upload_retry(RetryPolicy::new(3, Duration::from_millis(5)));
        Harness {
            api,
            transport,
            controller,
            notices: rx,
        }
    }

    fn harness(api: FakeApi) -> Harness {
        harness_with(api, StaticCredentials::new(Credentials::new("tok", "user_1")))
    }

    fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    fn chat(event: ChatEvent) -> ChannelEvent {
        ChannelEvent::Server(ServerEvent::Chat(event))
    }

    fn document(event: DocumentEvent) -> ChannelEvent {
        ChannelEvent::Server(ServerEvent::Document(event))
    }

    fn one_session() -> FakeApi {
        FakeApi::with_sessions(vec![session("s1", Utc::now())])
    }

    #[tokio::test]
    async fn select_session_joins_room_and_loads_history() {
        let h = harness(one_session());
        h.api.set_history(
            "s1",
            vec![
                history_message("m1", MessageRole::User, "What is the rent?"),
                history_message("m2", MessageRole::Assistant, "1200 a month."),
            ],
        );
        let mut controller = h.controller;

        controller.select_session("s1").await.unwrap();
        assert_eq!(controller.session_id(), Some("s1"));
        assert_eq!(controller.selected_session().map(|s| s.id.as_str()), Some("s1"));
        assert_eq!(controller.messages().messages().len(), 2);
        assert!(!controller.loading().fetch);
        assert_eq!(h.api.calls(), ["get_session s1", "message_history s1"]);
        assert_eq!(
            h.transport.emitted(),
            [ClientEvent::JoinSession {
                session_id: "s1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn send_gates_leave_state_untouched() {
        // signed out
        let mut h = harness_with(one_session(), StaticCredentials::anonymous());
        h.controller.select_session("s1").await.unwrap();
        let before = h.transport.emitted().len();
        assert_eq!(
            h.controller.send_message("hello").await,
            Err(SendRejection::Unauthenticated)
        );
        assert_eq!(drain(&mut h.notices).last().unwrap().text, "Please log in first.");
        assert!(h.controller.messages().messages().is_empty());
        assert_eq!(h.transport.emitted().len(), before);

        let mut h = harness(one_session());
        // no session yet
        assert_eq!(
            h.controller.send_message("hello").await,
            Err(SendRejection::NoSession)
        );
        h.controller.select_session("s1").await.unwrap();
        let before = h.transport.emitted().len();

        assert_eq!(
            h.controller.send_message("  \n ").await,
            Err(SendRejection::EmptyMessage)
        );

        h.transport.set_connected(false);
        assert_eq!(
            h.controller.send_message("hello").await,
            Err(SendRejection::Disconnected)
        );
        h.transport.set_connected(true);

        h.controller.send_message("hello").await.unwrap();
        assert_eq!(
            h.controller.send_message("again").await,
            Err(SendRejection::Busy)
        );

        assert_eq!(h.controller.messages().messages().len(), 1);
        assert_eq!(h.transport.emitted().len(), before + 1);
    }

    #[tokio::test]
    async fn answer_streams_in_and_releases_submit() {
        let mut h = harness(one_session());
        h.controller.select_session("s1").await.unwrap();
        h.controller.send_message("  What is the rent? ").await.unwrap();

        let sent = h.transport.emitted().pop().unwrap();
        assert_eq!(
            sent,
            ClientEvent::SendMessage {
                session_id: "s1".to_string(),
                message: "What is the rent?".to_string(),
                owner_id: "user_1".to_string(),
            }
        );
        let user = &h.controller.messages().messages()[0];
        assert_eq!(user.role, MessageRole::User);
        assert!(user.id.starts_with("local-"));
        assert!(h.controller.loading().submit);

        for event in [
            ChatEvent::AiState {
                state: AssistantState::Thinking,
                message: "Thinking...".to_string(),
                timestamp: None,
            },
            ChatEvent::StreamStart {
                message_id: "a1".to_string(),
                timestamp: None,
            },
            ChatEvent::StreamChunk {
                message_id: "a1".to_string(),
                content: "1200 ".to_string(),
                timestamp: None,
            },
            ChatEvent::StreamChunk {
                message_id: "a1".to_string(),
                content: "a month.".to_string(),
                timestamp: None,
            },
        ] {
            h.controller.handle_event(chat(event)).await;
        }
        assert!(h.controller.loading().submit);

        h.controller
            .handle_event(chat(ChatEvent::StreamEnd {
                message_id: "a1".to_string(),
                timestamp: None,
            }))
            .await;
        assert!(!h.controller.loading().submit);

        let messages = h.controller.messages().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "1200 a month.");
        assert!(!messages[1].is_streaming);
    }

    #[tokio::test]
    async fn chat_error_releases_submit_and_sets_debug_info() {
        let mut h = harness(one_session());
        h.controller.select_session("s1").await.unwrap();
        h.controller.send_message("hello").await.unwrap();

        h.controller
            .handle_event(chat(ChatEvent::Error {
                message: "model overloaded".to_string(),
                timestamp: None,
            }))
            .await;
        assert!(!h.controller.loading().submit);
        assert_eq!(h.controller.debug_info(), "Socket error: model overloaded");
        let last = h.controller.messages().messages().last().unwrap();
        assert_eq!(last.content, "model overloaded");
    }

    #[tokio::test]
    async fn lifecycle_updates_debug_info_and_rejoins() {
        let mut h = harness(one_session());
        assert_eq!(h.controller.debug_info(), "Disconnected or connecting...");
        h.controller.select_session("s1").await.unwrap();

        h.controller
            .handle_event(ChannelEvent::Disconnected {
                reason: "server closed".to_string(),
            })
            .await;
        assert!(!h.controller.connection().connected);
        assert_eq!(h.controller.debug_info(), "Disconnected or connecting...");

        h.controller
            .handle_event(ChannelEvent::ConnectError {
                message: "refused".to_string(),
            })
            .await;
        assert_eq!(h.controller.debug_info(), "Connection error: refused");
        assert_eq!(h.controller.connection().last_error.as_deref(), Some("refused"));

        let joins_before = h.transport.emitted().len();
        h.controller
            .handle_event(ChannelEvent::Connected {
                socket_id: "abc".to_string(),
            })
            .await;
        assert_eq!(h.controller.debug_info(), "Connected with socket ID: abc");
        assert!(h.controller.connection().connected);
        assert_eq!(h.transport.emitted().len(), joins_before + 1);

        h.controller.handle_event(ChannelEvent::ReconnectFailed).await;
        assert!(!h.controller.connection().connected);
        assert_eq!(drain(&mut h.notices).last().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn channel_upload_end_to_end() {
        let mut h = harness(one_session());
        let mut input = FileInput::new();
        input.select(SelectedFile::new("lease.pdf", vec![7; 2 * 1024 * 1024]));

        let outcome = h
            .controller
            .upload(&mut input, UploadSource::DragDrop, UploadPath::Channel)
            .await;
        assert_eq!(outcome, UploadOutcome::Pending);
        assert!(h.controller.uploads().is_uploading());
        assert!(matches!(
            h.transport.emitted().last(),
            Some(ClientEvent::UploadDocument { filename, .. }) if filename == "lease.pdf"
        ));

        h.controller
            .handle_event(document(DocumentEvent::DocumentProcessingStarted {
                document_id: "d1".to_string(),
                filename: "lease.pdf".to_string(),
            }))
            .await;
        for progress in [25.0, 60.0, 100.0] {
            h.controller
                .handle_event(document(DocumentEvent::DocumentProcessingProgress {
                    document_id: "d1".to_string(),
                    progress,
                }))
                .await;
        }
        assert_eq!(h.controller.uploads().processing()[0].progress, 100);

        h.controller
            .handle_event(document(DocumentEvent::DocumentProcessingCompleted {
                document_id: "d1".to_string(),
                session_id: "s1".to_string(),
            }))
            .await;

        assert!(h.api.calls().contains(&"list_sessions".to_string()));
        assert_eq!(h.controller.sessions().sessions().len(), 1);
        assert_eq!(h.controller.session_id(), Some("s1"));
        assert!(!h.controller.uploads().is_uploading());
        assert!(h.controller.uploads().processing().is_empty());
        assert!(drain(&mut h.notices)
            .iter()
            .any(|n| n.level == NoticeLevel::Success && n.text == "Document processed successfully"));
    }

    #[tokio::test]
    async fn upload_error_keeps_active_session() {
        let mut h = harness(one_session());
        h.controller.select_session("s1").await.unwrap();
        h.controller
            .handle_event(document(DocumentEvent::UploadError {
                message: "Unsupported file type".to_string(),
            }))
            .await;
        assert_eq!(h.controller.session_id(), Some("s1"));
        assert!(!h.controller.uploads().is_uploading());
        assert_eq!(drain(&mut h.notices).last().unwrap().text, "Unsupported file type");
    }

    #[tokio::test]
    async fn rest_upload_opens_the_new_session() {
        let mut h = harness(FakeApi::new());
        let mut input = FileInput::new();
        input.select(SelectedFile::new("lease.pdf", vec![1; 4096]));

        let outcome = h
            .controller
            .upload(&mut input, UploadSource::Browse, UploadPath::Rest)
            .await;
        let UploadOutcome::SessionReady(session) = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        assert_eq!(session.document_id(), "d1");
        assert_eq!(h.controller.session_id(), Some(session.id.as_str()));
        assert_eq!(h.controller.documents().documents().len(), 1);
    }

    #[tokio::test]
    async fn oversized_upload_makes_no_calls() {
        let mut h = harness(FakeApi::new());
        let mut input = FileInput::new();
        input.select(SelectedFile::new("scan.pdf", vec![0; 11 * 1024 * 1024]));

        let outcome = h
            .controller
            .upload(&mut input, UploadSource::Browse, UploadPath::Rest)
            .await;
        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
        assert!(h.api.calls().is_empty());
        assert!(h.transport.emitted().is_empty());
        assert!(input.selected().is_none());
    }

    #[tokio::test]
    async fn deleting_the_active_session_clears_it() {
        let api = FakeApi::with_sessions(vec![
            session("s1", Utc::now()),
            session("s2", Utc::now()),
        ]);
        api.set_history("s1", vec![history_message("m1", MessageRole::User, "hi")]);
        let mut h = harness(api);
        h.controller.refresh_sessions().await.unwrap();
        h.controller.select_session("s1").await.unwrap();

        h.controller.delete_session("s2").await.unwrap();
        assert_eq!(h.controller.session_id(), Some("s1"));
        assert_eq!(h.controller.messages().messages().len(), 1);

        h.controller.delete_session("s1").await.unwrap();
        assert_eq!(h.controller.session_id(), None);
        assert!(h.controller.messages().messages().is_empty());
        assert!(h.controller.sessions().sessions().is_empty());
    }

    #[tokio::test]
    async fn new_session_becomes_active() {
        let mut h = harness(FakeApi::new());
        let session = h.controller.new_session("d9").await.unwrap();
        assert_eq!(h.controller.session_id(), Some(session.id.as_str()));
        assert_eq!(session.document_id(), "d9");

        h.controller.toggle_pin(&session.id).await.unwrap();
        let groups = h.controller.grouped_sessions(&Utc::now());
        assert_eq!(groups[0].sessions.len(), 1);

        let renamed = h.controller.rename_session(&session.id, "Lease").await.unwrap();
        assert_eq!(renamed.display_title(), "Lease");
    }

    #[tokio::test]
    async fn http_stream_feeds_the_message_list() {
        let mut h = harness(one_session());
        h.api.set_stream(&["The rent ", "is 1200", "."]);
        h.controller.select_session("s1").await.unwrap();

        let mut printed = String::new();
        h.controller
            .stream_message_http("Rent?", |piece| printed.push_str(piece))
            .await
            .unwrap();
        assert_eq!(printed, "The rent is 1200.");
        let messages = h.controller.messages().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "The rent is 1200.");
        assert!(!messages[1].is_streaming);
        assert!(!h.controller.loading().submit);
        assert!(h.api.calls().contains(&"stream_message s1".to_string()));
    }

    #[tokio::test]
    async fn assistant_appends_move_the_session_up() {
        let api = FakeApi::with_sessions(vec![
            session("s1", at("2020-01-01T00:00:00Z")),
            session("s2", at("2020-06-01T00:00:00Z")),
        ]);
        let mut h = harness(api);
        h.controller.refresh_sessions().await.unwrap();
        h.controller.select_session("s1").await.unwrap();

        h.controller
            .handle_event(chat(ChatEvent::SystemMessage {
                message: "Document re-indexed".to_string(),
                timestamp: None,
            }))
            .await;
        let touched = h.controller.sessions().get("s1").unwrap().updated_at;
        assert!(touched > at("2020-06-01T00:00:00Z"));
        assert_eq!(h.controller.selected_session().unwrap().updated_at, touched);

        h.controller
            .handle_event(chat(ChatEvent::StreamStart {
                message_id: "a1".to_string(),
                timestamp: Some(at("2099-01-01T00:00:00Z")),
            }))
            .await;
        assert_eq!(
            h.controller.sessions().get("s1").unwrap().updated_at,
            at("2099-01-01T00:00:00Z")
        );

        let groups = h.controller.grouped_sessions(&at("2099-01-01T12:00:00Z"));
        assert_eq!(groups[1].bucket, crate::store::Bucket::Today);
        assert_eq!(groups[1].sessions[0].id, "s1");
        assert_eq!(groups.last().unwrap().sessions[0].id, "s2");
    }

    #[tokio::test]
    async fn chunks_and_placeholders_do_not_touch_the_session() {
        let mut h = harness(FakeApi::with_sessions(vec![session(
            "s1",
            at("2020-01-01T00:00:00Z"),
        )]));
        h.controller.refresh_sessions().await.unwrap();
        h.controller.select_session("s1").await.unwrap();

        h.controller
            .handle_event(chat(ChatEvent::AiState {
                state: AssistantState::Thinking,
                message: String::new(),
                timestamp: None,
            }))
            .await;
        assert_eq!(
            h.controller.sessions().get("s1").unwrap().updated_at,
            at("2020-01-01T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn rest_send_appends_answer_and_touches_session() {
        let mut h = harness(FakeApi::with_sessions(vec![session(
            "s1",
            at("2020-01-01T00:00:00Z"),
        )]));
        h.controller.refresh_sessions().await.unwrap();
        h.controller.select_session("s1").await.unwrap();

        h.controller.send_message_rest(" When? ").await.unwrap();
        let messages = h.controller.messages().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Answer to: When?");
        assert!(h.controller.sessions().get("s1").unwrap().updated_at > at("2020-01-01T00:00:00Z"));
        assert!(!h.controller.loading().submit);
    }

    #[tokio::test]
    async fn signed_out_oversized_drop_resets_input() {
        let mut h = harness_with(FakeApi::new(), StaticCredentials::anonymous());
        let mut input = FileInput::new();
        input.select(SelectedFile::new("scan.pdf", vec![0; 11 * 1024 * 1024]));

        let outcome = h
            .controller
            .upload(&mut input, UploadSource::DragDrop, UploadPath::Channel)
            .await;
        assert!(matches!(outcome, UploadOutcome::Rejected(_)));
        assert!(input.selected().is_none());
        assert!(h.transport.emitted().is_empty());
    }

    #[tokio::test]
    async fn same_file_can_be_picked_again_after_any_upload() {
        let mut h = harness(FakeApi::new());
        let file = SelectedFile::new("lease.pdf", vec![1; 4096]);
        let mut input = FileInput::new();

        assert!(input.select(file.clone()));
        let outcome = h
            .controller
            .upload(&mut input, UploadSource::Browse, UploadPath::Rest)
            .await;
        assert!(matches!(outcome, UploadOutcome::SessionReady(_)));
        assert!(input.selected().is_none());
        assert!(input.select(file.clone()));

        h.api.fail_next(500, "Storage unavailable");
        let outcome = h
            .controller
            .upload(&mut input, UploadSource::DragDrop, UploadPath::Rest)
            .await;
        assert_eq!(outcome, UploadOutcome::Failed("Storage unavailable".to_string()));
        assert!(input.select(file));
    }
}
