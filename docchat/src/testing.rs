//! Test doubles and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::{ChatApi, DocumentUpload, Reply, TextStream};
use crate::channel::{ClientEvent, Transport};
use crate::error::{Error, Result};
use crate::models::{Document, Message, MessageRole, Reference, Session};

/// Serve `router` on an ephemeral localhost port.
pub async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

/// Backend JSON for a session.
pub fn session_json(id: &str, document_id: &str, updated_at: &str) -> Value {
    json!({
        "_id": id,
        "clerkId": "user_1",
        "document": document_id,
        "messages": [],
        "status": "active",
        "isPinned": false,
        "metadata": {"totalTokens": 0},
        "createdAt": updated_at,
        "updatedAt": updated_at,
    })
}

pub fn session(id: &str, updated_at: DateTime<Utc>) -> Session {
    Session {
        id: id.to_string(),
        user: None,
        owner_id: "user_1".to_string(),
        document: Reference::Id(format!("doc-{id}")),
        title: None,
        messages: Vec::new(),
        status: crate::models::SessionStatus::Active,
        is_pinned: false,
        metadata: crate::models::SessionMetadata::default(),
        created_at: updated_at,
        updated_at,
    }
}

pub fn document(id: &str, name: &str, size: u64) -> Document {
    serde_json::from_value(json!({
        "_id": id,
        "clerkId": "user_1",
        "filename": name,
        "originalName": name,
        "mimeType": "application/pdf",
        "size": size,
        "status": "pending",
    }))
    .unwrap()
}

pub fn history_message(id: &str, role: MessageRole, content: &str) -> Message {
    serde_json::from_value(json!({
        "_id": id,
        "role": role.as_str(),
        "content": content,
        "createdAt": "2026-10-01T10:00:00Z",
    }))
    .unwrap()
}

#[derive(Default)]
struct Backend {
    documents: Vec<Document>,
    sessions: Vec<Session>,
    history: HashMap<String, Vec<Message>>,
    stream_chunks: Vec<String>,
    calls: Vec<String>,
    fail_next: Option<(u16, String)>,
    next_id: u32,
}

/// In-memory `ChatApi` that records every call.
#[derive(Default)]
pub struct FakeApi {
    backend: Mutex<Backend>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        let api = Self::new();
        api.backend.lock().unwrap().sessions = sessions;
        api
    }

    pub fn add_session(&self, session: Session) {
        self.backend.lock().unwrap().sessions.push(session);
    }

    pub fn set_history(&self, session_id: &str, messages: Vec<Message>) {
        self.backend
            .lock()
            .unwrap()
            .history
            .insert(session_id.to_string(), messages);
    }

    pub fn set_stream(&self, chunks: &[&str]) {
        self.backend.lock().unwrap().stream_chunks =
            chunks.iter().map(|c| (*c).to_string()).collect();
    }

    /// Make the next call fail with this status and message.
    pub fn fail_next(&self, status: u16, message: &str) {
        self.backend.lock().unwrap().fail_next = Some((status, message.to_string()));
    }

    /// Names of the calls made so far, e.g. `"get_session s1"`.
    pub fn calls(&self) -> Vec<String> {
        self.backend.lock().unwrap().calls.clone()
    }

    fn call<T>(&self, name: String, op: impl FnOnce(&mut Backend) -> Result<T>) -> Result<T> {
        let mut backend = self.backend.lock().unwrap();
        backend.calls.push(name);
        if let Some((status, message)) = backend.fail_next.take() {
            return Err(Error::Api { status, message });
        }
        op(&mut backend)
    }
}

fn not_found(what: &str) -> Error {
    Error::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

impl Backend {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("Session"))
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn upload_document(&self, upload: DocumentUpload) -> Result<Reply<Document>> {
        self.call(format!("upload_document {}", upload.filename), |backend| {
            let id = backend.next_id("d");
            let mut document = document(&id, &upload.filename, upload.bytes.len() as u64);
            document.owner_id = upload.user_id;
            backend.documents.push(document.clone());
            Ok(Reply::new(document).with_message("Document uploaded successfully"))
        })
    }

    async fn list_documents(&self) -> Result<Reply<Vec<Document>>> {
        self.call("list_documents".to_string(), |backend| {
            Ok(Reply::new(backend.documents.clone()))
        })
    }

    async fn get_document(&self, id: &str) -> Result<Reply<Document>> {
        self.call(format!("get_document {id}"), |backend| {
            backend
                .documents
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .map(Reply::new)
                .ok_or_else(|| not_found("Document"))
        })
    }

    async fn delete_document(&self, id: &str) -> Result<Option<String>> {
        self.call(format!("delete_document {id}"), |backend| {
            let before = backend.documents.len();
            backend.documents.retain(|d| d.id != id);
            if backend.documents.len() == before {
                return Err(not_found("Document"));
            }
            Ok(Some("Document deleted successfully".to_string()))
        })
    }

    async fn create_session(&self, document_id: &str) -> Result<Reply<Session>> {
        self.call(format!("create_session {document_id}"), |backend| {
            let id = backend.next_id("s");
            let mut created = session(&id, Utc::now());
            created.document = Reference::Id(document_id.to_string());
            backend.sessions.push(created.clone());
            Ok(Reply::new(created).with_message("Session created successfully"))
        })
    }

    async fn list_sessions(&self) -> Result<Reply<Vec<Session>>> {
        self.call("list_sessions".to_string(), |backend| {
            Ok(Reply::new(backend.sessions.clone()))
        })
    }

    async fn get_session(&self, id: &str) -> Result<Reply<Session>> {
        self.call(format!("get_session {id}"), |backend| {
            Ok(Reply::new(backend.session_mut(id)?.clone()))
        })
    }

    async fn rename_session(&self, id: &str, title: &str) -> Result<Reply<Session>> {
        self.call(format!("rename_session {id}"), |backend| {
            let session = backend.session_mut(id)?;
            session.title = Some(title.to_string());
            session.updated_at = Utc::now();
            Ok(Reply::new(session.clone()).with_message("Session updated successfully"))
        })
    }

    async fn toggle_pin(&self, id: &str) -> Result<Reply<Session>> {
        self.call(format!("toggle_pin {id}"), |backend| {
            let session = backend.session_mut(id)?;
            session.is_pinned = !session.is_pinned;
            let message = if session.is_pinned {
                "Session pinned"
            } else {
                "Session unpinned"
            };
            Ok(Reply::new(session.clone()).with_message(message))
        })
    }

    async fn delete_session(&self, id: &str) -> Result<Option<String>> {
        self.call(format!("delete_session {id}"), |backend| {
            backend.session_mut(id)?;
            backend.sessions.retain(|s| s.id != id);
            Ok(Some("Session deleted successfully".to_string()))
        })
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<Reply<Message>> {
        self.call(format!("send_message {session_id}"), |backend| {
            backend.session_mut(session_id)?;
            let id = backend.next_id("m");
            Ok(Reply::new(history_message(
                &id,
                MessageRole::Assistant,
                &format!("Answer to: {message}"),
            )))
        })
    }

    async fn message_history(&self, session_id: &str) -> Result<Reply<Vec<Message>>> {
        self.call(format!("message_history {session_id}"), |backend| {
            Ok(Reply::new(
                backend.history.get(session_id).cloned().unwrap_or_default(),
            ))
        })
    }

    async fn stream_message(&self, session_id: &str, _content: &str) -> Result<TextStream> {
        let chunks = self.call(format!("stream_message {session_id}"), |backend| {
            Ok(backend.stream_chunks.clone())
        })?;
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

/// `Transport` that records emitted events.
pub struct FakeTransport {
    connected: AtomicBool,
    failures_left: AtomicU32,
    emitted: Mutex<Vec<ClientEvent>>,
}

impl FakeTransport {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            failures_left: AtomicU32::new(0),
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next `n` emits fail even while connected.
    pub fn fail_next_emits(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn emitted(&self) -> Vec<ClientEvent> {
        self.emitted.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::WebSocket("send failed".to_string()));
        }
        self.emitted.lock().unwrap().push(event);
        Ok(())
    }
}
