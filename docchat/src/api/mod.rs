//! REST surface of the backend.
//!
//! `ChatApi` is the seam the stores talk through; `HttpApi` is the reqwest
//! implementation.

mod client;
mod envelope;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

pub use client::HttpApi;
pub use envelope::{ApiResponse, Reply};

use crate::error::Result;
use crate::models::{Document, Message, Session};

/// Text pieces of a streamed answer, in order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A file to upload with its owner.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Identity-provider user id, sent as the `userId` form field.
    pub user_id: String,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn upload_document(&self, upload: DocumentUpload) -> Result<Reply<Document>>;
    async fn list_documents(&self) -> Result<Reply<Vec<Document>>>;
    async fn get_document(&self, id: &str) -> Result<Reply<Document>>;
    async fn delete_document(&self, id: &str) -> Result<Option<String>>;

    async fn create_session(&self, document_id: &str) -> Result<Reply<Session>>;
    async fn list_sessions(&self) -> Result<Reply<Vec<Session>>>;
    async fn get_session(&self, id: &str) -> Result<Reply<Session>>;
    async fn rename_session(&self, id: &str, title: &str) -> Result<Reply<Session>>;
    /// Flip the pinned flag; the backend decides the new value.
    async fn toggle_pin(&self, id: &str) -> Result<Reply<Session>>;
    async fn delete_session(&self, id: &str) -> Result<Option<String>>;

    /// Send a message over REST and get the stored message back.
    async fn send_message(&self, session_id: &str, message: &str) -> Result<Reply<Message>>;
    async fn message_history(&self, session_id: &str) -> Result<Reply<Vec<Message>>>;
    /// Send a message and read the answer as a chunked text body.
    async fn stream_message(&self, session_id: &str, content: &str) -> Result<TextStream>;
}
