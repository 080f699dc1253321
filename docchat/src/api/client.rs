//! reqwest implementation of `ChatApi`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::{ApiResponse, ChatApi, DocumentUpload, Reply, TextStream};
use crate::credentials::{CredentialProvider, SESSION_HEADER};
use crate::error::{Error, Result};
use crate::models::{Document, Message, Session};

/// HTTP client for the backend's REST surface.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpApi {
    pub fn new(base_url: Url, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            credentials,
        }
    }

    /// Absolute URL for `segments`, each percent-encoded.
    fn url(&self, segments: &[&str]) -> String {
        let path: Vec<_> = segments
            .iter()
            .map(|segment| urlencoding::encode(segment))
            .collect();
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.join("/")
        )
    }

    /// Attach `Authorization` and `x-session-id` from fresh credentials.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.credentials().await {
            Some(credentials) => {
                let request = request.bearer_auth(&credentials.token);
                match &credentials.session_id {
                    Some(session_id) => request.header(SESSION_HEADER, session_id),
                    None => request,
                }
            }
            None => request,
        }
    }

    /// Send `request` and decode the envelope, turning error statuses into
    /// `Error::Api` with whatever message the server included.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(u16, ApiResponse<T>)> {
        let response = self.authorize(request).await.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = server_message(&body);
            warn!("Request failed with {}: {}", status, message);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body)?;
        Ok((status.as_u16(), envelope))
    }

    async fn reply<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Reply<T>> {
        let (status, envelope) = self.execute(request).await?;
        envelope.into_reply(status)
    }

    async fn acknowledge(&self, request: RequestBuilder) -> Result<Option<String>> {
        let (status, envelope) = self.execute::<Value>(request).await?;
        envelope.into_message(status)
    }
}

/// The envelope's `message` from an error body, if it has one.
fn server_message(body: &str) -> String {
    serde_json::from_str::<ApiResponse<Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .unwrap_or_default()
}

/// Take the decodable text out of `pending`, leaving an incomplete trailing
/// sequence for the next chunk. Invalid bytes become U+FFFD.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    let mut start = 0;
    while start < pending.len() {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                text.push_str(valid);
                start = pending.len();
            }
            Err(e) => {
                let valid_end = start + e.valid_up_to();
                text.push_str(std::str::from_utf8(&pending[start..valid_end]).unwrap_or_default());
                match e.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + len;
                    }
                    None => {
                        start = valid_end;
                        break;
                    }
                }
            }
        }
    }
    pending.drain(..start);
    text
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn upload_document(&self, upload: DocumentUpload) -> Result<Reply<Document>> {
        let mime = mime_guess::from_path(&upload.filename).first_or_octet_stream();
        debug!(
            "Uploading {} ({} bytes, {})",
            upload.filename,
            upload.bytes.len(),
            mime
        );
        let part = Part::bytes(upload.bytes)
            .file_name(upload.filename)
            .mime_str(mime.as_ref())?;
        let form = Form::new()
            .part("file", part)
            .text("userId", upload.user_id);
        self.reply(self.client.post(self.url(&["documents"])).multipart(form))
            .await
    }

    async fn list_documents(&self) -> Result<Reply<Vec<Document>>> {
        self.reply(self.client.get(self.url(&["documents"]))).await
    }

    async fn get_document(&self, id: &str) -> Result<Reply<Document>> {
        self.reply(self.client.get(self.url(&["documents", id]))).await
    }

    async fn delete_document(&self, id: &str) -> Result<Option<String>> {
        self.acknowledge(self.client.delete(self.url(&["documents", id])))
            .await
    }

    async fn create_session(&self, document_id: &str) -> Result<Reply<Session>> {
        let request = self
            .client
            .post(self.url(&["sessions"]))
            .json(&json!({ "documentId": document_id }));
        self.reply(request).await
    }

    async fn list_sessions(&self) -> Result<Reply<Vec<Session>>> {
        self.reply(self.client.get(self.url(&["sessions"]))).await
    }

    async fn get_session(&self, id: &str) -> Result<Reply<Session>> {
        self.reply(self.client.get(self.url(&["sessions", id]))).await
    }

    async fn rename_session(&self, id: &str, title: &str) -> Result<Reply<Session>> {
        let request = self
            .client
            .put(self.url(&["sessions", id]))
            .json(&json!({ "title": title }));
        self.reply(request).await
    }

    async fn toggle_pin(&self, id: &str) -> Result<Reply<Session>> {
        self.reply(self.client.put(self.url(&["sessions", id, "pin"])))
            .await
    }

    async fn delete_session(&self, id: &str) -> Result<Option<String>> {
        self.acknowledge(self.client.delete(self.url(&["sessions", id])))
            .await
    }

    async fn send_message(&self, session_id: &str, message: &str) -> Result<Reply<Message>> {
        let request = self
            .client
            .post(self.url(&["sessions", session_id, "messages"]))
            .json(&json!({ "message": message }));
        self.reply(request).await
    }

    async fn message_history(&self, session_id: &str) -> Result<Reply<Vec<Message>>> {
        self.reply(self.client.get(self.url(&["sessions", session_id, "messages"])))
            .await
    }

    async fn stream_message(&self, session_id: &str, content: &str) -> Result<TextStream> {
        let request = self
            .client
            .post(self.url(&["sessions", session_id, "messages", "stream"]))
            .json(&json!({ "content": content }));
        let response = self.authorize(request).await.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }

        let bytes = Box::pin(response.bytes_stream());
        let stream = futures::stream::unfold(
            (bytes, Vec::new(), false),
            |(mut bytes, mut pending, done)| async move {
                if done {
                    return None;
                }
                loop {
                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            pending.extend_from_slice(&chunk);
                            let text = take_utf8(&mut pending);
                            if !text.is_empty() {
                                return Some((Ok(text), (bytes, pending, false)));
                            }
                        }
                        Some(Err(e)) => return Some((Err(Error::Http(e)), (bytes, pending, true))),
                        None if pending.is_empty() => return None,
                        None => {
                            let text = String::from_utf8_lossy(&pending).into_owned();
                            pending.clear();
                            return Some((Ok(text), (bytes, pending, true)));
                        }
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }
}
