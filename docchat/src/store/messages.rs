//! Message list for the active session and the streaming reducer.

use chrono::Utc;
use futures::StreamExt;
use tracing::debug;

use super::reject;
use crate::api::ChatApi;
use crate::channel::ChatEvent;
use crate::error::Rejected;
use crate::models::{Message, MessageRole};
use crate::notice::Notices;

/// Ordered messages of the active session.
///
/// At most one placeholder (`is_state`) is ever present. Chunks only grow a
/// message while it is streaming; once `stream_end` arrives its content is
/// frozen.
#[derive(Debug)]
pub struct MessageStore {
    messages: Vec<Message>,
    is_loading: bool,
    error: Option<String>,
    /// Set between `begin_history_load` and `finish_history_load`.
    history_pending: bool,
    buffered: Vec<ChatEvent>,
    notices: Notices,
}

impl MessageStore {
    pub const fn new(notices: Notices) -> Self {
        Self {
            messages: Vec::new(),
            is_loading: false,
            error: None,
            history_pending: false,
            buffered: Vec::new(),
            notices,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Apply a chat event, or hold it until the pending history load finishes.
    pub fn apply(&mut self, event: ChatEvent) {
        if self.history_pending {
            debug!("Buffering {} until history is loaded", event.name());
            self.buffered.push(event);
            return;
        }
        self.reduce(event);
    }

    fn reduce(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::AiState {
                state,
                message,
                timestamp,
            } => {
                self.remove_placeholder();
                self.messages.push(Message::placeholder(
                    state,
                    message,
                    timestamp.unwrap_or_else(Utc::now),
                ));
            }
            ChatEvent::StreamStart {
                message_id,
                timestamp,
            } => {
                self.remove_placeholder();
                if self.get(&message_id).is_some() {
                    debug!("Duplicate stream_start for {}", message_id);
                    return;
                }
                self.messages.push(Message::streaming(
                    message_id,
                    timestamp.unwrap_or_else(Utc::now),
                ));
            }
            ChatEvent::StreamChunk {
                message_id,
                content,
                ..
            } => {
                if content.is_empty() {
                    return;
                }
                match self
                    .messages
                    .iter_mut()
                    .find(|m| m.id == message_id && m.is_streaming && !m.is_state)
                {
                    Some(message) => message.content.push_str(&content),
                    None => debug!("Dropping chunk for {} (unknown or finished)", message_id),
                }
            }
            ChatEvent::StreamEnd { message_id, .. } => {
                match self.messages.iter_mut().find(|m| m.id == message_id) {
                    Some(message) => message.is_streaming = false,
                    None => debug!("stream_end for unknown message {}", message_id),
                }
            }
            ChatEvent::SystemMessage { message, timestamp } => {
                self.messages.push(Message::assistant_text(
                    "system",
                    message,
                    timestamp.unwrap_or_else(Utc::now),
                ));
            }
            ChatEvent::Error { message, timestamp } => {
                self.remove_placeholder();
                self.messages.push(Message::assistant_text(
                    "error",
                    message,
                    timestamp.unwrap_or_else(Utc::now),
                ));
            }
        }
    }

    fn remove_placeholder(&mut self) {
        self.messages.retain(|m| !m.is_state);
    }

    /// Append the optimistic copy of a message the user just sent.
    pub fn push_user(&mut self, content: &str) -> &Message {
        let index = self.messages.len();
        self.messages.push(Message::user(content));
        &self.messages[index]
    }

    /// Start buffering streamed events until the history arrives.
    pub fn begin_history_load(&mut self) {
        self.history_pending = true;
        self.is_loading = true;
        self.error = None;
    }

    /// Install the fetched history (or keep the current list when the load
    /// failed), then replay everything that streamed in meanwhile.
    pub fn finish_history_load(&mut self, history: Option<Vec<Message>>) {
        if let Some(history) = history {
            self.messages = history;
        }
        self.history_pending = false;
        self.is_loading = false;
        let buffered = std::mem::take(&mut self.buffered);
        if !buffered.is_empty() {
            debug!("Replaying {} buffered event(s)", buffered.len());
        }
        for event in buffered {
            self.reduce(event);
        }
    }

    /// Load the history of `session_id` through the buffered bootstrap.
    pub async fn fetch_history(
        &mut self,
        api: &dyn ChatApi,
        session_id: &str,
    ) -> Result<(), Rejected> {
        self.begin_history_load();
        match api.message_history(session_id).await {
            Ok(reply) => {
                self.finish_history_load(Some(reply.data));
                Ok(())
            }
            Err(e) => {
                let rejected = reject(&mut self.error, None, &e, "Failed to fetch message history");
                self.finish_history_load(None);
                Err(rejected)
            }
        }
    }

    /// Send a message over REST and append the stored message the backend returns.
    pub async fn post_message(
        &mut self,
        api: &dyn ChatApi,
        session_id: &str,
        message: &str,
    ) -> Result<(), Rejected> {
        self.is_loading = true;
        self.error = None;
        let result = api.send_message(session_id, message).await;
        self.is_loading = false;
        match result {
            Ok(reply) => {
                self.messages.push(reply.data);
                Ok(())
            }
            Err(e) => Err(reject(
                &mut self.error,
                Some(&self.notices),
                &e,
                "Failed to send message",
            )),
        }
    }

    /// Grow the trailing streaming message, or start one.
    pub fn append_streamed_text(&mut self, text: &str) {
        match self.messages.last_mut() {
            Some(last) if last.is_streaming && !last.is_state => last.content.push_str(text),
            _ => {
                let mut message = Message::streaming(crate::models::generate_id("stream"), Utc::now());
                message.content.push_str(text);
                self.messages.push(message);
            }
        }
    }

    /// Freeze the trailing streaming message.
    pub fn finalize_streamed(&mut self) {
        if let Some(last) = self.messages.last_mut() {
            if last.is_streaming && last.role == MessageRole::Assistant {
                last.is_streaming = false;
            }
        }
    }

    /// Answer `message` through the chunked-HTTP endpoint, feeding pieces
    /// into the list as they arrive. `on_piece` sees each piece once it has
    /// been applied.
    pub async fn stream_reply(
        &mut self,
        api: &dyn ChatApi,
        session_id: &str,
        message: &str,
        mut on_piece: impl FnMut(&str),
    ) -> Result<(), Rejected> {
        self.error = None;
        let mut stream = match api.stream_message(session_id, message).await {
            Ok(stream) => stream,
            Err(e) => {
                return Err(reject(
                    &mut self.error,
                    Some(&self.notices),
                    &e,
                    "Failed to stream message",
                ))
            }
        };
        while let Some(piece) = stream.next().await {
            match piece {
                Ok(text) => {
                    self.append_streamed_text(&text);
                    on_piece(&text);
                }
                Err(e) => {
                    self.finalize_streamed();
                    return Err(reject(
                        &mut self.error,
                        Some(&self.notices),
                        &e,
                        "Failed to stream message",
                    ));
                }
            }
        }
        self.finalize_streamed();
        Ok(())
    }

    /// Forget everything (session switch or deletion).
    pub fn clear(&mut self) {
        self.messages.clear();
        self.buffered.clear();
        self.history_pending = false;
        self.is_loading = false;
        self.error = None;
    }
}
