//! Real-time channel to the backend.
//!
//! One authenticated WebSocket per chat view, owned by a background task that
//! reconnects on its own and reports everything as `ChannelEvent`s.

mod connection;
mod events;

pub use connection::{
    Channel, ChannelConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_DELAY, SOCKET_ID_HEADER,
};
pub use events::{ChannelEvent, ChatEvent, ClientEvent, DocumentEvent, ServerEvent};

use crate::error::Result;

/// Connection status as last observed by the channel task.
///
/// Reset on every connection attempt; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    /// Message of the last failed connection attempt.
    pub last_error: Option<String>,
    /// Id of the live connection.
    pub socket_id: Option<String>,
}

/// Sending side of the channel.
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue `event` for sending. Fails with `Error::NotConnected` while down.
    fn emit(&self, event: ClientEvent) -> Result<()>;
}
