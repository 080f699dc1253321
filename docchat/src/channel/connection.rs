//! WebSocket connection task with bounded reconnection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::{ChannelEvent, ClientEvent, ConnectionState, ServerEvent, Transport};
use crate::credentials::{CredentialProvider, SESSION_HEADER};
use crate::error::{Error, Result};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Handshake response header carrying the server-assigned connection id.
pub const SOCKET_ID_HEADER: &str = "x-socket-id";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel connection configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel URL (`ws` or `wss`)
    pub url: Url,
    /// Bound on each connection attempt
    pub connect_timeout: Duration,
    /// Consecutive failed attempts before giving up
    pub reconnect_attempts: u32,
    /// Fixed delay between attempts
    pub reconnect_delay: Duration,
}

impl ChannelConfig {
    pub const fn new(url: Url) -> Self {
        Self {
            url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Handle to the channel task.
///
/// `close` tears the connection down and stops the task; dropping the handle
/// aborts it.
pub struct Channel {
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// Start the channel task. Events arrive on the returned receiver in the
    /// order the connection produced them; it yields `None` once the task ends.
    pub fn open(
        config: ChannelConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            config,
            credentials,
            state: state_tx,
            events: events_tx,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        let channel = Self {
            state: state_rx,
            outbound: outbound_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        };
        (channel, events_rx)
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the socket and wait for the task to stop.
    pub async fn close(&self) {
        let shutdown = self.shutdown.lock().ok().and_then(|mut guard| guard.take());
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Transport for Channel {
    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.outbound.send(event).map_err(|_| Error::NotConnected)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}

enum PumpExit {
    Shutdown,
    Disconnected(String),
}

struct Worker {
    config: ChannelConfig,
    credentials: Arc<dyn CredentialProvider>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    outbound: mpsc::UnboundedReceiver<ClientEvent>,
    shutdown: oneshot::Receiver<()>,
}

impl Worker {
    async fn run(mut self) {
        let max_attempts = self.config.reconnect_attempts.max(1);
        let mut failures = 0u32;

        loop {
            self.state.send_modify(|state| {
                state.connected = false;
                state.socket_id = None;
            });

            let attempt = tokio::select! {
                _ = &mut self.shutdown => return,
                result = connect(&self.config, self.credentials.as_ref()) => result,
            };

            match attempt {
                Ok((ws, socket_id)) => {
                    failures = 0;
                    info!("Connected to {} with socket ID: {}", self.config.url, socket_id);
                    self.state.send_replace(ConnectionState {
                        connected: true,
                        last_error: None,
                        socket_id: Some(socket_id.clone()),
                    });
                    let _ = self.events.send(ChannelEvent::Connected { socket_id });

                    match self.pump(ws).await {
                        PumpExit::Shutdown => {
                            self.state.send_replace(ConnectionState::default());
                            info!("Channel closed");
                            return;
                        }
                        PumpExit::Disconnected(reason) => {
                            info!("Disconnected from {}: {}", self.config.url, reason);
                            self.state.send_modify(|state| {
                                state.connected = false;
                                state.socket_id = None;
                            });
                            self.drop_unsent();
                            let _ = self.events.send(ChannelEvent::Disconnected { reason });
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    let message = e.to_string();
                    warn!(
                        "Connection attempt {}/{} to {} failed: {}",
                        failures, max_attempts, self.config.url, message
                    );
                    self.state
                        .send_modify(|state| state.last_error = Some(message.clone()));
                    let _ = self.events.send(ChannelEvent::ConnectError { message });

                    if failures >= max_attempts {
                        warn!("Giving up on {} after {} attempts", self.config.url, failures);
                        let _ = self.events.send(ChannelEvent::ReconnectFailed);
                        return;
                    }
                }
            }

            tokio::select! {
                _ = &mut self.shutdown => return,
                () = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
            debug!("Reconnecting to {}", self.config.url);
        }
    }

    /// Move frames both ways until the connection ends or shutdown is requested.
    async fn pump(&mut self, ws: WsStream) -> PumpExit {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    return PumpExit::Shutdown;
                }
                Some(event) = self.outbound.recv() => {
                    let frame = match event.to_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("Failed to encode {}: {}", event.name(), e);
                            continue;
                        }
                    };
                    debug!("Emitting {}", event.name());
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        return PumpExit::Disconnected(e.to_string());
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match ServerEvent::parse(&text) {
                        Ok(event) => {
                            debug!("Received {}", event.name());
                            if self.events.send(ChannelEvent::Server(event)).is_err() {
                                return PumpExit::Shutdown;
                            }
                        }
                        Err(e) => warn!("Ignoring frame: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return PumpExit::Disconnected(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpExit::Disconnected(e.to_string()),
                    None => return PumpExit::Disconnected("connection closed".to_string()),
                },
            }
        }
    }

    fn drop_unsent(&mut self) {
        let mut dropped = 0;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Dropped {} unsent frame(s) after disconnect", dropped);
        }
    }
}

/// One connection attempt with fresh credentials.
async fn connect(
    config: &ChannelConfig,
    credentials: &dyn CredentialProvider,
) -> Result<(WsStream, String)> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::WebSocket(e.to_string()))?;

    if let Some(credentials) = credentials.credentials().await {
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, header_value(&credentials.bearer())?);
        if let Some(session_id) = &credentials.session_id {
            headers.insert(SESSION_HEADER, header_value(session_id)?);
        }
    } else {
        debug!("Connecting without credentials");
    }

    let (ws, response) = timeout(config.connect_timeout, connect_async(request))
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "no handshake from {} within {:?}",
                config.url, config.connect_timeout
            ))
        })?
        .map_err(|e| Error::WebSocket(e.to_string()))?;

    let socket_id = response
        .headers()
        .get(SOCKET_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| Uuid::now_v7().to_string(), str::to_string);

    Ok((ws, socket_id))
}

fn header_value(raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw).map_err(|e| Error::WebSocket(format!("invalid header value: {e}")))
}
