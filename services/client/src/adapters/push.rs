//! services/client/src/adapters/push.rs
//!
//! The WebSocket transport binding: the concrete implementation of the
//! `PushTransport` port. One supervisor task owns the single connection,
//! reconnects with exponential backoff and re-sends `identify` after every
//! successful connect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use notification_core::ports::{
    ConnectionHandle, ConnectionState, PortError, PortResult, PushTransport, TransportEvent,
    TransportStream,
};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol::{ClientMessage, ServerMessage};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reconnect delays: starts at `initial`, doubles per failure, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    fn next(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

//=========================================================================================
// Shared State
//=========================================================================================

struct Shared {
    /// The user the connection is bound to; re-sent after every connect.
    identity: Mutex<Option<String>>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: broadcast::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            debug!("Push connection is now {:?}", next);
            let _ = self.events.send(TransportEvent::State(next));
        }
    }

    fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::NewNotification(dto)) => {
                let record = dto.to_domain();
                debug!("Push delivered notification {}", record.id);
                if self.events.send(TransportEvent::Notification(record)).is_err() {
                    warn!("No subscribers for pushed notification.");
                }
            }
            Err(e) => warn!("Dropping malformed push message: {}", e),
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct WsTransport {
    url: String,
    backoff: Backoff,
    shared: Arc<Shared>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<ClientMessage>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    /// Creates a new, not yet connected `WsTransport`.
    pub fn new(url: impl Into<String>, backoff: Backoff) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: url.into(),
            backoff,
            shared: Arc::new(Shared {
                identity: Mutex::new(None),
                outbound,
                events,
                state,
                cancel: CancellationToken::new(),
            }),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            supervisor: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }
}

//=========================================================================================
// `PushTransport` Trait Implementation
//=========================================================================================

#[async_trait]
impl PushTransport for WsTransport {
    async fn connect(&self) -> PortResult<ConnectionHandle> {
        if self.shared.cancel.is_cancelled() {
            return Err(PortError::Transport("transport was shut down".to_string()));
        }
        let mut supervisor = self.supervisor.lock().await;
        if supervisor.is_none() {
            let outbound_rx = self
                .outbound_rx
                .lock()
                .await
                .take()
                .ok_or_else(|| PortError::Transport("transport already started".to_string()))?;
            *supervisor = Some(tokio::spawn(supervise(
                self.shared.clone(),
                self.url.clone(),
                self.backoff,
                outbound_rx,
            )));
        }
        Ok(ConnectionHandle::new(self.shared.state.subscribe()))
    }

    async fn identify(&self, user_id: &str) {
        let mut identity = self.shared.identity.lock().await;
        *identity = Some(user_id.to_string());
        if self.state() == ConnectionState::Connected {
            let _ = self
                .shared
                .outbound
                .send(ClientMessage::Identify(user_id.to_string()));
        } else {
            debug!("Identify for {} queued until the connection is up", user_id);
        }
    }

    async fn detach(&self) {
        *self.shared.identity.lock().await = None;
    }

    fn subscribe(&self) -> TransportStream {
        let mut rx = self.shared.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Push subscriber lagged; {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn disconnect(&self) {
        self.shared.cancel.cancel();
        if let Some(handle) = self.supervisor.lock().await.take() {
            let _ = handle.await;
        }
        self.shared.set_state(ConnectionState::Disconnected);
        info!("Push transport shut down.");
    }
}

//=========================================================================================
// Supervisor
//=========================================================================================

enum ConnectionEnd {
    Cancelled,
    Lost(String),
}

/// Keeps one connection alive until the transport is cancelled.
async fn supervise(
    shared: Arc<Shared>,
    url: String,
    backoff: Backoff,
    mut outbound: mpsc::UnboundedReceiver<ClientMessage>,
) {
    let mut delay = backoff.initial;
    loop {
        shared.set_state(ConnectionState::Connecting);
        let attempt = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            result = connect_async(url.as_str()) => result,
        };

        match attempt {
            Ok((socket, _)) => {
                info!("Connected to push server at {}", url);
                delay = backoff.initial;
                match run_connection(&shared, socket, &mut outbound).await {
                    ConnectionEnd::Cancelled => break,
                    ConnectionEnd::Lost(reason) => {
                        warn!("{}", PortError::Transport(format!("connection lost: {}", reason)));
                    }
                }
            }
            Err(e) => warn!("Push connection to {} failed: {}", url, e),
        }

        shared.set_state(ConnectionState::Disconnected);
        debug!("Reconnecting in {:?}", delay);
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = backoff.next(delay);
    }
    shared.set_state(ConnectionState::Disconnected);
}

async fn run_connection(
    shared: &Shared,
    socket: Socket,
    outbound: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> ConnectionEnd {
    let (mut write, mut read) = socket.split();

    // Under the identity lock so a concurrent `identify` is neither lost nor doubled.
    let identity = {
        let identity = shared.identity.lock().await;
        shared.set_state(ConnectionState::Connected);
        while outbound.try_recv().is_ok() {}
        identity.clone()
    };
    if let Some(user_id) = identity {
        info!("Identifying push connection as {}", user_id);
        if let Err(reason) = send_message(&mut write, &ClientMessage::Identify(user_id)).await {
            return ConnectionEnd::Lost(reason);
        }
    }

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return ConnectionEnd::Cancelled;
            }
            Some(message) = outbound.recv() => {
                if let ClientMessage::Identify(user_id) = &message {
                    info!("Identifying push connection as {}", user_id);
                }
                if let Err(reason) = send_message(&mut write, &message).await {
                    return ConnectionEnd::Lost(reason);
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => shared.handle_text(&text),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        return ConnectionEnd::Lost(e.to_string());
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return ConnectionEnd::Lost("closed by server".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return ConnectionEnd::Lost(e.to_string()),
            },
        }
    }
}

async fn send_message<S>(write: &mut S, message: &ClientMessage) -> Result<(), String>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(message).map_err(|e| e.to_string())?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}
