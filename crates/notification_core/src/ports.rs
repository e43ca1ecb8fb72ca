//! crates/notification_core/src/ports.rs
//!
//! Defines the service contracts (traits) the synchronization core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete HTTP, WebSocket and host-alert implementations.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::watch;

use crate::domain::{NotificationRecord, Post, User};
use crate::events::{NewPost, NewUser, TriggerEvent};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (HTTP, WebSocket, host).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The request failed or timed out.
    #[error("Network error: {0}")]
    Network(String),
    /// The server does not know the referenced id.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The request was malformed or rejected by validation.
    #[error("Validation error: {0}")]
    Validation(String),
    /// The push connection failed. Never fatal: the transport reconnects.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// REST Port
//=========================================================================================

#[async_trait]
pub trait NotificationApi: Send + Sync {
    // --- Notifications ---
    /// Lists the notifications of a user, newest first.
    async fn fetch_notifications(&self, user_id: &str) -> PortResult<Vec<NotificationRecord>>;

    async fn fetch_unread_count(&self, user_id: &str) -> PortResult<u64>;

    async fn mark_read(&self, notification_id: &str) -> PortResult<()>;

    async fn clear_all(&self, user_id: &str) -> PortResult<()>;

    // --- Events ---
    async fn trigger_event(&self, event: &TriggerEvent) -> PortResult<()>;

    // --- Users and Posts ---
    async fn list_users(&self) -> PortResult<Vec<User>>;

    async fn create_user(&self, user: &NewUser) -> PortResult<User>;

    async fn list_posts(&self, user_id: &str) -> PortResult<Vec<Post>>;

    async fn create_post(&self, post: &NewPost) -> PortResult<Post>;
}

//=========================================================================================
// Push Port
//=========================================================================================

/// Lifecycle of the single push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Everything the transport hands to its consumers.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    State(ConnectionState),
    Notification(NotificationRecord),
}

pub type TransportStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Observes the connection state of a started transport.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    pub fn new(state: watch::Receiver<ConnectionState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Resolves once the connection reaches `target`.
    pub async fn wait_for(&mut self, target: ConnectionState) -> PortResult<()> {
        self.state
            .wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| PortError::Transport("transport shut down".to_string()))
    }
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Starts the connection; reconnects are handled internally.
    async fn connect(&self) -> PortResult<ConnectionHandle>;

    /// Binds the connection to a user. Remembered and re-sent after every reconnect.
    async fn identify(&self, user_id: &str);

    /// Forgets the bound user; nothing is re-sent on reconnect.
    async fn detach(&self);

    /// Inbound notifications and state transitions, each delivered once.
    fn subscribe(&self) -> TransportStream;

    async fn disconnect(&self);
}

//=========================================================================================
// Host Alert Port
//=========================================================================================

pub trait NotificationSurface: Send + Sync {
    /// Whether the host granted permission to show alerts.
    fn is_permitted(&self) -> bool;

    /// Shows a native alert. Must not block.
    fn notify(&self, title: &str, content: &str) -> PortResult<()>;
}
