//! crates/notification_core/src/queue.rs
//!
//! The single mutation queue. Every change to the notification store is sent
//! here as an `Inbound` message and applied, in arrival order, by the one
//! reconciler task that owns the store.

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::domain::NotificationRecord;
use crate::ports::{ConnectionState, PortResult};

/// Session generation. Bumped on every user switch or deactivation.
pub type Epoch = u64;

/// Tag of an in-flight fetch. Only the latest ticket of the current epoch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub epoch: Epoch,
    pub serial: u64,
}

/// Result of a full notification fetch.
#[derive(Debug, Clone)]
pub struct FetchedSnapshot {
    pub records: Vec<NotificationRecord>,
    /// Server-side unread count, when that request succeeded.
    pub unread_count: Option<u64>,
}

#[derive(Debug)]
pub enum Inbound {
    /// A user became active: reset the store and load it.
    Activate { epoch: Epoch, user_id: String },
    /// No user is active anymore.
    Deactivate { epoch: Epoch },
    /// Re-fetch the active user's notifications.
    Refresh { epoch: Epoch },
    Fetched {
        ticket: FetchTicket,
        result: PortResult<FetchedSnapshot>,
    },
    Pushed(NotificationRecord),
    MarkRead { epoch: Epoch, id: String },
    ClearAll { epoch: Epoch },
    Connection(ConnectionState),
    /// Stops the reconciler task.
    Shutdown,
}

/// A queued message plus an optional completion signal.
#[derive(Debug)]
pub struct Envelope {
    pub inbound: Inbound,
    pub ack: Option<oneshot::Sender<()>>,
}

/// Cloneable producer side of the mutation queue.
#[derive(Debug, Clone)]
pub struct MutationQueue {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MutationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues without waiting for it to be applied.
    pub fn send(&self, inbound: Inbound) {
        if self.tx.send(Envelope { inbound, ack: None }).is_err() {
            warn!("Mutation queue is closed; message dropped.");
        }
    }

    /// Enqueues and waits until the reconciler has applied the message.
    pub async fn apply(&self, inbound: Inbound) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let envelope = Envelope {
            inbound,
            ack: Some(ack_tx),
        };
        if self.tx.send(envelope).is_err() {
            warn!("Mutation queue is closed; message dropped.");
            return;
        }
        if ack_rx.await.is_err() {
            warn!("Reconciler stopped before acknowledging a mutation.");
        }
    }
}
