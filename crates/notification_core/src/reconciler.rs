//! crates/notification_core/src/reconciler.rs
//!
//! Merges fetched snapshots, push deliveries and local mutations into the
//! notification store.
//!
//! `Reconciler` is the synchronous state machine: it applies one `Inbound`
//! message and returns the side effects it wants performed. `ReconcilerTask`
//! is the async driver that owns the reconciler, drains the mutation queue,
//! runs the effects and publishes a `StoreView` after every message.
//!
//! Fetches and pushes commute: pushes and mark-reads seen while a fetch is in
//! flight are replayed on top of the fetched batch, so neither arrival order
//! drops a record or un-reads one.

use std::sync::Arc;

use futures::join;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::domain::NotificationRecord;
use crate::ports::{ConnectionState, NotificationApi, NotificationSurface, PortResult};
use crate::queue::{Envelope, Epoch, FetchTicket, FetchedSnapshot, Inbound, MutationQueue};
use crate::store::NotificationStore;

/// Loading status of the active user's notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No user is active.
    Idle,
    Loading,
    Loaded,
    /// The last fetch failed; the store keeps its last-known-good content.
    Failed(String),
}

/// Immutable copy of the store published to readers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreView {
    pub user_id: Option<String>,
    pub records: Vec<NotificationRecord>,
    pub unread_count: usize,
    pub load: LoadState,
    pub connection: ConnectionState,
}

impl Default for StoreView {
    fn default() -> Self {
        Self {
            user_id: None,
            records: Vec::new(),
            unread_count: 0,
            load: LoadState::Idle,
            connection: ConnectionState::Disconnected,
        }
    }
}

/// Work the reconciler asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch { ticket: FetchTicket, user_id: String },
    Alert { title: String, content: String },
}

#[derive(Debug)]
pub struct Reconciler {
    store: NotificationStore,
    epoch: Epoch,
    user_id: Option<String>,
    serial: u64,
    in_flight: Option<FetchTicket>,
    pushed_during_fetch: Vec<NotificationRecord>,
    read_during_fetch: Vec<String>,
    load: LoadState,
    connection: ConnectionState,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            store: NotificationStore::new(),
            epoch: 0,
            user_id: None,
            serial: 0,
            in_flight: None,
            pushed_during_fetch: Vec::new(),
            read_during_fetch: Vec::new(),
            load: LoadState::Idle,
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn view(&self) -> StoreView {
        StoreView {
            user_id: self.user_id.clone(),
            records: self.store.snapshot(),
            unread_count: self.store.unread_count(),
            load: self.load.clone(),
            connection: self.connection,
        }
    }

    /// Applies one message and returns the effects to run.
    pub fn apply(&mut self, inbound: Inbound) -> Vec<Effect> {
        match inbound {
            Inbound::Activate { epoch, user_id } => self.activate(epoch, user_id),
            Inbound::Deactivate { epoch } => {
                if self.advance_epoch(epoch) {
                    self.user_id = None;
                    self.store.clear_all();
                    self.forget_fetch();
                    self.load = LoadState::Idle;
                }
                Vec::new()
            }
            Inbound::Refresh { epoch } => {
                if epoch != self.epoch {
                    debug!("Dropping refresh for stale epoch {}", epoch);
                    return Vec::new();
                }
                self.issue_fetch().into_iter().collect()
            }
            Inbound::Fetched { ticket, result } => {
                self.apply_fetched(ticket, result);
                Vec::new()
            }
            Inbound::Pushed(record) => self.apply_push(record),
            Inbound::MarkRead { epoch, id } => {
                if epoch == self.epoch {
                    self.store.mark_read(&id);
                    // Also replayed for ids the pending fetch has not delivered yet.
                    if self.in_flight.is_some() {
                        self.read_during_fetch.push(id);
                    }
                }
                Vec::new()
            }
            Inbound::ClearAll { epoch } => {
                if epoch == self.epoch {
                    self.store.clear_all();
                    // Anything fetched before the clear would resurrect records.
                    if self.in_flight.is_some() {
                        self.forget_fetch();
                        self.load = LoadState::Loaded;
                    }
                }
                Vec::new()
            }
            Inbound::Connection(state) => {
                self.connection = state;
                Vec::new()
            }
            Inbound::Shutdown => Vec::new(),
        }
    }

    fn activate(&mut self, epoch: Epoch, user_id: String) -> Vec<Effect> {
        if !self.advance_epoch(epoch) {
            return Vec::new();
        }
        info!("Activating notifications for user {}", user_id);
        self.user_id = Some(user_id);
        self.store.clear_all();
        self.forget_fetch();
        self.issue_fetch().into_iter().collect()
    }

    fn advance_epoch(&mut self, epoch: Epoch) -> bool {
        if epoch <= self.epoch {
            debug!("Ignoring session change for old epoch {} (current {})", epoch, self.epoch);
            return false;
        }
        self.epoch = epoch;
        true
    }

    fn issue_fetch(&mut self) -> Option<Effect> {
        let user_id = self.user_id.clone()?;
        self.serial += 1;
        let ticket = FetchTicket {
            epoch: self.epoch,
            serial: self.serial,
        };
        // A superseded fetch hands its pending pushes and reads to the new ticket.
        if self.in_flight.replace(ticket).is_none() {
            self.pushed_during_fetch.clear();
            self.read_during_fetch.clear();
        }
        self.load = LoadState::Loading;
        Some(Effect::Fetch { ticket, user_id })
    }

    fn forget_fetch(&mut self) {
        self.in_flight = None;
        self.pushed_during_fetch.clear();
        self.read_during_fetch.clear();
    }

    fn apply_fetched(&mut self, ticket: FetchTicket, result: PortResult<FetchedSnapshot>) {
        if self.in_flight != Some(ticket) {
            debug!(
                "Dropping stale fetch result (epoch {}, serial {})",
                ticket.epoch, ticket.serial
            );
            return;
        }
        self.in_flight = None;

        match result {
            Ok(snapshot) => {
                let fetched_unread = snapshot.records.iter().filter(|r| r.is_unread()).count();
                if let Some(server_count) = snapshot.unread_count {
                    if server_count != fetched_unread as u64 {
                        warn!(
                            "Server unread count {} disagrees with fetched list ({})",
                            server_count, fetched_unread
                        );
                    }
                }

                self.store.replace_all(snapshot.records);
                for record in std::mem::take(&mut self.pushed_during_fetch) {
                    self.store.upsert(record);
                }
                for id in std::mem::take(&mut self.read_during_fetch) {
                    self.store.mark_read(&id);
                }
                self.load = LoadState::Loaded;
                info!(
                    "Loaded {} notifications ({} unread)",
                    self.store.len(),
                    self.store.unread_count()
                );
            }
            Err(e) => {
                error!("Failed to load notifications: {}", e);
                self.pushed_during_fetch.clear();
                self.read_during_fetch.clear();
                self.load = LoadState::Failed(e.to_string());
            }
        }
    }

    fn apply_push(&mut self, record: NotificationRecord) -> Vec<Effect> {
        let Some(active) = self.user_id.as_deref() else {
            debug!("Dropping push {} with no active user", record.id);
            return Vec::new();
        };
        if let Some(recipient) = record.recipient_id.as_deref() {
            if recipient != active {
                debug!("Dropping push {} addressed to {}", record.id, recipient);
                return Vec::new();
            }
        }

        let is_new = self.store.get(&record.id).is_none();
        let alert = Effect::Alert {
            title: record.title.clone(),
            content: record.content.clone(),
        };
        if self.in_flight.is_some() {
            self.pushed_during_fetch.push(record.clone());
        }
        self.store.upsert(record);

        if is_new {
            vec![alert]
        } else {
            Vec::new()
        }
    }
}

/// Async driver: the single consumer of the mutation queue.
pub struct ReconcilerTask {
    reconciler: Reconciler,
    api: Arc<dyn NotificationApi>,
    surface: Option<Arc<dyn NotificationSurface>>,
    queue: MutationQueue,
    view_tx: watch::Sender<StoreView>,
}

impl ReconcilerTask {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        surface: Option<Arc<dyn NotificationSurface>>,
        queue: MutationQueue,
        view_tx: watch::Sender<StoreView>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(),
            api,
            surface,
            queue,
            view_tx,
        }
    }

    /// Applies queued messages until `Inbound::Shutdown` or until every producer is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(Envelope { inbound, ack }) = rx.recv().await {
            let shutdown = matches!(inbound, Inbound::Shutdown);
            let effects = self.reconciler.apply(inbound);
            for effect in effects {
                self.execute(effect);
            }
            self.view_tx.send_replace(self.reconciler.view());
            if let Some(ack) = ack {
                let _ = ack.send(());
            }
            if shutdown {
                info!("Reconciler shutting down.");
                break;
            }
        }
    }

    fn execute(&self, effect: Effect) {
        match effect {
            Effect::Fetch { ticket, user_id } => {
                let api = self.api.clone();
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    let result = fetch_snapshot(api.as_ref(), &user_id).await;
                    queue.send(Inbound::Fetched { ticket, result });
                });
            }
            Effect::Alert { title, content } => {
                let Some(surface) = &self.surface else {
                    return;
                };
                if !surface.is_permitted() {
                    return;
                }
                if let Err(e) = surface.notify(&title, &content) {
                    warn!("Failed to show notification alert: {}", e);
                }
            }
        }
    }
}

/// Fetches the list and the unread count concurrently.
///
/// Only the list is required; a failed count is logged and left out.
pub async fn fetch_snapshot(api: &dyn NotificationApi, user_id: &str) -> PortResult<FetchedSnapshot> {
    let (records, count) = join!(
        api.fetch_notifications(user_id),
        api.fetch_unread_count(user_id)
    );
    let unread_count = match count {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("Failed to load unread count for {}: {}", user_id, e);
            None
        }
    };
    Ok(FetchedSnapshot {
        records: records?,
        unread_count,
    })
}
