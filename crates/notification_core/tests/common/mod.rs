//! In-memory fakes of the core ports shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use notification_core::{
    ConnectionHandle, ConnectionState, NewPost, NewUser, NotificationApi, NotificationRecord,
    NotificationStatus, NotificationSurface, NotificationType, PortError, PortResult, Post,
    PushTransport, StoreView, SyncCore, TransportEvent, TransportStream, TriggerEvent, User,
};
use tokio::sync::{broadcast, watch, Notify};

pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        username: id.to_string(),
        email: format!("{}@insyd.com", id),
        created_at: None,
    }
}

pub fn notification(id: &str, minute: i64, status: NotificationStatus) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        kind: NotificationType::Like,
        title: format!("New like {}", id),
        content: format!("Someone liked your post ({})", id),
        status,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
            + ChronoDuration::minutes(minute),
        source_user: None,
        recipient_id: None,
    }
}

pub fn unread(id: &str, minute: i64) -> NotificationRecord {
    notification(id, minute, NotificationStatus::Unread)
}

//=========================================================================================
// Fake REST API
//=========================================================================================

#[derive(Default)]
pub struct FakeApi {
    notifications: Mutex<HashMap<String, Vec<NotificationRecord>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub marked_read: Mutex<Vec<String>>,
    pub cleared: Mutex<Vec<String>>,
    pub fail_mutations: AtomicBool,
    pub users: Mutex<Vec<User>>,
}

impl FakeApi {
    pub fn with_notifications(user_id: &str, records: Vec<NotificationRecord>) -> Self {
        let api = Self::default();
        api.set_notifications(user_id, records);
        api
    }

    pub fn set_notifications(&self, user_id: &str, records: Vec<NotificationRecord>) {
        self.notifications
            .lock()
            .unwrap()
            .insert(user_id.to_string(), records);
    }

    /// Makes the next list fetch for `user_id` wait until `release` is called.
    pub fn hold(&self, user_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(user_id.to_string(), gate.clone());
        gate
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn fetch_notifications(&self, user_id: &str) -> PortResult<Vec<NotificationRecord>> {
        let gate = self.gates.lock().unwrap().remove(user_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_unread_count(&self, user_id: &str) -> PortResult<u64> {
        let notifications = self.notifications.lock().unwrap();
        Ok(notifications
            .get(user_id)
            .map(|records| records.iter().filter(|r| r.is_unread()).count() as u64)
            .unwrap_or(0))
    }

    async fn mark_read(&self, notification_id: &str) -> PortResult<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(PortError::Network("connection refused".to_string()));
        }
        let mut notifications = self.notifications.lock().unwrap();
        let record = notifications
            .values_mut()
            .flat_map(|records| records.iter_mut())
            .find(|r| r.id == notification_id)
            .ok_or_else(|| PortError::NotFound(format!("Notification {} not found", notification_id)))?;
        record.status = NotificationStatus::Read;
        self.marked_read
            .lock()
            .unwrap()
            .push(notification_id.to_string());
        Ok(())
    }

    async fn clear_all(&self, user_id: &str) -> PortResult<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(PortError::Network("connection refused".to_string()));
        }
        self.notifications.lock().unwrap().remove(user_id);
        self.cleared.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn trigger_event(&self, _event: &TriggerEvent) -> PortResult<()> {
        Ok(())
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn create_user(&self, new_user: &NewUser) -> PortResult<User> {
        let created = user(&new_user.username);
        self.users.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list_posts(&self, _user_id: &str) -> PortResult<Vec<Post>> {
        Ok(Vec::new())
    }

    async fn create_post(&self, post: &NewPost) -> PortResult<Post> {
        Ok(Post {
            id: format!("post-{}", post.title),
            user_id: post.user_id.clone(),
            title: post.title.clone(),
            created_at: None,
        })
    }
}

//=========================================================================================
// Fake Push Transport
//=========================================================================================

pub struct FakeTransport {
    events: broadcast::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    pub identities: Mutex<Vec<Option<String>>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            events,
            state,
            identities: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTransport {
    pub fn push(&self, record: NotificationRecord) {
        let _ = self.events.send(TransportEvent::Notification(record));
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
        let _ = self.events.send(TransportEvent::State(state));
    }

    pub fn identities(&self) -> Vec<Option<String>> {
        self.identities.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self) -> PortResult<ConnectionHandle> {
        self.set_state(ConnectionState::Connected);
        Ok(ConnectionHandle::new(self.state.subscribe()))
    }

    async fn identify(&self, user_id: &str) {
        self.identities
            .lock()
            .unwrap()
            .push(Some(user_id.to_string()));
    }

    async fn detach(&self) {
        self.identities.lock().unwrap().push(None);
    }

    fn subscribe(&self) -> TransportStream {
        let rx = self.events.subscribe();
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }

    async fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnected);
    }
}

//=========================================================================================
// Fake Surface
//=========================================================================================

#[derive(Default)]
pub struct RecordingSurface {
    pub permitted: bool,
    pub alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingSurface {
    pub fn permitted() -> Self {
        Self {
            permitted: true,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap().clone()
    }
}

impl NotificationSurface for RecordingSurface {
    fn is_permitted(&self) -> bool {
        self.permitted
    }

    fn notify(&self, title: &str, content: &str) -> PortResult<()> {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), content.to_string()));
        Ok(())
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub transport: Arc<FakeTransport>,
    pub surface: Arc<RecordingSurface>,
    pub sync: SyncCore,
}

impl Harness {
    pub async fn start(api: FakeApi) -> Self {
        Self::start_with_surface(api, RecordingSurface::permitted()).await
    }

    pub async fn start_with_surface(api: FakeApi, surface: RecordingSurface) -> Self {
        let api = Arc::new(api);
        let transport = Arc::new(FakeTransport::default());
        let surface = Arc::new(surface);
        let sync = SyncCore::start(api.clone(), transport.clone(), Some(surface.clone()))
            .await
            .expect("sync core should start");
        Self {
            api,
            transport,
            surface,
            sync,
        }
    }

    /// Waits (bounded) until the published view satisfies `predicate`.
    pub async fn wait_until(&self, predicate: impl FnMut(&StoreView) -> bool) -> StoreView {
        let mut view = self.sync.subscribe();
        let result = tokio::time::timeout(Duration::from_secs(2), view.wait_for(predicate))
            .await
            .expect("timed out waiting for store view")
            .expect("reconciler stopped");
        result.clone()
    }
}

pub fn ids(view: &StoreView) -> Vec<String> {
    view.records.iter().map(|r| r.id.clone()).collect()
}
