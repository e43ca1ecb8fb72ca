//! crates/notification_core/src/session.rs
//!
//! The session controller: owns the active user, the session epoch and the
//! transport identity. It is the only component that calls `identify`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::domain::User;
use crate::ports::PushTransport;
use crate::queue::{Epoch, Inbound, MutationQueue};

#[derive(Debug, Default)]
struct SessionState {
    active: Option<User>,
    epoch: Epoch,
}

/// Shared handle to the one client session. Clones refer to the same session.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    queue: MutationQueue,
    transport: Arc<dyn PushTransport>,
}

impl SessionController {
    pub fn new(queue: MutationQueue, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            queue,
            transport,
        }
    }

    /// Makes `user` the active user. Returns `false` if it already was.
    ///
    /// The store is reset and reloaded, and the transport is re-identified.
    /// A fetch still running for the previous user is discarded when it lands.
    pub async fn select_user(&self, user: User) -> bool {
        // Held for the whole switch so concurrent selections cannot interleave.
        let mut state = self.state.lock().await;
        if state.active.as_ref().map(|u| u.id.as_str()) == Some(user.id.as_str()) {
            return false;
        }

        state.epoch += 1;
        let epoch = state.epoch;
        info!("Switching active user to {} ({})", user.username, user.id);

        self.queue
            .apply(Inbound::Activate {
                epoch,
                user_id: user.id.clone(),
            })
            .await;
        self.transport.identify(&user.id).await;
        state.active = Some(user);
        true
    }

    /// Clears the active user: the store is emptied and the transport identity dropped.
    pub async fn deactivate(&self) {
        let mut state = self.state.lock().await;
        if state.active.is_none() {
            return;
        }
        state.epoch += 1;
        let epoch = state.epoch;
        info!("Deactivating session");

        self.queue.apply(Inbound::Deactivate { epoch }).await;
        self.transport.detach().await;
        state.active = None;
    }

    /// Selects the first user of `users` when nobody is active yet.
    pub async fn auto_select_first(&self, users: &[User]) -> bool {
        if self.active_user().await.is_some() {
            return false;
        }
        match users.first() {
            Some(first) => self.select_user(first.clone()).await,
            None => false,
        }
    }

    pub async fn active_user(&self) -> Option<User> {
        self.state.lock().await.active.clone()
    }

    /// The active user together with the epoch it was selected in.
    pub async fn current(&self) -> Option<(Epoch, User)> {
        let state = self.state.lock().await;
        state.active.clone().map(|user| (state.epoch, user))
    }

    /// Asks the reconciler to re-fetch the active user's notifications.
    pub async fn refresh(&self) {
        if let Some((epoch, _)) = self.current().await {
            self.queue.apply(Inbound::Refresh { epoch }).await;
        }
    }
}
