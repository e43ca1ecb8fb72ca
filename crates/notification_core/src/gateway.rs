//! crates/notification_core/src/gateway.rs
//!
//! Optimistic mutations. The local store is updated first, then the server is
//! asked to do the same. A server failure is returned to the caller but the
//! local change is kept: the server stays the source of truth and the next
//! fetch reconciles any divergence.

use std::sync::Arc;

use tracing::{debug, error};

use crate::ports::{NotificationApi, PortError, PortResult};
use crate::queue::{Inbound, MutationQueue};
use crate::session::SessionController;

#[derive(Clone)]
pub struct MutationGateway {
    queue: MutationQueue,
    api: Arc<dyn NotificationApi>,
    session: SessionController,
}

impl MutationGateway {
    pub fn new(queue: MutationQueue, api: Arc<dyn NotificationApi>, session: SessionController) -> Self {
        Self {
            queue,
            api,
            session,
        }
    }

    /// Marks a notification read locally, then on the server.
    ///
    /// Fails with `Network` or `NotFound`.
    pub async fn request_mark_read(&self, id: &str) -> PortResult<()> {
        let Some((epoch, _)) = self.session.current().await else {
            debug!("Ignoring mark-read for {} with no active user", id);
            return Ok(());
        };
        self.queue
            .apply(Inbound::MarkRead {
                epoch,
                id: id.to_string(),
            })
            .await;

        self.api.mark_read(id).await.map_err(|e| {
            error!("Error marking notification {} as read: {}", id, e);
            match e {
                PortError::NotFound(_) | PortError::Network(_) => e,
                other => PortError::Network(other.to_string()),
            }
        })
    }

    /// Clears every notification of the active user, locally then on the server.
    ///
    /// Fails with `Network`. Without an active user this does nothing.
    pub async fn request_clear_all(&self) -> PortResult<()> {
        let Some((epoch, user)) = self.session.current().await else {
            debug!("Ignoring clear-all with no active user");
            return Ok(());
        };
        self.queue.apply(Inbound::ClearAll { epoch }).await;

        self.api.clear_all(&user.id).await.map_err(|e| {
            error!("Error clearing notifications for {}: {}", user.id, e);
            match e {
                PortError::Network(_) => e,
                other => PortError::Network(other.to_string()),
            }
        })
    }
}
