//! crates/notification_core/src/sync.rs
//!
//! Wires the synchronization core together: the reconciler task, the push
//! forwarder, the session controller and the mutation gateway.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::gateway::MutationGateway;
use crate::ports::{
    ConnectionHandle, NotificationApi, NotificationSurface, PortError, PortResult, PushTransport,
    TransportEvent,
};
use crate::queue::{Inbound, MutationQueue};
use crate::reconciler::{LoadState, ReconcilerTask, StoreView};
use crate::session::SessionController;

pub struct SyncCore {
    session: SessionController,
    gateway: MutationGateway,
    queue: MutationQueue,
    view: watch::Receiver<StoreView>,
    transport: Arc<dyn PushTransport>,
    connection: ConnectionHandle,
    reconciler_task: JoinHandle<()>,
    push_task: JoinHandle<()>,
}

impl SyncCore {
    /// Spawns the reconciler, subscribes to the transport and connects it.
    pub async fn start(
        api: Arc<dyn NotificationApi>,
        transport: Arc<dyn PushTransport>,
        surface: Option<Arc<dyn NotificationSurface>>,
    ) -> PortResult<Self> {
        let (queue, rx) = MutationQueue::new();
        let (view_tx, view) = watch::channel(StoreView::default());

        let task = ReconcilerTask::new(api.clone(), surface, queue.clone(), view_tx);
        let reconciler_task = tokio::spawn(task.run(rx));

        // Subscribe before connecting so the first state change is not missed.
        let mut events = transport.subscribe();
        let push_queue = queue.clone();
        let push_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    TransportEvent::State(state) => push_queue.send(Inbound::Connection(state)),
                    TransportEvent::Notification(record) => push_queue.send(Inbound::Pushed(record)),
                }
            }
        });

        let connection = match transport.connect().await {
            Ok(handle) => handle,
            Err(e) => {
                push_task.abort();
                queue.send(Inbound::Shutdown);
                return Err(e);
            }
        };
        info!("Notification sync started.");

        let session = SessionController::new(queue.clone(), transport.clone());
        let gateway = MutationGateway::new(queue.clone(), api, session.clone());

        Ok(Self {
            session,
            gateway,
            queue,
            view,
            transport,
            connection,
            reconciler_task,
            push_task,
        })
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// A receiver that is notified after every applied mutation.
    pub fn subscribe(&self) -> watch::Receiver<StoreView> {
        self.view.clone()
    }

    pub fn snapshot(&self) -> StoreView {
        self.view.borrow().clone()
    }

    /// Waits until the current load, if any, has finished.
    pub async fn wait_loaded(&self) -> PortResult<StoreView> {
        let mut view = self.view.clone();
        let current = view
            .wait_for(|v| v.load != LoadState::Loading)
            .await
            .map_err(|_| PortError::Transport("reconciler stopped".to_string()))?;
        Ok(current.clone())
    }

    /// Disconnects the transport and stops the background tasks.
    pub async fn shutdown(self) {
        self.transport.disconnect().await;
        self.push_task.abort();
        self.queue.send(Inbound::Shutdown);
        let _ = self.reconciler_task.await;
        info!("Notification sync stopped.");
    }
}
