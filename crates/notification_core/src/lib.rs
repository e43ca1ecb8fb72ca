pub mod domain;
pub mod events;
pub mod gateway;
pub mod ports;
pub mod queue;
pub mod reconciler;
pub mod session;
pub mod store;
pub mod sync;

pub use domain::{NotificationRecord, NotificationStatus, NotificationType, Post, User, UserRef};
pub use events::{EventDraft, EventKind, NewPost, NewUser, TriggerEvent};
pub use gateway::MutationGateway;
pub use ports::{
    ConnectionHandle, ConnectionState, NotificationApi, NotificationSurface, PortError, PortResult,
    PushTransport, TransportEvent, TransportStream,
};
pub use reconciler::{LoadState, StoreView};
pub use session::SessionController;
pub use store::NotificationStore;
pub use sync::SyncCore;
