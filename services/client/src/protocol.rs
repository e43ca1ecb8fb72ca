//! services/client/src/protocol.rs
//!
//! Defines the JSON wire format shared by the REST and push endpoints, and the
//! push message protocol between this client and the notification server.

use chrono::{DateTime, Utc};
use notification_core::domain::{NotificationRecord, NotificationStatus, NotificationType, UserRef};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Notification Wire Record
//=========================================================================================

/// A notification as the server serializes it.
///
/// The server's document id may arrive as `_id` or `id`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_user: Option<SourceUserDto>,
    #[serde(default, alias = "recipientId")]
    pub user_id: Option<String>,
}

/// The actor, either populated or as a bare id.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum SourceUserDto {
    Populated {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default)]
        username: String,
    },
    Id(String),
}

impl NotificationDto {
    pub fn to_domain(self) -> NotificationRecord {
        let status = match self.status.as_deref() {
            Some("read") => NotificationStatus::Read,
            _ => NotificationStatus::Unread,
        };
        let source_user = self.source_user.map(|source| match source {
            SourceUserDto::Populated { id, username } => UserRef { id, username },
            SourceUserDto::Id(id) => UserRef {
                id,
                username: String::new(),
            },
        });
        NotificationRecord {
            id: self.id,
            kind: NotificationType::from_name(self.kind.as_deref().unwrap_or("other")),
            title: self.title,
            content: self.content,
            status,
            created_at: self.created_at,
            source_user,
            recipient_id: self.user_id,
        }
    }

    pub fn from_domain(record: &NotificationRecord) -> Self {
        Self {
            id: record.id.clone(),
            kind: Some(record.kind.as_str().to_string()),
            title: record.title.clone(),
            content: record.content.clone(),
            status: Some(
                match record.status {
                    NotificationStatus::Unread => "unread",
                    NotificationStatus::Read => "read",
                }
                .to_string(),
            ),
            created_at: record.created_at,
            source_user: record.source_user.as_ref().map(|user| SourceUserDto::Populated {
                id: user.id.clone(),
                username: user.username.clone(),
            }),
            user_id: record.recipient_id.clone(),
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Control messages the client sends over the push connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Binds the connection to a user. Sent after every (re)connect.
    Identify(String),
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Events the server pushes to the client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A notification was created for the identified user.
    NewNotification(NotificationDto),
}
