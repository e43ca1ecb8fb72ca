//! crates/notification_core/src/domain.rs
//!
//! Defines the pure, core data structures for the notification client.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};

/// The kind of activity a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
    Post,
    Other,
}

impl NotificationType {
    /// Parses the wire name; anything unknown becomes `Other`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "like" => Self::Like,
            "comment" => Self::Comment,
            "follow" => Self::Follow,
            "post" => Self::Post,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Post => "post",
            Self::Other => "other",
        }
    }
}

/// Read state of a notification.
///
/// Ordered so that `Unread < Read`: a status may only move upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NotificationStatus {
    Unread,
    Read,
}

/// A weak reference to the user that caused a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

/// A single notification as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub id: String,
    pub kind: NotificationType,
    pub title: String,
    pub content: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub source_user: Option<UserRef>,
    /// Recipient as reported by the server, when it sends one.
    pub recipient_id: Option<String>,
}

impl NotificationRecord {
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

// Represents a user of the social service - used for session selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A post owned by a user; the target of like and comment events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
}
