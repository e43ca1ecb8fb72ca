//! crates/notification_core/src/events.rs
//!
//! Request builders for the operations that create data on the server:
//! triggering an activity event, creating a user and creating a post.
//! Each draft is validated before it can reach a `NotificationApi`.

use crate::ports::{PortError, PortResult};

/// Longest comment the server accepts, in characters.
pub const MAX_COMMENT_LEN: usize = 200;

/// Shortest accepted username, in characters.
pub const MIN_USERNAME_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Like,
    Comment,
    Follow,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }

    fn needs_post(&self) -> bool {
        matches!(self, Self::Like | Self::Comment)
    }
}

/// The post an event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTarget {
    pub id: String,
    pub title: String,
}

/// Event payload sent alongside the ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    pub entity_type: &'static str,
    pub entity_title: Option<String>,
    pub comment_text: Option<String>,
}

/// A validated `POST /events` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub source_user_id: String,
    pub target_user_id: String,
    pub entity_id: String,
    pub data: EventData,
}

/// User input for an event, not yet validated.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub kind: EventKind,
    pub source_user_id: String,
    pub target_user_id: Option<String>,
    pub post: Option<PostTarget>,
    pub comment_text: Option<String>,
}

impl EventDraft {
    pub fn new(kind: EventKind, source_user_id: impl Into<String>) -> Self {
        Self {
            kind,
            source_user_id: source_user_id.into(),
            target_user_id: None,
            post: None,
            comment_text: None,
        }
    }

    pub fn target(mut self, user_id: impl Into<String>) -> Self {
        self.target_user_id = Some(user_id.into());
        self
    }

    pub fn post(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.post = Some(PostTarget {
            id: id.into(),
            title: title.into(),
        });
        self
    }

    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment_text = Some(text.into());
        self
    }

    /// Checks the draft and builds the request the server expects.
    pub fn validate(self) -> PortResult<TriggerEvent> {
        let target_user_id = self
            .target_user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| PortError::Validation("Please select a target user".to_string()))?;

        if target_user_id == self.source_user_id {
            return Err(PortError::Validation(
                "Cannot trigger event on yourself".to_string(),
            ));
        }

        let post = match (self.kind.needs_post(), self.post) {
            (true, None) => {
                return Err(PortError::Validation("Please select a post".to_string()))
            }
            (true, Some(post)) => Some(post),
            (false, _) => None,
        };

        let comment_text = match self.kind {
            EventKind::Comment => {
                let text = self.comment_text.unwrap_or_default().trim().to_string();
                if text.is_empty() {
                    return Err(PortError::Validation("Please enter a comment".to_string()));
                }
                if text.chars().count() > MAX_COMMENT_LEN {
                    return Err(PortError::Validation(format!(
                        "Comment must be at most {} characters",
                        MAX_COMMENT_LEN
                    )));
                }
                Some(text)
            }
            _ => None,
        };

        let (entity_id, data) = match post {
            Some(post) => (
                post.id,
                EventData {
                    entity_type: "post",
                    entity_title: Some(post.title),
                    comment_text,
                },
            ),
            None => (
                target_user_id.clone(),
                EventData {
                    entity_type: "user",
                    entity_title: None,
                    comment_text: None,
                },
            ),
        };

        Ok(TriggerEvent {
            kind: self.kind,
            source_user_id: self.source_user_id,
            target_user_id,
            entity_id,
            data,
        })
    }
}

/// A `POST /users` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

impl NewUser {
    pub fn validate(username: &str, email: &str) -> PortResult<Self> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(PortError::Validation(
                "Username and email are required".to_string(),
            ));
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(PortError::Validation(format!(
                "Username must be at least {} characters long",
                MIN_USERNAME_LEN
            )));
        }
        Ok(Self {
            username: username.to_string(),
            email: email.to_string(),
        })
    }
}

/// A `POST /posts` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: String,
    pub title: String,
}

impl NewPost {
    pub fn validate(user_id: &str, title: &str) -> PortResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PortError::Validation("Post title is required".to_string()));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
        })
    }
}
