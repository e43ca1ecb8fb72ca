//! services/client/src/adapters/rest.rs
//!
//! This module contains the REST adapter, which is the concrete implementation
//! of the `NotificationApi` port from the `core` crate. It handles all
//! request/response traffic with the notification server using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notification_core::domain::{NotificationRecord, Post, User};
use notification_core::events::{NewPost, NewUser, TriggerEvent};
use notification_core::ports::{NotificationApi, PortError, PortResult};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::protocol::NotificationDto;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A REST adapter that implements the `NotificationApi` port.
#[derive(Clone)]
pub struct RestApiAdapter {
    client: Client,
    base_url: Url,
}

impl RestApiAdapter {
    /// Creates a new `RestApiAdapter`. All paths are resolved under `{base_url}/api`.
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Validation(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    #[serde(alias = "_id")]
    id: String,
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    user_id: String,
    title: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}
impl PostRecord {
    fn to_domain(self) -> Post {
        Post {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
struct CountRecord {
    count: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerEventBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    source_user_id: &'a str,
    target_user_id: &'a str,
    entity_id: &'a str,
    data: EventDataBody<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDataBody<'a> {
    entity_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment_text: Option<&'a str>,
}

impl<'a> From<&'a TriggerEvent> for TriggerEventBody<'a> {
    fn from(event: &'a TriggerEvent) -> Self {
        Self {
            kind: event.kind.as_str(),
            source_user_id: &event.source_user_id,
            target_user_id: &event.target_user_id,
            entity_id: &event.entity_id,
            data: EventDataBody {
                entity_type: event.data.entity_type,
                entity_title: event.data.entity_title.as_deref(),
                comment_text: event.data.comment_text.as_deref(),
            },
        }
    }
}

#[derive(Serialize)]
struct NewUserBody<'a> {
    username: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPostBody<'a> {
    user_id: &'a str,
    title: &'a str,
}

//=========================================================================================
// Response Handling
//=========================================================================================

fn network_error(e: reqwest::Error) -> PortError {
    PortError::Network(e.to_string())
}

/// Turns a non-success status into the matching `PortError`.
async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    Err(match status {
        StatusCode::NOT_FOUND => PortError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PortError::Validation(message),
        _ => PortError::Network(format!("{}: {}", status, message)),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    check_status(response)
        .await?
        .json::<T>()
        .await
        .map_err(network_error)
}

//=========================================================================================
// `NotificationApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationApi for RestApiAdapter {
    async fn fetch_notifications(&self, user_id: &str) -> PortResult<Vec<NotificationRecord>> {
        let url = self.url(&["notifications", user_id])?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(network_error)?;
        let records: Vec<NotificationDto> = read_json(response).await?;
        Ok(records.into_iter().map(NotificationDto::to_domain).collect())
    }

    async fn fetch_unread_count(&self, user_id: &str) -> PortResult<u64> {
        let url = self.url(&["notifications", user_id, "count"])?;
        let response = self.client.get(url).send().await.map_err(network_error)?;
        let record: CountRecord = read_json(response).await?;
        Ok(record.count)
    }

    async fn mark_read(&self, notification_id: &str) -> PortResult<()> {
        let url = self.url(&["notifications", notification_id, "read"])?;
        debug!("PATCH {}", url);
        let response = self.client.patch(url).send().await.map_err(network_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn clear_all(&self, user_id: &str) -> PortResult<()> {
        let url = self.url(&["notifications", "clear", user_id])?;
        debug!("DELETE {}", url);
        let response = self.client.delete(url).send().await.map_err(network_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn trigger_event(&self, event: &TriggerEvent) -> PortResult<()> {
        let url = self.url(&["events"])?;
        let response = self
            .client
            .post(url)
            .json(&TriggerEventBody::from(event))
            .send()
            .await
            .map_err(network_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let url = self.url(&["users"])?;
        let response = self.client.get(url).send().await.map_err(network_error)?;
        let records: Vec<UserRecord> = read_json(response).await?;
        Ok(records.into_iter().map(UserRecord::to_domain).collect())
    }

    async fn create_user(&self, user: &NewUser) -> PortResult<User> {
        let url = self.url(&["users"])?;
        let body = NewUserBody {
            username: &user.username,
            email: &user.email,
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let record: UserRecord = read_json(response).await?;
        Ok(record.to_domain())
    }

    async fn list_posts(&self, user_id: &str) -> PortResult<Vec<Post>> {
        let url = self.url(&["posts"])?;
        let response = self
            .client
            .get(url)
            .query(&[("userId", user_id)])
            .send()
            .await
            .map_err(network_error)?;
        let records: Vec<PostRecord> = read_json(response).await?;
        Ok(records.into_iter().map(PostRecord::to_domain).collect())
    }

    async fn create_post(&self, post: &NewPost) -> PortResult<Post> {
        let url = self.url(&["posts"])?;
        let body = NewPostBody {
            user_id: &post.user_id,
            title: &post.title,
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;
        let record: PostRecord = read_json(response).await?;
        Ok(record.to_domain())
    }
}
