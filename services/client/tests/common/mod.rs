//! Common end-to-end test infrastructure
//!
//! An in-process stub of the notification server (REST under `/api` plus the
//! `/ws` push endpoint) and helpers that start a real client against it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use chrono::Utc;
use client_lib::adapters::push::{Backoff, WsTransport};
use client_lib::adapters::rest::RestApiAdapter;
use client_lib::adapters::surface::ConsoleSurface;
use futures::{SinkExt, StreamExt};
use notification_core::{NotificationApi, NotificationSurface, StoreView, SyncCore};
use reqwest::Url;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};

//=========================================================================================
// Stub Server State
//=========================================================================================

type Outbox = mpsc::UnboundedSender<String>;

#[derive(Default)]
struct StubData {
    users: Vec<Value>,
    posts: Vec<Value>,
    /// Newest first.
    notifications: Vec<Value>,
    sockets: HashMap<String, Vec<Outbox>>,
    identities: Vec<String>,
}

impl StubData {
    fn username(&self, user_id: &str) -> String {
        self.users
            .iter()
            .find(|u| u["_id"] == user_id)
            .and_then(|u| u["username"].as_str())
            .unwrap_or("Someone")
            .to_string()
    }

    fn deliver(&mut self, user_id: &str, frame: &str) {
        if let Some(outboxes) = self.sockets.get_mut(user_id) {
            outboxes.retain(|outbox| outbox.send(frame.to_string()).is_ok());
        }
    }
}

#[derive(Clone)]
struct StubState {
    data: Arc<Mutex<StubData>>,
    kick: broadcast::Sender<()>,
}

//=========================================================================================
// Test Server
//=========================================================================================

/// A stub notification server on a random local port. Shuts down when dropped.
pub struct TestServer {
    pub base_url: String,
    state: StubState,
    _shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let (kick, _) = broadcast::channel(4);
        let state = StubState {
            data: Arc::new(Mutex::new(StubData::default())),
            kick,
        };

        let app = Router::new()
            .route("/api/users", get(list_users).post(create_user))
            .route("/api/posts", get(list_posts).post(create_post))
            .route("/api/events", axum::routing::post(trigger_event))
            .route("/api/notifications/{id}", get(list_notifications))
            .route("/api/notifications/{id}/count", get(unread_count))
            .route("/api/notifications/{id}/read", patch(mark_read))
            .route("/api/notifications/clear/{id}", delete(clear_all))
            .route("/ws", get(ws_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn push_url(&self) -> String {
        format!("{}/ws", self.base_url.replace("http://", "ws://"))
    }

    pub fn add_user(&self, id: &str, username: &str) {
        self.state.data.lock().unwrap().users.push(json!({
            "_id": id,
            "username": username,
            "email": format!("{}@insyd.com", username),
            "createdAt": Utc::now(),
        }));
    }

    pub fn add_post(&self, id: &str, user_id: &str, title: &str) {
        self.state.data.lock().unwrap().posts.push(json!({
            "_id": id,
            "userId": user_id,
            "title": title,
            "createdAt": Utc::now(),
        }));
    }

    pub fn add_notification(&self, id: &str, user_id: &str, status: &str) {
        self.state.data.lock().unwrap().notifications.push(json!({
            "_id": id,
            "userId": user_id,
            "type": "follow",
            "title": "New follower",
            "content": "Someone started following you",
            "status": status,
            "createdAt": Utc::now(),
        }));
    }

    pub fn unread_on_server(&self, user_id: &str) -> usize {
        self.state
            .data
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n["userId"] == user_id && n["status"] == "unread")
            .count()
    }

    pub fn identities(&self) -> Vec<String> {
        self.state.data.lock().unwrap().identities.clone()
    }

    /// Waits until `user_id` has identified at least `times` times.
    pub async fn wait_identified(&self, user_id: &str, times: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.identities().iter().filter(|id| *id == user_id).count() >= times {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "{} never identified {} times", user_id, times);
    }

    /// Closes every open push connection from the server side.
    pub fn kick_all(&self) {
        let _ = self.state.kick.send(());
    }

    /// Sends a raw text frame to every connection identified as `user_id`.
    pub fn push_raw(&self, user_id: &str, frame: &str) {
        self.state.data.lock().unwrap().deliver(user_id, frame);
    }
}

//=========================================================================================
// REST Handlers
//=========================================================================================

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message })))
}

async fn list_users(State(state): State<StubState>) -> Json<Value> {
    Json(Value::Array(state.data.lock().unwrap().users.clone()))
}

async fn create_user(State(state): State<StubState>, Json(body): Json<Value>) -> impl IntoResponse {
    let user = json!({
        "_id": uuid::Uuid::new_v4().to_string(),
        "username": body["username"],
        "email": body["email"],
        "createdAt": Utc::now(),
    });
    state.data.lock().unwrap().users.push(user.clone());
    (StatusCode::CREATED, Json(user))
}

async fn list_posts(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let data = state.data.lock().unwrap();
    let posts = data
        .posts
        .iter()
        .filter(|p| params.get("userId").map_or(true, |id| p["userId"] == id.as_str()))
        .cloned()
        .collect();
    Json(Value::Array(posts))
}

async fn create_post(State(state): State<StubState>, Json(body): Json<Value>) -> impl IntoResponse {
    let post = json!({
        "_id": uuid::Uuid::new_v4().to_string(),
        "userId": body["userId"],
        "title": body["title"],
        "createdAt": Utc::now(),
    });
    state.data.lock().unwrap().posts.push(post.clone());
    (StatusCode::CREATED, Json(post))
}

async fn list_notifications(State(state): State<StubState>, Path(user_id): Path<String>) -> Json<Value> {
    let data = state.data.lock().unwrap();
    let list = data
        .notifications
        .iter()
        .filter(|n| n["userId"] == user_id.as_str())
        .cloned()
        .collect();
    Json(Value::Array(list))
}

async fn unread_count(State(state): State<StubState>, Path(user_id): Path<String>) -> Json<Value> {
    let data = state.data.lock().unwrap();
    let count = data
        .notifications
        .iter()
        .filter(|n| n["userId"] == user_id.as_str() && n["status"] == "unread")
        .count();
    Json(json!({ "count": count }))
}

async fn mark_read(State(state): State<StubState>, Path(id): Path<String>) -> Reply {
    let mut data = state.data.lock().unwrap();
    let notification = data
        .notifications
        .iter_mut()
        .find(|n| n["_id"] == id.as_str())
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Notification not found"))?;
    notification["status"] = json!("read");
    Ok(Json(notification.clone()))
}

async fn clear_all(State(state): State<StubState>, Path(user_id): Path<String>) -> Json<Value> {
    let mut data = state.data.lock().unwrap();
    data.notifications.retain(|n| n["userId"] != user_id.as_str());
    Json(json!({ "message": "All notifications cleared" }))
}

async fn trigger_event(State(state): State<StubState>, Json(body): Json<Value>) -> Reply {
    let source = body["sourceUserId"].as_str().unwrap_or_default().to_string();
    let target = body["targetUserId"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "targetUserId is required"))?
        .to_string();

    let mut data = state.data.lock().unwrap();
    let username = data.username(&source);
    let entity_title = body["data"]["entityTitle"].as_str().unwrap_or_default();
    let (title, content) = match body["type"].as_str() {
        Some("like") => (
            "New like",
            format!("{} liked your post \"{}\"", username, entity_title),
        ),
        Some("comment") => (
            "New comment",
            format!(
                "{} commented on your post: \"{}\"",
                username,
                body["data"]["commentText"].as_str().unwrap_or_default()
            ),
        ),
        Some("follow") => ("New follower", format!("{} started following you", username)),
        _ => return Err(reject(StatusCode::BAD_REQUEST, "Unknown event type")),
    };

    let notification = json!({
        "_id": uuid::Uuid::new_v4().to_string(),
        "userId": target,
        "type": body["type"],
        "title": title,
        "content": content,
        "status": "unread",
        "createdAt": Utc::now(),
        "sourceUser": { "_id": source, "username": username },
    });
    data.notifications.insert(0, notification.clone());
    let frame = json!({ "event": "new_notification", "data": notification }).to_string();
    data.deliver(&target, &frame);
    Ok(Json(json!({ "message": "Event processed" })))
}

//=========================================================================================
// Push Endpoint
//=========================================================================================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<StubState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: StubState) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();
    let mut kick = state.kick.subscribe();

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = inbox.recv() => match frame {
                    Some(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = kick.recv() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        if value["event"] == "identify" {
            if let Some(user_id) = value["data"].as_str() {
                let mut data = state.data.lock().unwrap();
                for outboxes in data.sockets.values_mut() {
                    outboxes.retain(|o| !o.same_channel(&outbox));
                }
                data.sockets
                    .entry(user_id.to_string())
                    .or_default()
                    .push(outbox.clone());
                data.identities.push(user_id.to_string());
            }
        }
    }
    writer.abort();
}

//=========================================================================================
// Client Helpers
//=========================================================================================

pub fn rest_api(server: &TestServer) -> Arc<dyn NotificationApi> {
    let base_url = Url::parse(&server.base_url).unwrap();
    Arc::new(RestApiAdapter::new(reqwest::Client::new(), base_url))
}

/// Starts a client wired with the real REST and WebSocket adapters.
pub async fn start_client(server: &TestServer) -> SyncCore {
    let transport = Arc::new(WsTransport::new(
        server.push_url(),
        Backoff {
            initial: Duration::from_millis(20),
            max: Duration::from_millis(100),
        },
    ));
    let surface: Arc<dyn NotificationSurface> = Arc::new(ConsoleSurface::new(false));
    SyncCore::start(rest_api(server), transport, Some(surface))
        .await
        .unwrap()
}

/// Waits until the published view satisfies `predicate`.
pub async fn wait_view(sync: &SyncCore, predicate: impl Fn(&StoreView) -> bool) -> StoreView {
    let mut view = sync.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(5), view.wait_for(|v| predicate(v))).await;
    match result {
        Ok(Ok(current)) => current.clone(),
        _ => panic!("view never matched; last view: {:?}", sync.snapshot()),
    }
}
