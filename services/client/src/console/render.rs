//! services/client/src/console/render.rs
//!
//! Text rendering of the store view, users and posts.

use chrono::{DateTime, Utc};
use notification_core::domain::{NotificationRecord, NotificationType, Post, User};
use notification_core::ports::ConnectionState;
use notification_core::StoreView;

pub fn icon(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Like => "👍",
        NotificationType::Comment => "💬",
        NotificationType::Follow => "👥",
        NotificationType::Post => "📝",
        NotificationType::Other => "🔔",
    }
}

/// Relative age of a timestamp, e.g. `5m ago`. Future timestamps read as `Just now`.
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", elapsed.num_days())
    }
}

pub fn connection(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "🟢 Connected",
        ConnectionState::Connecting => "🟡 Connecting",
        ConnectionState::Disconnected => "🔴 Disconnected",
    }
}

fn notification_line(index: usize, record: &NotificationRecord, now: DateTime<Utc>) -> String {
    let marker = if record.is_unread() { " •" } else { "" };
    let mut line = format!(
        "{:>3}. {} {}{}  ({})\n     {}",
        index + 1,
        icon(record.kind),
        record.title,
        marker,
        time_ago(record.created_at, now),
        record.content
    );
    if let Some(source) = record.source_user.as_ref().filter(|s| !s.username.is_empty()) {
        line.push_str(&format!("\n     @{}", source.username));
    }
    line
}

/// The notification panel: header with the unread badge, then one entry per record.
pub fn notifications(view: &StoreView, now: DateTime<Utc>) -> String {
    let mut out = format!("Notifications [{} unread]", view.unread_count);
    if view.records.is_empty() {
        out.push_str("\n  No notifications yet");
        return out;
    }
    for (index, record) in view.records.iter().enumerate() {
        out.push('\n');
        out.push_str(&notification_line(index, record, now));
    }
    out
}

pub fn users(users: &[User], active: Option<&str>) -> String {
    if users.is_empty() {
        return "No users yet. Create one with 'adduser <name> <email>'.".to_string();
    }
    users
        .iter()
        .enumerate()
        .map(|(index, user)| {
            let marker = if Some(user.id.as_str()) == active { "*" } else { " " };
            format!("{}{:>3}. {} <{}>", marker, index + 1, user.username, user.email)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn posts(owner: &User, posts: &[Post]) -> String {
    if posts.is_empty() {
        return format!("{} has no posts yet.", owner.username);
    }
    let mut out = format!("Posts by {}:", owner.username);
    for (index, post) in posts.iter().enumerate() {
        out.push_str(&format!("\n{:>3}. {}", index + 1, post.title));
    }
    out
}
