//! services/client/src/console/mod.rs
//!
//! The line-oriented console front end. Each line is parsed into a `Command`
//! and executed against the sync core (notifications) or directly against the
//! REST port (users, posts and events).

pub mod commands;
pub mod render;

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use notification_core::domain::{Post, User};
use notification_core::events::{EventDraft, EventKind, NewPost, NewUser};
use notification_core::ports::{ConnectionState, NotificationApi, PortError, PortResult};
use notification_core::{LoadState, SyncCore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::ClientError;
use commands::{Command, Selector, HELP};

/// Whether the console keeps reading after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<'a> {
    sync: &'a SyncCore,
    api: Arc<dyn NotificationApi>,
    users: Vec<User>,
}

impl<'a> Console<'a> {
    pub fn new(sync: &'a SyncCore, api: Arc<dyn NotificationApi>) -> Self {
        Self {
            sync,
            api,
            users: Vec::new(),
        }
    }

    /// Loads the users, selects the first one and then executes `input` line by line.
    pub async fn run<R>(&mut self, input: R) -> Result<(), ClientError>
    where
        R: AsyncBufRead + Unpin,
    {
        match self.reload_users().await {
            Ok(()) => {
                if self.sync.session().auto_select_first(&self.users).await {
                    self.show_loaded().await;
                }
            }
            Err(e) => println!("Error loading users: {}", e),
        }
        println!("Type 'help' for the list of commands.");

        let watcher = self.watch_connection();
        let mut lines = input.lines();
        let result = loop {
            print!("> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break Ok(());
            };
            match commands::parse(&line) {
                Ok(None) => {}
                Ok(Some(command)) => match self.execute(command).await {
                    Ok(Flow::Quit) => break Ok(()),
                    Ok(Flow::Continue) => {}
                    Err(e) => {
                        warn!("Command failed: {}", e);
                        println!("Error: {}", e);
                    }
                },
                Err(message) => println!("{}", message),
            }
        };
        watcher.abort();
        result
    }

    /// Prints connection transitions as they happen.
    fn watch_connection(&self) -> JoinHandle<()> {
        let mut view = self.sync.subscribe();
        tokio::spawn(async move {
            let mut last = view.borrow().connection;
            while view.changed().await.is_ok() {
                let current = view.borrow().connection;
                if current != last {
                    println!("\n{}", render::connection(current));
                    last = current;
                }
            }
        })
    }

    pub async fn execute(&mut self, command: Command) -> PortResult<Flow> {
        match command {
            Command::Users => {
                self.reload_users().await?;
                let active = self.sync.session().active_user().await;
                println!("{}", render::users(&self.users, active.as_ref().map(|u| u.id.as_str())));
            }
            Command::Use(selector) => {
                let user = self.resolve_user(&selector).await?;
                if self.sync.session().select_user(user.clone()).await {
                    println!("Now acting as {}.", user.username);
                    self.show_loaded().await;
                } else {
                    println!("{} is already active.", user.username);
                }
            }
            Command::AddUser { username, email } => {
                let new_user = NewUser::validate(&username, &email)?;
                let user = self.api.create_user(&new_user).await?;
                info!("Created user {} ({})", user.username, user.id);
                println!("Created user {}.", user.username);
                self.users.push(user);
                if self.sync.session().auto_select_first(&self.users).await {
                    self.show_loaded().await;
                }
            }
            Command::List => self.show_notifications(),
            Command::Read(selector) => {
                let view = self.sync.snapshot();
                let id = match selector.pick(&view.records, |record, key| record.id == key) {
                    Some(record) => record.id.clone(),
                    // Unlisted ids still go to the server, which reports unknown ones.
                    None => selector
                        .key()
                        .map(str::to_string)
                        .ok_or_else(|| PortError::NotFound("no such notification".to_string()))?,
                };
                self.sync.gateway().request_mark_read(&id).await?;
                self.show_notifications();
            }
            Command::Clear => {
                self.sync.gateway().request_clear_all().await?;
                println!("Notifications cleared.");
            }
            Command::Refresh => {
                self.sync.session().refresh().await;
                self.show_loaded().await;
            }
            Command::Posts(selector) => {
                let owner = match selector {
                    Some(selector) => self.resolve_user(&selector).await?,
                    None => self.active_user().await?,
                };
                let posts = self.api.list_posts(&owner.id).await?;
                println!("{}", render::posts(&owner, &posts));
            }
            Command::Post(title) => {
                let author = self.active_user().await?;
                let post = self.api.create_post(&NewPost::validate(&author.id, &title)?).await?;
                info!("Created post {} for {}", post.id, author.id);
                println!("Created post '{}'.", post.title);
            }
            Command::Like { user, post } => {
                let source = self.active_user().await?;
                let target = self.resolve_user(&user).await?;
                let post = self.pick_post(&target, post).await?;
                let draft = EventDraft::new(EventKind::Like, &source.id)
                    .target(&target.id)
                    .post(post.id, post.title);
                self.trigger(draft).await?;
            }
            Command::Comment { user, post, text } => {
                let source = self.active_user().await?;
                let target = self.resolve_user(&user).await?;
                let post = self.pick_post(&target, post).await?;
                let draft = EventDraft::new(EventKind::Comment, &source.id)
                    .target(&target.id)
                    .post(post.id, post.title)
                    .comment(text);
                self.trigger(draft).await?;
            }
            Command::Follow(user) => {
                let source = self.active_user().await?;
                let target = self.resolve_user(&user).await?;
                self.trigger(EventDraft::new(EventKind::Follow, &source.id).target(&target.id))
                    .await?;
            }
            Command::Status => {
                let active = self.sync.session().active_user().await;
                let view = self.sync.snapshot();
                println!(
                    "User: {}\n{}\nUnread: {}",
                    active.map(|u| u.username).unwrap_or_else(|| "(none)".to_string()),
                    render::connection(self.sync.connection().state()),
                    view.unread_count
                );
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn reload_users(&mut self) -> PortResult<()> {
        self.users = self.api.list_users().await?;
        Ok(())
    }

    /// Finds a user by position, username or id. Reloads the list once on a miss.
    async fn resolve_user(&mut self, selector: &Selector) -> PortResult<User> {
        let matches = |user: &User, key: &str| user.id == key || user.username == key;
        if let Some(user) = selector.pick(&self.users, matches) {
            return Ok(user.clone());
        }
        self.reload_users().await?;
        selector
            .pick(&self.users, matches)
            .cloned()
            .ok_or_else(|| PortError::Validation("Please select a target user".to_string()))
    }

    async fn active_user(&self) -> PortResult<User> {
        self.sync
            .session()
            .active_user()
            .await
            .ok_or_else(|| PortError::Validation("Select a user first with 'use'".to_string()))
    }

    async fn pick_post(&self, owner: &User, number: usize) -> PortResult<Post> {
        let posts = self.api.list_posts(&owner.id).await?;
        number
            .checked_sub(1)
            .and_then(|i| posts.into_iter().nth(i))
            .ok_or_else(|| PortError::Validation("Please select a post".to_string()))
    }

    async fn trigger(&self, draft: EventDraft) -> PortResult<()> {
        let event = draft.validate()?;
        self.api.trigger_event(&event).await?;
        info!("Triggered {} event for {}", event.kind.as_str(), event.target_user_id);
        println!("Event triggered successfully!");
        Ok(())
    }

    async fn show_loaded(&self) {
        if let Err(e) = self.sync.wait_loaded().await {
            warn!("Could not wait for notifications: {}", e);
        }
        self.show_notifications();
    }

    fn show_notifications(&self) {
        let view = self.sync.snapshot();
        match &view.load {
            LoadState::Idle => println!("No active user. Pick one with 'use'."),
            LoadState::Loading => println!("Loading notifications..."),
            LoadState::Failed(message) => {
                println!("Failed to load notifications: {}", message);
                println!("{}", render::notifications(&view, Utc::now()));
            }
            LoadState::Loaded => println!("{}", render::notifications(&view, Utc::now())),
        }
        if view.connection != ConnectionState::Connected {
            println!("{}", render::connection(view.connection));
        }
    }
}
