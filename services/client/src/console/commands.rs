//! services/client/src/console/commands.rs
//!
//! Parses one line of console input into a `Command`.

/// Refers to a listed item by its 1-based position or by name/id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `#n`: always a position.
    Index(usize),
    Key(String),
    /// A bare number: an exact name/id match wins, otherwise a position.
    Number { position: usize, key: String },
}

impl Selector {
    fn parse(raw: &str) -> Self {
        if let Some(n) = raw.strip_prefix('#').and_then(|n| n.parse::<usize>().ok()) {
            if n > 0 {
                return Self::Index(n);
            }
        }
        match raw.parse::<usize>() {
            Ok(n) if n > 0 => Self::Number {
                position: n,
                key: raw.to_string(),
            },
            _ => Self::Key(raw.to_string()),
        }
    }

    /// The raw name/id, unless this is an explicit `#n` position.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Index(_) => None,
            Self::Key(key) | Self::Number { key, .. } => Some(key.as_str()),
        }
    }

    /// Picks an item from `items`: by position, or the first one `matches` accepts.
    pub fn pick<'a, T>(&self, items: &'a [T], matches: impl Fn(&T, &str) -> bool) -> Option<&'a T> {
        let at = |n: usize| n.checked_sub(1).and_then(|i| items.get(i));
        match self {
            Self::Index(n) => at(*n),
            Self::Key(key) => items.iter().find(|item| matches(item, key)),
            Self::Number { position, key } => items
                .iter()
                .find(|item| matches(item, key))
                .or_else(|| at(*position)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Users,
    Use(Selector),
    AddUser { username: String, email: String },
    List,
    Read(Selector),
    Clear,
    Refresh,
    Posts(Option<Selector>),
    Post(String),
    Like { user: Selector, post: usize },
    Comment { user: Selector, post: usize, text: String },
    Follow(Selector),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  users                          list users
  use <n|#n|name|id>             switch the active user
  adduser <name> <email>         create a user
  list                           show notifications
  read <n|#n|id>                 mark a notification as read
  clear                          clear all notifications
  refresh                        reload notifications from the server
  posts [user]                   list posts (default: active user)
  post <title>                   create a post as the active user
  like <user> <post#>            like one of a user's posts
  comment <user> <post#> <text>  comment on one of a user's posts
  follow <user>                  follow a user
  status                         show the active user and connection
  help                           show this help
  quit                           exit";

/// Parses a console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let Some((name, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "users" => Command::Users,
        "use" => Command::Use(Selector::parse(required(rest, "use <n|#n|name|id>")?)),
        "adduser" => {
            let (username, email) = split_word(rest).ok_or("usage: adduser <name> <email>")?;
            if email.is_empty() {
                return Err("usage: adduser <name> <email>".to_string());
            }
            Command::AddUser {
                username: username.to_string(),
                email: email.to_string(),
            }
        }
        "list" | "ls" => Command::List,
        "read" => Command::Read(Selector::parse(required(rest, "read <n|#n|id>")?)),
        "clear" => Command::Clear,
        "refresh" => Command::Refresh,
        "posts" => Command::Posts((!rest.is_empty()).then(|| Selector::parse(rest))),
        "post" => Command::Post(required(rest, "post <title>")?.to_string()),
        "like" => {
            let (user, post) = user_and_post(rest, "like <user> <post#>")?;
            Command::Like { user, post }
        }
        "comment" => {
            let usage = "comment <user> <post#> <text>";
            let (user, rest) = split_word(rest).ok_or(format!("usage: {}", usage))?;
            let (post, text) = split_word(rest).ok_or(format!("usage: {}", usage))?;
            Command::Comment {
                user: Selector::parse(user),
                post: post_number(post)?,
                text: text.to_string(),
            }
        }
        "follow" => Command::Follow(Selector::parse(required(rest, "follow <user>")?)),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
    };
    Ok(Some(command))
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((input, "")),
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest)
    }
}

fn user_and_post(rest: &str, usage: &str) -> Result<(Selector, usize), String> {
    let (user, post) = split_word(rest).ok_or(format!("usage: {}", usage))?;
    Ok((Selector::parse(user), post_number(post)?))
}

fn post_number(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err("Please select a post".to_string()),
    }
}
