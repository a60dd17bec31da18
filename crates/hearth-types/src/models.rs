use serde::{Deserialize, Serialize};

/// Session facts as handed over by the login collaborator. Read-only to the
/// chat engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub authenticated: bool,
}

impl Session {
    pub fn authenticated(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Point-in-time `(user_id, username)` snapshot bound to one connection.
///
/// There are no setters: a changed username only shows up after the client
/// reconnects and a new snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    user_id: String,
    username: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Only the author of a message may edit or delete it. No moderator override.
    pub fn owns(&self, author_user_id: &str) -> bool {
        self.user_id == author_user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

/// A chat message with its reactions, oldest reaction first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub channel_id: i64,
    pub author_user_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: i64,
    pub message_id: i64,
    pub emoji: String,
    pub user_id: String,
    pub username: String,
    pub created_at: i64,
}
