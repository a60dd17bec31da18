//! Database row types. These map directly to SQLite rows and stay distinct
//! from the hearth-types models so the store has no wire concerns.

use hearth_types::models::{Channel, Message, Reaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub id: i64,
    pub channel_id: i64,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub timestamp: i64,
    pub edited_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub id: i64,
    pub message_id: i64,
    pub emoji: String,
    pub user_id: String,
    pub username: String,
    pub timestamp: i64,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

impl From<ReactionRow> for Reaction {
    fn from(row: ReactionRow) -> Self {
        Reaction {
            id: row.id,
            message_id: row.message_id,
            emoji: row.emoji,
            user_id: row.user_id,
            username: row.username,
            created_at: row.timestamp,
        }
    }
}

impl MessageRow {
    pub fn into_message(self, reactions: Vec<ReactionRow>) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            author_user_id: self.user_id,
            author_username: self.username,
            text: self.text,
            created_at: self.timestamp,
            edited_at: self.edited_at,
            reactions: reactions.into_iter().map(Reaction::from).collect(),
        }
    }
}

/// Result of an author-checked mutation. `NotFound` and `Forbidden` are
/// both silent no-ops for the caller; they are kept apart for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Applied(T),
    NotFound,
    Forbidden,
}

/// Result of a reaction toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Added { reaction: ReactionRow, channel_id: i64 },
    Removed { reaction: ReactionRow, channel_id: i64 },
    MessageMissing,
}

/// Result of a channel insert when name uniqueness may be enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInsert {
    Created(ChannelRow),
    DuplicateName,
}
