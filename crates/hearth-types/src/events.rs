use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Channel, Identity, Message, Reaction};

/// Where a published event is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every connected client.
    Global,
    /// Connections subscribed to this channel id.
    Channel(i64),
}

/// How mutation events (reactions, edits, deletes) are routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Every channel-owned event goes to that channel's subscribers only.
    #[default]
    Channel,
    /// Legacy routing: only `new_message` is channel-scoped, every other
    /// event reaches all connections.
    Global,
}

impl FromStr for BroadcastScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "channel" => Ok(Self::Channel),
            "global" | "legacy" => Ok(Self::Global),
            other => Err(format!("unknown broadcast scope '{}'", other)),
        }
    }
}

impl fmt::Display for BroadcastScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => f.write_str("channel"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Events sent FROM server TO client over the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Handshake accepted; carries the identity bound to this connection.
    Ready(Identity),

    NewMessage(Message),

    ReactionAdded(ReactionAdded),

    ReactionRemoved(ReactionRemoved),

    MessageEdited(Message),

    MessageDeleted(MessageDeleted),

    ChannelCreated(Channel),

    /// Sent to the originating connection only, never broadcast.
    Error(GatewayError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionAdded {
    #[serde(flatten)]
    pub reaction: Reaction,
    pub channel_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRemoved {
    pub id: i64,
    pub message_id: i64,
    pub channel_id: i64,
    pub emoji: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    pub message_id: i64,
    pub channel_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: String,
    pub message: String,
}

impl GatewayEvent {
    /// The channel this event belongs to, if any.
    pub fn channel_id(&self) -> Option<i64> {
        match self {
            Self::NewMessage(m) | Self::MessageEdited(m) => Some(m.channel_id),
            Self::ReactionAdded(r) => Some(r.channel_id),
            Self::ReactionRemoved(r) => Some(r.channel_id),
            Self::MessageDeleted(d) => Some(d.channel_id),
            Self::Ready(_) | Self::ChannelCreated(_) | Self::Error(_) => None,
        }
    }

    /// Resolve the delivery topic. `channel_created` always rides the global
    /// topic since the channel has no subscribers yet.
    pub fn topic(&self, scope: BroadcastScope) -> Topic {
        match (self, scope) {
            (Self::NewMessage(m), _) => Topic::Channel(m.channel_id),
            (_, BroadcastScope::Global) => Topic::Global,
            (_, BroadcastScope::Channel) => self.channel_id().map_or(Topic::Global, Topic::Channel),
        }
    }

    /// Wire name of the event, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::NewMessage(_) => "new_message",
            Self::ReactionAdded(_) => "reaction_added",
            Self::ReactionRemoved(_) => "reaction_removed",
            Self::MessageEdited(_) => "message_edited",
            Self::MessageDeleted(_) => "message_deleted",
            Self::ChannelCreated(_) => "channel_created",
            Self::Error(_) => "error",
        }
    }
}

/// Commands sent FROM client TO server over the gateway.
///
/// None of them carries identity: the server acts as the identity bound at
/// handshake. Required fields are optional here so a missing one surfaces as
/// `invalid_input` instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Accepted for client compatibility; the claimed username is ignored.
    Identify(Identify),

    JoinChannel(JoinChannel),

    SendMessage(SendMessage),

    #[serde(alias = "react")]
    ToggleReaction(ToggleReaction),

    EditMessage(EditMessage),

    DeleteMessage(DeleteMessage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identify {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinChannel {
    pub channel_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendMessage {
    pub channel_id: Option<i64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToggleReaction {
    pub message_id: Option<i64>,
    #[serde(alias = "reaction")]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditMessage {
    pub message_id: Option<i64>,
    pub new_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteMessage {
    pub message_id: Option<i64>,
}
