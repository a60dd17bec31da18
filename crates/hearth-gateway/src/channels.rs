use tracing::info;
use uuid::Uuid;

use hearth_db::models::ChannelInsert;
use hearth_types::events::{GatewayEvent, JoinChannel};
use hearth_types::models::{Channel, Identity};

use crate::error::ChatError;
use crate::service::{ChatService, now_millis};

impl ChatService {
    /// Create a channel and announce it on the global topic.
    pub async fn create_channel(&self, creator: &Identity, name: Option<String>) -> Result<Channel, ChatError> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ChatError::InvalidInput("name"))?;

        let unique = self.settings().unique_channel_names;
        let lookup = name.clone();
        let _order = self.sequence().await;
        let now = now_millis();
        let inserted = self.store(move |db| db.insert_channel(&lookup, now, unique)).await?;

        let channel = match inserted {
            ChannelInsert::Created(row) => Channel::from(row),
            ChannelInsert::DuplicateName => return Err(ChatError::Conflict(name)),
        };

        info!(
            "{} ({}) created channel #{} '{}'",
            creator.username(),
            creator.user_id(),
            channel.id,
            channel.name
        );
        self.dispatcher().publish(GatewayEvent::ChannelCreated(channel.clone()));
        Ok(channel)
    }

    /// All channels, lexically by name.
    pub async fn list_channels(&self) -> Result<Vec<Channel>, ChatError> {
        let rows = self.store(|db| db.list_channels()).await?;
        Ok(rows.into_iter().map(Channel::from).collect())
    }

    /// Add a channel to a connection's topic set. Unknown channel ids are
    /// accepted and simply never deliver anything.
    pub async fn join_channel(&self, conn_id: Uuid, cmd: JoinChannel) -> Result<(), ChatError> {
        let channel_id = cmd.channel_id.ok_or(ChatError::InvalidInput("channelId"))?;
        self.dispatcher().subscribe(conn_id, channel_id).await;
        Ok(())
    }
}
