use tracing::debug;

use hearth_db::models::Mutation;
use hearth_types::events::{DeleteMessage, EditMessage, GatewayEvent, MessageDeleted, SendMessage};
use hearth_types::models::{Identity, Message};

use crate::error::ChatError;
use crate::service::{ChatService, now_millis};

impl ChatService {
    /// Append a message as `author` and publish `new_message` to the channel.
    pub async fn send_message(&self, author: &Identity, cmd: SendMessage) -> Result<Message, ChatError> {
        let channel_id = cmd.channel_id.ok_or(ChatError::InvalidInput("channelId"))?;
        let text = cmd
            .text
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::InvalidInput("text"))?;

        let author_owned = author.clone();
        let _order = self.sequence().await;
        let now = now_millis();
        let row = self
            .store(move |db| db.insert_message(channel_id, &author_owned, &text, now))
            .await?;

        let message = row.into_message(vec![]);
        debug!("{} posted message {} in channel {}", author.username(), message.id, channel_id);
        self.dispatcher().publish(GatewayEvent::NewMessage(message.clone()));
        Ok(message)
    }

    /// Messages of a channel, oldest first, each with its reactions.
    pub async fn list_messages(&self, channel_id: i64) -> Result<Vec<Message>, ChatError> {
        let rows = self.store(move |db| db.get_channel_messages(channel_id)).await?;
        Ok(rows
            .into_iter()
            .map(|(message, reactions)| message.into_message(reactions))
            .collect())
    }

    /// Replace a message's text. A missing message or a non-author caller is
    /// a silent no-op: `Ok(None)` and nothing is published.
    pub async fn edit_message(&self, acting: &Identity, cmd: EditMessage) -> Result<Option<Message>, ChatError> {
        let message_id = cmd.message_id.ok_or(ChatError::InvalidInput("messageId"))?;
        let new_text = cmd.new_text.ok_or(ChatError::InvalidInput("newText"))?;

        let acting_owned = acting.clone();
        let _order = self.sequence().await;
        let now = now_millis();
        let outcome = self
            .store(move |db| db.edit_message(message_id, &acting_owned, &new_text, now))
            .await?;

        match outcome {
            Mutation::Applied((row, reactions)) => {
                let message = row.into_message(reactions);
                debug!("{} edited message {}", acting.username(), message_id);
                self.dispatcher().publish(GatewayEvent::MessageEdited(message.clone()));
                Ok(Some(message))
            }
            Mutation::NotFound => {
                debug!("{} tried to edit missing message {}", acting.username(), message_id);
                Ok(None)
            }
            Mutation::Forbidden => {
                debug!("{} is not the author of message {}, edit ignored", acting.username(), message_id);
                Ok(None)
            }
        }
    }

    /// Delete a message and its reactions. Same silent no-op rule as edit.
    /// Returns the deleted id.
    pub async fn delete_message(&self, acting: &Identity, cmd: DeleteMessage) -> Result<Option<i64>, ChatError> {
        let message_id = cmd.message_id.ok_or(ChatError::InvalidInput("messageId"))?;

        let acting_owned = acting.clone();
        let _order = self.sequence().await;
        let outcome = self
            .store(move |db| db.delete_message(message_id, &acting_owned))
            .await?;

        match outcome {
            Mutation::Applied(row) => {
                debug!("{} deleted message {}", acting.username(), message_id);
                self.dispatcher().publish(GatewayEvent::MessageDeleted(MessageDeleted {
                    message_id,
                    channel_id: row.channel_id,
                }));
                Ok(Some(message_id))
            }
            Mutation::NotFound | Mutation::Forbidden => {
                debug!("{} delete of message {} ignored", acting.username(), message_id);
                Ok(None)
            }
        }
    }
}
