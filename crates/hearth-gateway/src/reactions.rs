use tracing::debug;

use hearth_db::models::Toggle;
use hearth_types::events::{GatewayEvent, ReactionAdded, ReactionRemoved, ToggleReaction};
use hearth_types::models::{Identity, Reaction};

use crate::error::ChatError;
use crate::service::{ChatService, now_millis};

/// What a toggle did, as published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionChange {
    Added(ReactionAdded),
    Removed(ReactionRemoved),
}

impl ChatService {
    /// Add `acting`'s reaction if absent, remove it if present. A toggle on a
    /// message that does not exist returns `Ok(None)` and publishes nothing.
    pub async fn toggle_reaction(
        &self,
        acting: &Identity,
        cmd: ToggleReaction,
    ) -> Result<Option<ReactionChange>, ChatError> {
        let message_id = cmd.message_id.ok_or(ChatError::InvalidInput("messageId"))?;
        let emoji = cmd
            .emoji
            .filter(|e| !e.is_empty())
            .ok_or(ChatError::InvalidInput("emoji"))?;

        let acting_owned = acting.clone();
        let _order = self.sequence().await;
        let now = now_millis();
        let toggled = self
            .store(move |db| db.toggle_reaction(message_id, &emoji, &acting_owned, now))
            .await?;

        let change = match toggled {
            Toggle::Added { reaction, channel_id } => ReactionChange::Added(ReactionAdded {
                reaction: Reaction::from(reaction),
                channel_id,
            }),
            Toggle::Removed { reaction, channel_id } => ReactionChange::Removed(ReactionRemoved {
                id: reaction.id,
                message_id: reaction.message_id,
                channel_id,
                emoji: reaction.emoji,
                user_id: reaction.user_id,
                username: reaction.username,
            }),
            Toggle::MessageMissing => {
                debug!("{} reacted to missing message {}", acting.username(), message_id);
                return Ok(None);
            }
        };

        let event = match &change {
            ReactionChange::Added(added) => GatewayEvent::ReactionAdded(added.clone()),
            ReactionChange::Removed(removed) => GatewayEvent::ReactionRemoved(removed.clone()),
        };
        debug!("{} {} on message {}", acting.username(), event.name(), message_id);
        self.dispatcher().publish(event);
        Ok(Some(change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{alice, bob, service};
    use hearth_types::events::{BroadcastScope, SendMessage, Topic};

    fn thumbs_up(message_id: i64) -> ToggleReaction {
        ToggleReaction {
            message_id: Some(message_id),
            emoji: Some("👍".into()),
        }
    }

    async fn seeded() -> (ChatService, i64) {
        let svc = service(BroadcastScope::Channel);
        let sent = svc
            .send_message(
                &alice(),
                SendMessage {
                    channel_id: Some(1),
                    text: Some("hi".into()),
                },
            )
            .await
            .unwrap();
        (svc, sent.id)
    }

    #[tokio::test]
    async fn scenario_b_toggle_on_then_off() {
        let (svc, message_id) = seeded().await;

        let Some(ReactionChange::Added(added)) = svc.toggle_reaction(&alice(), thumbs_up(message_id)).await.unwrap()
        else {
            panic!("expected an add");
        };
        assert_eq!(added.reaction.emoji, "👍");
        assert_eq!(added.reaction.user_id, "alice");

        let reactions = &svc.list_messages(1).await.unwrap()[0].reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].emoji, "👍");
        assert_eq!(reactions[0].user_id, "alice");

        let Some(ReactionChange::Removed(removed)) =
            svc.toggle_reaction(&alice(), thumbs_up(message_id)).await.unwrap()
        else {
            panic!("expected a removal");
        };
        assert_eq!(removed.id, added.reaction.id);
        assert!(svc.list_messages(1).await.unwrap()[0].reactions.is_empty());
    }

    #[tokio::test]
    async fn scenario_c_two_users_own_separate_rows() {
        let (svc, message_id) = seeded().await;
        svc.toggle_reaction(&alice(), thumbs_up(message_id)).await.unwrap();
        svc.toggle_reaction(&bob(), thumbs_up(message_id)).await.unwrap();

        let users: Vec<String> = svc.list_messages(1).await.unwrap()[0]
            .reactions
            .iter()
            .map(|r| r.user_id.clone())
            .collect();
        assert_eq!(users, vec!["alice", "bob"]);

        svc.toggle_reaction(&bob(), thumbs_up(message_id)).await.unwrap();
        let left = &svc.list_messages(1).await.unwrap()[0].reactions;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].user_id, "alice");
    }

    #[tokio::test]
    async fn events_carry_key_fields_and_channel() {
        let (svc, message_id) = seeded().await;
        let mut rx = svc.dispatcher().receiver();

        svc.toggle_reaction(&bob(), thumbs_up(message_id)).await.unwrap();
        svc.toggle_reaction(&bob(), thumbs_up(message_id)).await.unwrap();

        let added = rx.recv().await.unwrap();
        assert_eq!(added.name, "reaction_added");
        assert_eq!(added.topic, Topic::Channel(1));

        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.name, "reaction_removed");
        let value: serde_json::Value = serde_json::from_str(&removed.json).unwrap();
        assert_eq!(value["data"]["messageId"], message_id);
        assert_eq!(value["data"]["emoji"], "👍");
        assert_eq!(value["data"]["userId"], "bob");
        assert_eq!(value["data"]["username"], "bob");
    }

    #[tokio::test]
    async fn concurrent_toggles_from_one_user_stay_consistent() {
        let (svc, message_id) = seeded().await;

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.toggle_reaction(&alice(), thumbs_up(message_id)).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        assert!(svc.list_messages(1).await.unwrap()[0].reactions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn broadcasts_replay_in_commit_order() {
        let (svc, message_id) = seeded().await;
        let mut rx = svc.dispatcher().receiver();
        let mut present = false;

        for _ in 0..10 {
            let tasks: Vec<_> = (0..64)
                .map(|_| {
                    let svc = svc.clone();
                    tokio::spawn(async move { svc.toggle_reaction(&alice(), thumbs_up(message_id)).await })
                })
                .collect();
            for t in tasks {
                t.await.unwrap().unwrap();
            }

            let mut seen = 0;
            while let Ok(msg) = rx.try_recv() {
                seen += 1;
                match msg.name {
                    "reaction_added" => {
                        assert!(!present, "reaction_added for a key that is already present");
                        present = true;
                    }
                    "reaction_removed" => {
                        assert!(present, "reaction_removed for a key that is absent");
                        present = false;
                    }
                    other => panic!("unexpected event {}", other),
                }
            }
            assert_eq!(seen, 64);

            let stored = !svc.list_messages(1).await.unwrap()[0].reactions.is_empty();
            assert_eq!(present, stored);
        }
    }

    #[tokio::test]
    async fn missing_fields_and_messages() {
        let (svc, _) = seeded().await;
        let mut rx = svc.dispatcher().receiver();

        assert!(matches!(
            svc.toggle_reaction(&alice(), ToggleReaction { message_id: None, emoji: Some("👍".into()) }).await,
            Err(ChatError::InvalidInput("messageId"))
        ));
        assert!(matches!(
            svc.toggle_reaction(&alice(), ToggleReaction { message_id: Some(1), emoji: Some(String::new()) }).await,
            Err(ChatError::InvalidInput("emoji"))
        ));
        assert_eq!(svc.toggle_reaction(&alice(), thumbs_up(9_999)).await.unwrap(), None);
        assert!(rx.try_recv().is_err());
    }
}
