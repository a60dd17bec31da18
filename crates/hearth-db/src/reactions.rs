use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use hearth_types::models::Identity;

use crate::Database;
use crate::messages::query_message;
use crate::models::{ReactionRow, Toggle};

const REACTION_COLUMNS: &str = "id, message_id, emoji, user_id, username, timestamp";

impl Database {
    /// Toggle a reaction keyed by `(message_id, emoji, user)`: removes it if
    /// present, inserts it if not. Lookup and mutation share one transaction,
    /// so two concurrent toggles of the same key always net out.
    pub fn toggle_reaction(
        &self,
        message_id: i64,
        emoji: &str,
        acting: &Identity,
        now: i64,
    ) -> Result<Toggle> {
        self.with_tx(|tx| {
            let Some(message) = query_message(tx, message_id)? else {
                return Ok(Toggle::MessageMissing);
            };

            if let Some(existing) = query_reaction_by_key(tx, message_id, emoji, acting.user_id())? {
                tx.execute("DELETE FROM reactions WHERE id = ?1", [existing.id])?;
                return Ok(Toggle::Removed {
                    reaction: existing,
                    channel_id: message.channel_id,
                });
            }

            tx.execute(
                "INSERT INTO reactions (message_id, emoji, user_id, username, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![message_id, emoji, acting.user_id(), acting.username(), now],
            )?;

            Ok(Toggle::Added {
                reaction: ReactionRow {
                    id: tx.last_insert_rowid(),
                    message_id,
                    emoji: emoji.to_string(),
                    user_id: acting.user_id().to_string(),
                    username: acting.username().to_string(),
                    timestamp: now,
                },
                channel_id: message.channel_id,
            })
        })
    }

    /// Live reaction rows of one message, oldest first.
    #[cfg(test)]
    pub fn get_reactions_for_message(&self, message_id: i64) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| query_message_reactions(conn, message_id))
    }
}

pub(crate) fn query_message_reactions(conn: &Connection, message_id: i64) -> Result<Vec<ReactionRow>> {
    let sql = format!(
        "SELECT {} FROM reactions WHERE message_id = ?1 ORDER BY timestamp ASC, id ASC",
        REACTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([message_id], map_reaction_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_reaction_by_key(
    conn: &Connection,
    message_id: i64,
    emoji: &str,
    user_id: &str,
) -> Result<Option<ReactionRow>> {
    let sql = format!(
        "SELECT {} FROM reactions WHERE message_id = ?1 AND emoji = ?2 AND user_id = ?3",
        REACTION_COLUMNS
    );
    let row = conn
        .query_row(&sql, rusqlite::params![message_id, emoji, user_id], map_reaction_row)
        .optional()?;
    Ok(row)
}

pub(crate) fn map_reaction_row(row: &rusqlite::Row) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        emoji: row.get(2)?,
        user_id: row.get(3)?,
        username: row.get(4)?,
        timestamp: row.get(5)?,
    })
}
