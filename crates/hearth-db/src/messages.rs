use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use hearth_types::models::Identity;

use crate::Database;
use crate::models::{MessageRow, Mutation, ReactionRow};
use crate::reactions::{map_reaction_row, query_message_reactions};

const MESSAGE_COLUMNS: &str = "id, channel_id, user_id, username, text, timestamp, edited_at";

impl Database {
    pub fn insert_message(
        &self,
        channel_id: i64,
        author: &Identity,
        text: &str,
        now: i64,
    ) -> Result<MessageRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO messages (channel_id, user_id, username, text, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![channel_id, author.user_id(), author.username(), text, now],
            )?;

            Ok(MessageRow {
                id: tx.last_insert_rowid(),
                channel_id,
                user_id: author.user_id().to_string(),
                username: author.username().to_string(),
                text: text.to_string(),
                timestamp: now,
                edited_at: None,
            })
        })
    }

    #[cfg(test)]
    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Messages of a channel, oldest first, each paired with its reactions
    /// (oldest first). Both reads happen under one lock so the reaction set
    /// always matches the message set.
    pub fn get_channel_messages(&self, channel_id: i64) -> Result<Vec<(MessageRow, Vec<ReactionRow>)>> {
        self.with_conn(|conn| {
            let messages = query_channel_messages(conn, channel_id)?;
            let mut reactions = query_channel_reactions(conn, channel_id)?;

            Ok(messages
                .into_iter()
                .map(|m| {
                    let rs = reactions.remove(&m.id).unwrap_or_default();
                    (m, rs)
                })
                .collect())
        })
    }

    /// Replace the text of a message. Only its author may do so. The edited
    /// row comes back with the reactions it has at commit time.
    pub fn edit_message(
        &self,
        id: i64,
        acting: &Identity,
        new_text: &str,
        now: i64,
    ) -> Result<Mutation<(MessageRow, Vec<ReactionRow>)>> {
        self.with_tx(|tx| {
            let Some(mut message) = query_message(tx, id)? else {
                return Ok(Mutation::NotFound);
            };
            if !acting.owns(&message.user_id) {
                return Ok(Mutation::Forbidden);
            }

            tx.execute(
                "UPDATE messages SET text = ?1, edited_at = ?2 WHERE id = ?3",
                rusqlite::params![new_text, now, id],
            )?;

            message.text = new_text.to_string();
            message.edited_at = Some(now);
            let reactions = query_message_reactions(tx, id)?;
            Ok(Mutation::Applied((message, reactions)))
        })
    }

    /// Delete a message and all of its reactions as one unit. Only its
    /// author may do so. Returns the removed row.
    pub fn delete_message(&self, id: i64, acting: &Identity) -> Result<Mutation<MessageRow>> {
        self.with_tx(|tx| {
            let Some(message) = query_message(tx, id)? else {
                return Ok(Mutation::NotFound);
            };
            if !acting.owns(&message.user_id) {
                return Ok(Mutation::Forbidden);
            }

            tx.execute("DELETE FROM reactions WHERE message_id = ?1", [id])?;
            tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(Mutation::Applied(message))
        })
    }
}

pub(crate) fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    let row = conn.query_row(&sql, [id], map_message_row).optional()?;
    Ok(row)
}

fn query_channel_messages(conn: &Connection, channel_id: i64) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE channel_id = ?1 ORDER BY timestamp ASC, id ASC",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([channel_id], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Reactions of every message in a channel in one query, grouped by message
/// id with creation order preserved inside each group.
fn query_channel_reactions(conn: &Connection, channel_id: i64) -> Result<HashMap<i64, Vec<ReactionRow>>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.message_id, r.emoji, r.user_id, r.username, r.timestamp
         FROM reactions r
         JOIN messages m ON r.message_id = m.id
         WHERE m.channel_id = ?1
         ORDER BY r.timestamp ASC, r.id ASC",
    )?;

    let mut grouped: HashMap<i64, Vec<ReactionRow>> = HashMap::new();
    for row in stmt.query_map([channel_id], map_reaction_row)? {
        let row = row?;
        grouped.entry(row.message_id).or_default().push(row);
    }
    Ok(grouped)
}

fn map_message_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        text: row.get(4)?,
        timestamp: row.get(5)?,
        edited_at: row.get(6)?,
    })
}
