use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::Database;
use crate::models::{ChannelInsert, ChannelRow};

impl Database {
    /// Append a channel. With `unique_names` set, an existing channel of the
    /// same name wins and nothing is inserted.
    pub fn insert_channel(&self, name: &str, now: i64, unique_names: bool) -> Result<ChannelInsert> {
        self.with_tx(|tx| {
            if unique_names && channel_name_taken(tx, name)? {
                return Ok(ChannelInsert::DuplicateName);
            }

            tx.execute(
                "INSERT INTO channels (name, created_at) VALUES (?1, ?2)",
                rusqlite::params![name, now],
            )?;

            Ok(ChannelInsert::Created(ChannelRow {
                id: tx.last_insert_rowid(),
                name: name.to_string(),
                created_at: now,
            }))
        })
    }

    /// All channels, lexically by name. Ties fall back to creation order.
    pub fn list_channels(&self) -> Result<Vec<ChannelRow>> {
        self.with_conn(query_channels)
    }

    #[cfg(test)]
    pub fn get_channel(&self, id: i64) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, created_at FROM channels WHERE id = ?1",
                    [id],
                    map_channel_row,
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn channel_name_taken(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM channels WHERE name = ?1 LIMIT 1", [name], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn query_channels(conn: &Connection) -> Result<Vec<ChannelRow>> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM channels ORDER BY name ASC, id ASC")?;
    let rows = stmt
        .query_map([], map_channel_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_channel_row(row: &rusqlite::Row) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}
