use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (channels, messages, reactions)");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS channels (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id  INTEGER NOT NULL,
                user_id     TEXT NOT NULL,
                username    TEXT NOT NULL,
                text        TEXT NOT NULL,
                timestamp   INTEGER NOT NULL,
                edited_at   INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_messages_channel
                ON messages(channel_id, timestamp);

            CREATE TABLE IF NOT EXISTS reactions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id  INTEGER NOT NULL REFERENCES messages(id),
                emoji       TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                username    TEXT NOT NULL,
                timestamp   INTEGER NOT NULL,
                UNIQUE(message_id, emoji, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_reactions_message
                ON reactions(message_id, timestamp);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
