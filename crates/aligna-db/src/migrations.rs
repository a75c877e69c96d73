use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        -- member_a < member_b, so a pair maps to one row
        CREATE TABLE IF NOT EXISTS conversations (
            id          TEXT PRIMARY KEY,
            member_a    TEXT NOT NULL,
            member_b    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(member_a, member_b)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            sender_id       TEXT NOT NULL,
            receiver_id     TEXT NOT NULL,
            body            TEXT NOT NULL,
            client_id       TEXT,
            status          TEXT NOT NULL DEFAULT 'sent',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
