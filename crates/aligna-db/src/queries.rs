use crate::models::{ConversationRow, MessageRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::Connection;

/// Fields of a message about to be stored. The id is generated here.
pub struct NewMessage<'a> {
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub body: &'a str,
    pub client_id: Option<&'a str>,
    pub status: &'a str,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Database {
    // -- Users --

    /// Insert a user. Returns false when the username is already taken.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, now),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    // -- Conversations --

    /// Return the conversation between two users, creating it on first use.
    pub fn find_or_create_conversation(&self, user_a: &str, user_b: &str) -> Result<ConversationRow> {
        let (member_a, member_b) = if user_a <= user_b { (user_a, user_b) } else { (user_b, user_a) };
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO conversations (id, member_a, member_b, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&id, member_a, member_b, &now),
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, member_a, member_b, created_at FROM conversations WHERE member_a = ?1 AND member_b = ?2",
            )?;
            let row = stmt.query_row((member_a, member_b), map_conversation)?;
            Ok(row)
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, member_a, member_b, created_at FROM conversations WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_conversation).optional()?;
            Ok(row)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<MessageRow> {
        let row = MessageRow {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: msg.conversation_id.to_string(),
            sender_id: msg.sender_id.to_string(),
            receiver_id: msg.receiver_id.to_string(),
            body: msg.body.to_string(),
            client_id: msg.client_id.map(str::to_string),
            status: msg.status.to_string(),
            created_at: msg.created_at.to_rfc3339(),
        };

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, body, client_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id,
                    row.conversation_id,
                    row.sender_id,
                    row.receiver_id,
                    row.body,
                    row.client_id,
                    row.status,
                    row.created_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(row)
    }

    /// All messages of a conversation, oldest first (insertion order).
    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, conversation_id))
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Set a message's status and return the updated row.
    pub fn update_message_status(&self, id: &str, status: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("UPDATE messages SET status = ?1 WHERE id = ?2", (status, id))?;
            if changed == 0 {
                return Err(anyhow!("Message not found: {}", id));
            }
            query_message(conn, id)?.ok_or_else(|| anyhow!("Message not found: {}", id))
        })
    }
}

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        member_a: row.get(1)?,
        member_b: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        body: row.get(4)?,
        client_id: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, receiver_id, body, client_id, status, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY rowid ASC",
    )?;

    let rows = stmt
        .query_map([conversation_id], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, receiver_id, body, client_id, status, created_at
         FROM messages WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], map_message).optional()?;
    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
