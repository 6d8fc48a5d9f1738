use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use cv_core::{Entry, Role};

use crate::error::{Result, StoreError};
use crate::schema;

const ACTIVE_CHAT_KEY: &str = "active_chat";

/// One row of `list_chats`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: i64,
    pub name: String,
    pub messages: usize,
    pub created_at: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Chats ---

    pub fn create_chat(&self, name: &str) -> Result<i64> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidData("chat name is empty".to_string()));
        }
        if self.find_chat(name)?.is_some() {
            return Err(StoreError::InvalidData(format!("chat '{name}' already exists")));
        }
        self.conn
            .execute("INSERT INTO chats (name) VALUES (?1)", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_chat(&self, name: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM chats WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    pub fn chat_name(&self, chat_id: i64) -> Result<Option<String>> {
        let name = self
            .conn
            .query_row("SELECT name FROM chats WHERE id = ?1", [chat_id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(name)
    }

    pub fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.created_at, COUNT(m.id)
             FROM chats c LEFT JOIN messages m ON m.chat_id = c.id
             GROUP BY c.id ORDER BY c.id",
        )?;
        let chats = stmt
            .query_map([], |row| {
                Ok(ChatSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                    messages: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(chats)
    }

    /// Chat restored on startup, if one was selected and still exists.
    pub fn active_chat(&self) -> Result<Option<i64>> {
        let Some(raw) = self.get_metadata(ACTIVE_CHAT_KEY)? else {
            return Ok(None);
        };
        let Ok(id) = raw.parse::<i64>() else {
            tracing::warn!("ignoring malformed active chat id '{raw}'");
            return Ok(None);
        };
        Ok(self.chat_name(id)?.map(|_| id))
    }

    pub fn set_active_chat(&self, chat_id: i64) -> Result<()> {
        self.set_metadata(ACTIVE_CHAT_KEY, &chat_id.to_string())
    }

    // --- Messages ---

    pub fn message_count(&self, chat_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE chat_id = ?1",
            [chat_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Append an entry at the end of a chat, returning its position.
    pub fn append_message(&self, chat_id: i64, entry: &Entry) -> Result<usize> {
        let position = self.message_count(chat_id)?;
        self.insert_message_on(&self.conn, chat_id, position, entry)?;
        Ok(position)
    }

    fn insert_message_on(
        &self,
        conn: &Connection,
        chat_id: i64,
        position: usize,
        entry: &Entry,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO messages (chat_id, position, role, text) VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, position as i64, entry.role.as_str(), entry.text],
        )?;
        Ok(())
    }

    pub fn update_message_text(&self, chat_id: i64, position: usize, text: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE messages SET text = ?1 WHERE chat_id = ?2 AND position = ?3",
            params![text, chat_id, position as i64],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!(
                "message {position} in chat {chat_id}"
            )));
        }
        Ok(())
    }

    pub fn load_transcript(&self, chat_id: i64) -> Result<Vec<Entry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT role, text FROM messages WHERE chat_id = ?1 ORDER BY position")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([chat_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(role, text)| {
                let role = role.parse::<Role>().map_err(StoreError::InvalidData)?;
                Ok(Entry { role, text })
            })
            .collect()
    }

    /// Replace every message of a chat in one transaction.
    pub fn replace_transcript(&self, chat_id: i64, entries: &[Entry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM messages WHERE chat_id = ?1", [chat_id])?;
        for (position, entry) in entries.iter().enumerate() {
            self.insert_message_on(&tx, chat_id, position, entry)?;
        }
        tx.commit()?;
        Ok(())
    }
}
