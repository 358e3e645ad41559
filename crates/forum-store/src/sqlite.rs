use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use forum_types::models::{ChatMessage, User};

use crate::Store;

/// SQLite-backed [`Store`]. A single connection in WAL mode behind a mutex;
/// callers reach it via `spawn_blocking`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrate(&conn)?;

        info!("store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("store lock poisoned: {e}"))?;
        f(&conn)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            username    TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_created
            ON messages(created_at);
        ",
    )?;
    Ok(())
}

/// Timestamps are stored as fixed-width RFC 3339 so lexicographic order in
/// the index matches chronological order.
fn encode_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl Store for SqliteStore {
    fn create_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password, created_at, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user.username,
                    user.email,
                    user.password_hash,
                    encode_time(user.created_at),
                    user.is_active,
                ],
            )?;
            Ok(())
        })
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", username))
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    fn create_message(&self, username: &str, message: &str) -> Result<ChatMessage> {
        let stored = ChatMessage {
            message_id: Uuid::new_v4(),
            username: username.to_string(),
            message: message.to_string(),
            // Truncate to the precision the column keeps, so the returned
            // record reads back identically.
            timestamp: encode_time(Utc::now()).parse()?,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, username, message, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    stored.message_id.to_string(),
                    stored.username,
                    stored.message,
                    encode_time(stored.timestamp),
                ],
            )?;
            Ok(())
        })?;

        Ok(stored)
    }

    fn get_recent_messages(&self, limit: u32) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            // rowid breaks ties between messages persisted in the same tick
            let mut stmt = conn.prepare(
                "SELECT id, username, message, created_at
                 FROM messages
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    let id: String = row.get(0)?;
                    let raw_ts: String = row.get(3)?;
                    Ok(ChatMessage {
                        message_id: id.parse().unwrap_or_default(),
                        username: row.get(1)?,
                        message: row.get(2)?,
                        timestamp: decode_time(&raw_ts)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, key: &str) -> Result<Option<User>> {
    let sql = format!(
        "SELECT username, email, password, created_at, is_active FROM users WHERE {predicate}"
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([key], |row| {
            let raw_ts: String = row.get(3)?;
            Ok(User {
                username: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: decode_time(&raw_ts)?,
                is_active: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
