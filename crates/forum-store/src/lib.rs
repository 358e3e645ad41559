//! Persistence for users and chat messages.
//!
//! Everything above this crate depends on the [`Store`] trait, never on a
//! concrete backend. Two interchangeable backends are provided: SQLite
//! ([`sqlite::SqliteStore`]) for durable deployments and an in-memory store
//! ([`memory::MemoryStore`]) for tests and ephemeral setups.
//!
//! Methods are synchronous; async callers run them through
//! `tokio::task::spawn_blocking` so backend I/O stays off the runtime.

pub mod history;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;

use forum_types::models::{ChatMessage, User};

pub type SharedStore = Arc<dyn Store>;

pub trait Store: Send + Sync {
    /// Insert a new user. Fails if the username or email is already taken.
    fn create_user(&self, user: &User) -> Result<()>;

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist a chat message, assigning its id and creation timestamp.
    /// Returns the stored record.
    fn create_message(&self, username: &str, message: &str) -> Result<ChatMessage>;

    /// Up to `limit` messages, newest first. Callers wanting chronological
    /// order go through [`history::recent_chronological`].
    fn get_recent_messages(&self, limit: u32) -> Result<Vec<ChatMessage>>;
}
