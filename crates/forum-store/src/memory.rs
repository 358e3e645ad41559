use std::sync::RwLock;

use anyhow::{Result, bail};
use chrono::Utc;
use uuid::Uuid;

use forum_types::models::{ChatMessage, User};

use crate::Store;

/// In-memory [`Store`] for tests and ephemeral deployments. Messages are
/// kept in insertion order, which for a single process is also timestamp
/// order.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    messages: Vec<ChatMessage>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn create_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        if inner.users.iter().any(|u| u.username == user.username) {
            bail!("username already taken: {}", user.username);
        }
        if inner.users.iter().any(|u| u.email == user.email) {
            bail!("email already registered: {}", user.email);
        }
        inner.users.push(user.clone());
        Ok(())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    fn create_message(&self, username: &str, message: &str) -> Result<ChatMessage> {
        let stored = ChatMessage {
            message_id: Uuid::new_v4(),
            username: username.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.messages.push(stored.clone());
        Ok(stored)
    }

    fn get_recent_messages(&self, limit: u32) -> Result<Vec<ChatMessage>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .messages
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
