use tracing::warn;

use forum_types::models::ChatMessage;

use crate::Store;

/// The most recent `limit` messages in chronological (oldest-first) order.
///
/// Backends return newest-first; this reverses the page so every caller
/// (history endpoint, handshake replay, `/history` command) sees the same
/// shape. A failed read is logged and yields an empty list rather than an
/// error.
pub fn recent_chronological(store: &dyn Store, limit: u32) -> Vec<ChatMessage> {
    match store.get_recent_messages(limit) {
        Ok(mut messages) => {
            messages.reverse();
            messages
        }
        Err(e) => {
            warn!("failed to read chat history: {e:#}");
            Vec::new()
        }
    }
}
