use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ChatMessageResponse;

/// Frames pushed from the server to streaming chat clients.
///
/// Wire shape is flat JSON with a `type` discriminator:
/// `{"type":"message","username":...,"message":...,"timestamp":...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// Welcome / help / error notices, delivered to a single peer.
    System { message: String },

    /// Replay of recent messages, oldest first.
    History { messages: Vec<ChatMessageResponse> },

    /// A broadcast chat event.
    Message {
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}
