use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use tracing::{info, warn};

use forum_auth::Authenticator;
use forum_store::{SharedStore, history};
use forum_types::frames::ServerFrame;

use crate::registry::{ConnectionRegistry, LivePeer};

/// History depth used for the replay-on-connect frame and as the `/history`
/// default.
const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Upper bound a client may request via `/history N`.
const MAX_HISTORY_LIMIT: u32 = 200;

const HELP_TEXT: &str = "Available commands:\n/history [number] - Get recent messages (default 50, max 200)\n/help - Show this help message";

/// Drive one WebSocket connection through its lifecycle:
/// handshake, register, stream, remove.
///
/// The first client frame must be a raw bearer token. Until it verifies and
/// resolves to an active user, the connection holds no registry slot; any
/// auth failure closes the socket with a policy-violation code. There is
/// deliberately no handshake timeout — an idle unauthenticated connection
/// costs one parked task and nothing else.
pub async fn handle_socket(
    socket: WebSocket,
    registry: ConnectionRegistry,
    auth: Authenticator,
    store: SharedStore,
) {
    let (mut sender, mut receiver) = socket.split();

    let username = match authenticate(&mut receiver, &auth, &store).await {
        Ok(username) => username,
        Err(reason) => {
            info!("websocket handshake rejected: {reason}");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: Utf8Bytes::from_static("policy violation"),
                })))
                .await;
            return;
        }
    };

    let (peer, outbound) = LivePeer::connect(username.clone());
    let conn_id = peer.conn_id;
    let self_handle = peer.clone();
    registry.add(peer);
    info!(user = %username, peers = registry.len(), "chat session started");

    self_handle.send(ServerFrame::System {
        message: format!("Welcome {username}! You are now connected to the chat."),
    });
    self_handle.send(history_frame(&store, DEFAULT_HISTORY_LIMIT).await);

    // Outbound forwarder: drains the peer's queue into the socket so
    // broadcasts never wait on this client's network.
    let mut send_task = tokio::spawn(forward_outbound(outbound, sender));

    let recv_registry = registry.clone();
    let recv_store = store.clone();
    let recv_user = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) =
                        handle_frame(&recv_registry, &self_handle, &recv_store, text.as_str()).await
                    {
                        // Terminal for this connection only.
                        warn!(user = %recv_user, "error handling chat frame: {e:#}");
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.remove(conn_id);
    info!(user = %username, peers = registry.len(), "chat session closed");
}

/// Wait for the credential frame and resolve it to an active user.
/// The peer is not registered until this succeeds.
async fn authenticate(
    receiver: &mut SplitStream<WebSocket>,
    auth: &Authenticator,
    store: &SharedStore,
) -> Result<String, &'static str> {
    let token = match receiver.next().await {
        Some(Ok(Message::Text(token))) => token,
        _ => return Err("expected a credential frame"),
    };

    let claims = auth
        .verify_token(token.as_str())
        .map_err(|_| "invalid token")?;

    let store = store.clone();
    let username = claims.sub;
    let lookup = username.clone();
    let user = tokio::task::spawn_blocking(move || store.get_user_by_username(&lookup))
        .await
        .map_err(|_| "user lookup task failed")?
        .map_err(|_| "user lookup failed")?;

    match user {
        Some(user) if user.is_active => Ok(user.username),
        Some(_) => Err("user is inactive"),
        None => Err("unknown user"),
    }
}

async fn forward_outbound(
    mut outbound: tokio::sync::mpsc::UnboundedReceiver<ServerFrame>,
    mut sender: SplitSink<WebSocket, Message>,
) {
    while let Some(frame) = outbound.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode outbound frame: {e}");
                continue;
            }
        };
        if sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}

/// Classify one inbound frame: system command or chat message.
async fn handle_frame(
    registry: &ConnectionRegistry,
    peer: &LivePeer,
    store: &SharedStore,
    text: &str,
) -> anyhow::Result<()> {
    if text.starts_with('/') {
        let mut parts = text.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next().map(str::trim);

        match command.as_str() {
            "/history" => {
                peer.send(history_frame(store, parse_history_limit(arg)).await);
                return Ok(());
            }
            "/help" => {
                peer.send(ServerFrame::System {
                    message: HELP_TEXT.to_string(),
                });
                return Ok(());
            }
            // Unrecognized slash commands fall through and are sent as
            // ordinary chat text, matching long-standing client behavior.
            _ => {}
        }
    }

    let write_store = store.clone();
    let author = peer.username.clone();
    let body = text.to_string();
    let stored =
        tokio::task::spawn_blocking(move || write_store.create_message(&author, &body)).await??;

    registry.broadcast(&ServerFrame::Message {
        username: stored.username,
        message: stored.message,
        timestamp: stored.timestamp,
    });

    Ok(())
}

/// Parse the optional `/history` argument: digits only, clamped to the max,
/// defaulting when absent or non-numeric.
fn parse_history_limit(arg: Option<&str>) -> u32 {
    let Some(arg) = arg.filter(|a| !a.is_empty() && a.bytes().all(|b| b.is_ascii_digit())) else {
        return DEFAULT_HISTORY_LIMIT;
    };
    // All-digit input that overflows still means "a lot" — clamp it.
    arg.parse::<u32>()
        .unwrap_or(u32::MAX)
        .min(MAX_HISTORY_LIMIT)
}

/// Build a replay frame of the most recent `limit` messages, oldest first.
/// Read faults surface as an empty replay, not an error.
async fn history_frame(store: &SharedStore, limit: u32) -> ServerFrame {
    let store = store.clone();
    let messages =
        match tokio::task::spawn_blocking(move || history::recent_chronological(store.as_ref(), limit))
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!("history query task failed: {e}");
                Vec::new()
            }
        };

    ServerFrame::History {
        messages: messages.into_iter().map(Into::into).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use forum_store::memory::MemoryStore;

    use super::*;

    fn setup() -> (
        ConnectionRegistry,
        LivePeer,
        tokio::sync::mpsc::UnboundedReceiver<ServerFrame>,
        SharedStore,
    ) {
        let registry = ConnectionRegistry::new();
        let (peer, rx) = LivePeer::connect("alice".into());
        registry.add(peer.clone());
        let store: SharedStore = Arc::new(MemoryStore::new());
        (registry, peer, rx, store)
    }

    #[test]
    fn history_limit_defaults_and_clamps() {
        assert_eq!(parse_history_limit(None), 50);
        assert_eq!(parse_history_limit(Some("5")), 5);
        assert_eq!(parse_history_limit(Some("200")), 200);
        assert_eq!(parse_history_limit(Some("9999")), 200);
        assert_eq!(parse_history_limit(Some("99999999999999999999")), 200);
        assert_eq!(parse_history_limit(Some("abc")), 50);
        assert_eq!(parse_history_limit(Some("-3")), 50);
        assert_eq!(parse_history_limit(Some("1x")), 50);
        assert_eq!(parse_history_limit(Some("")), 50);
    }

    #[tokio::test]
    async fn chat_frame_is_persisted_and_broadcast_to_sender_too() {
        let (registry, peer, mut rx, store) = setup();

        handle_frame(&registry, &peer, &store, "hello").await.unwrap();

        match rx.recv().await.unwrap() {
            ServerFrame::Message {
                username, message, ..
            } => {
                assert_eq!(username, "alice");
                assert_eq!(message, "hello");
            }
            other => panic!("expected message frame, got {other:?}"),
        }

        assert_eq!(store.get_recent_messages(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_command_replies_to_sender_without_persisting() {
        let (registry, peer, mut rx, store) = setup();
        let (other, mut other_rx) = LivePeer::connect("bob".into());
        registry.add(other);

        for i in 0..10 {
            store.create_message("bob", &format!("old {i}")).unwrap();
        }

        handle_frame(&registry, &peer, &store, "/history 5").await.unwrap();

        match rx.recv().await.unwrap() {
            ServerFrame::History { messages } => {
                assert_eq!(messages.len(), 5);
                assert_eq!(messages[0].message, "old 5");
                assert_eq!(messages[4].message, "old 9");
            }
            other => panic!("expected history frame, got {other:?}"),
        }

        // Not broadcast, not stored.
        assert!(other_rx.try_recv().is_err());
        assert_eq!(store.get_recent_messages(100).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn history_command_is_case_insensitive_and_tolerates_junk_arg() {
        let (registry, peer, mut rx, store) = setup();
        store.create_message("bob", "only one").unwrap();

        handle_frame(&registry, &peer, &store, "/HISTORY nonsense")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerFrame::History { messages } => assert_eq!(messages.len(), 1),
            other => panic!("expected history frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn help_command_replies_with_command_listing() {
        let (registry, peer, mut rx, store) = setup();

        handle_frame(&registry, &peer, &store, "/help").await.unwrap();

        match rx.recv().await.unwrap() {
            ServerFrame::System { message } => assert!(message.contains("/history")),
            other => panic!("expected system frame, got {other:?}"),
        }
        assert!(store.get_recent_messages(10).unwrap().is_empty());
    }

    /// Unrecognized slash input is not rejected; it flows through as chat.
    #[tokio::test]
    async fn unknown_slash_command_falls_through_as_chat() {
        let (registry, peer, mut rx, store) = setup();

        handle_frame(&registry, &peer, &store, "/shrug oh well")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerFrame::Message { message, .. } => assert_eq!(message, "/shrug oh well"),
            other => panic!("expected message frame, got {other:?}"),
        }
        assert_eq!(store.get_recent_messages(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_history_still_yields_a_history_frame() {
        let (_registry, _peer, _rx, store) = setup();

        match history_frame(&store, 50).await {
            ServerFrame::History { messages } => assert!(messages.is_empty()),
            other => panic!("expected history frame, got {other:?}"),
        }
    }
}
