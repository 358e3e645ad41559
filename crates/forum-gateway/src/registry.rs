use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use forum_types::frames::ServerFrame;

/// One open, authenticated streaming connection.
///
/// A peer exists in the registry only between a successful handshake and
/// disconnect; the outbound queue is unbounded, so enqueueing a frame never
/// blocks a broadcast on a slow socket.
#[derive(Clone)]
pub struct LivePeer {
    pub conn_id: Uuid,
    pub username: String,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

impl LivePeer {
    /// Create a peer and the receiving end of its outbound queue.
    pub fn connect(username: String) -> (Self, mpsc::UnboundedReceiver<ServerFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                username,
                tx,
            },
            rx,
        )
    }

    /// Queue a frame for this peer. Returns false if its connection task
    /// has already gone away.
    pub fn send(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Tracks all currently live peers and fans frames out to them.
///
/// The lock is never held across an await: sends are synchronous enqueues,
/// and broadcast snapshots the peer set under a read lock before walking it,
/// so the set may change mid-fan-out without torn iteration.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    peers: Arc<RwLock<HashMap<Uuid, LivePeer>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly authenticated peer. A username may appear more than
    /// once — a user can hold several simultaneous sessions.
    pub fn add(&self, peer: LivePeer) {
        self.peers
            .write()
            .expect("registry lock poisoned")
            .insert(peer.conn_id, peer);
    }

    /// Unregister a peer. Safe to call for a peer that is already gone.
    pub fn remove(&self, conn_id: Uuid) {
        self.peers
            .write()
            .expect("registry lock poisoned")
            .remove(&conn_id);
    }

    pub fn len(&self) -> usize {
        self.peers.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort fan-out to every registered peer. A dead peer's frame is
    /// dropped and logged; it never prevents delivery to the rest.
    pub fn broadcast(&self, frame: &ServerFrame) {
        let peers: Vec<LivePeer> = self
            .peers
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();

        for peer in peers {
            if !peer.send(frame.clone()) {
                debug!(
                    conn_id = %peer.conn_id,
                    user = %peer.username,
                    "dropping frame for dead peer"
                );
            }
        }
    }
}
