//! Process-wide registry of live WebSocket connections, keyed by user id.
//!
//! Mutation of the client map is serialised through a single event-loop task
//! (the Rust analogue of a single goroutine reading a channel); everything
//! else — `is_online`, `get_online_users`, `send_message` — is a direct,
//! non-blocking read-lock operation so REST handlers never wait on the event
//! loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::store::Store;

pub mod envelope;

pub use envelope::Envelope;

const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// A registered connection's hub-side handle. `conn_id` is the local,
/// monotonically-increasing identity that lets the event loop tell a stale
/// socket's teardown apart from the connection that replaced it — comparing
/// by `user_id` alone is exactly the bug this exists to prevent.
struct ClientConnection {
    conn_id: u64,
    username: String,
    tx: mpsc::Sender<Envelope>,
}

enum HubEvent {
    Register {
        user_id: i64,
        conn_id: u64,
        username: String,
        tx: mpsc::Sender<Envelope>,
    },
    Unregister {
        user_id: i64,
        conn_id: u64,
    },
}

#[derive(Clone)]
pub struct Hub {
    clients: Arc<RwLock<HashMap<i64, ClientConnection>>>,
    event_tx: mpsc::UnboundedSender<HubEvent>,
    next_conn_id: Arc<AtomicU64>,
}

impl Hub {
    pub fn new(store: Store) -> Self {
        let clients: Arc<RwLock<HashMap<i64, ClientConnection>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_event_loop(clients.clone(), event_rx, store));

        Hub {
            clients,
            event_tx,
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate a connection handle and hand registration off to the event
    /// loop. Returns the `conn_id` the caller must present on `unregister` —
    /// this never blocks on the event loop actually running.
    pub fn register(&self, user_id: i64, username: String, tx: mpsc::Sender<Envelope>) -> u64 {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);

        let _ = self.event_tx.send(HubEvent::Register {
            user_id,
            conn_id,
            username,
            tx,
        });

        conn_id
    }

    pub fn unregister(&self, user_id: i64, conn_id: u64) {
        let _ = self.event_tx.send(HubEvent::Unregister { user_id, conn_id });
    }

    /// Synchronous lookup, non-blocking enqueue. Never blocks: a full or
    /// closed outbound queue is silently dropped, real-time delivery is
    /// always best-effort.
    pub async fn send_message(&self, to: i64, envelope: Envelope) {
        let clients = self.clients.read().await;
        if let Some(client) = clients.get(&to) {
            if let Err(e) = client.tx.try_send(envelope) {
                tracing::debug!(user_id = to, error = ?e, "dropped outbound frame");
            }
        }
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.clients.read().await.contains_key(&user_id)
    }

    pub async fn get_online_users(&self) -> Vec<i64> {
        self.clients.read().await.keys().copied().collect()
    }
}

async fn run_event_loop(
    clients: Arc<RwLock<HashMap<i64, ClientConnection>>>,
    mut event_rx: mpsc::UnboundedReceiver<HubEvent>,
    store: Store,
) {
    while let Some(event) = event_rx.recv().await {
        match event {
            HubEvent::Register {
                user_id,
                conn_id,
                username,
                tx,
            } => {
                let others: Vec<(i64, String, mpsc::Sender<Envelope>)> = {
                    let mut clients = clients.write().await;

                    // Evict a stale connection for the same user: dropping its
                    // sender closes the outbound queue, which makes its
                    // writer task exit cleanly.
                    if let Some(old) = clients.remove(&user_id) {
                        tracing::debug!(user_id, old_conn_id = old.conn_id, "evicting stale connection");
                    }

                    let snapshot: Vec<_> = clients
                        .iter()
                        .map(|(id, c)| (*id, c.username.clone(), c.tx.clone()))
                        .collect();

                    clients.insert(
                        user_id,
                        ClientConnection {
                            conn_id,
                            username: username.clone(),
                            tx,
                        },
                    );

                    snapshot
                };

                // Full initial roster replay to the newcomer: one presence
                // frame per already-connected peer.
                if let Some(client) = clients.read().await.get(&user_id) {
                    for (other_id, other_username, _) in &others {
                        let frame =
                            Envelope::presence(*other_id, other_username.clone(), true);
                        let _ = client.tx.try_send(frame);
                    }
                }

                // Broadcast the newcomer's presence to everyone else.
                for (_, _, tx) in &others {
                    let frame = Envelope::presence(user_id, username.clone(), true);
                    let _ = tx.try_send(frame);
                }

                if let Err(e) = store.update_last_seen(user_id).await {
                    tracing::warn!(user_id, error = ?e, "failed to update last_seen on connect");
                }
            }
            HubEvent::Unregister { user_id, conn_id } => {
                let removed = {
                    let mut clients = clients.write().await;
                    match clients.get(&user_id) {
                        // Pointer-identity (here: conn_id) check — a stale
                        // socket's teardown must never clobber a connection
                        // that has since replaced it.
                        Some(current) if current.conn_id == conn_id => clients.remove(&user_id),
                        _ => None,
                    }
                };

                let Some(removed) = removed else {
                    continue;
                };

                let username = removed.username;
                let snapshot: Vec<mpsc::Sender<Envelope>> =
                    clients.read().await.values().map(|c| c.tx.clone()).collect();

                for tx in snapshot {
                    let frame = Envelope::presence(user_id, username.clone(), false);
                    let _ = tx.try_send(frame);
                }
            }
        }
    }
}
