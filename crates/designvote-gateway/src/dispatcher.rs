use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use designvote_types::events::GatewayEvent;

/// Manages all open connections and broadcasts events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every open connection receives every broadcast event
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-connection targeted send channels: conn_id -> (user_id, sender)
    connections: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all open connections.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register an open connection. Returns (conn_id, receiver for events
    /// addressed to this connection only).
    pub async fn register_connection(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, (user_id, tx));
        (conn_id, rx)
    }

    pub async fn unregister_connection(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Send a targeted event to one connection. Returns false if it is gone.
    pub async fn send_to_connection(&self, conn_id: Uuid, event: GatewayEvent) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(&conn_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Number of open connections held by one user.
    pub async fn connections_for_user(&self, user_id: Uuid) -> usize {
        self.inner
            .connections
            .read()
            .await
            .values()
            .filter(|(uid, _)| *uid == user_id)
            .count()
    }
}
