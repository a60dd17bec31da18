use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, error};
use uuid::Uuid;

use hearth_types::events::{BroadcastScope, GatewayEvent, Topic};
use hearth_types::models::Identity;

/// Capacity of the fan-out channel. Receivers that fall further behind skip
/// the oldest events instead of slowing publishers down.
const BROADCAST_CAPACITY: usize = 1024;

/// A published event, serialized once and shared by every receiver.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub topic: Topic,
    pub name: &'static str,
    pub json: Arc<str>,
}

/// In-memory state of one live connection. Owns no persisted entity and is
/// dropped on disconnect.
struct ConnectionBinding {
    identity: Identity,
    channels: HashSet<i64>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// Tracks live connections and their channel subscriptions, and publishes
/// events to the right topic.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    scope: BroadcastScope,

    /// Every connection holds a receiver and filters channel topics locally.
    broadcast_tx: broadcast::Sender<Broadcast>,

    /// conn_id -> binding
    connections: RwLock<HashMap<Uuid, ConnectionBinding>>,
}

impl Dispatcher {
    pub fn new(scope: BroadcastScope) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                scope,
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Receive every published event. Callers filter channel topics through
    /// `is_subscribed`.
    pub fn receiver(&self) -> broadcast::Receiver<Broadcast> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event to its topic. Never blocks, never fails the caller.
    pub fn publish(&self, event: GatewayEvent) {
        let topic = event.topic(self.inner.scope);
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                return;
            }
        };

        debug!("publish {} -> {:?}", event.name(), topic);
        let _ = self.inner.broadcast_tx.send(Broadcast {
            topic,
            name: event.name(),
            json: json.into(),
        });
    }

    /// Register a connection. Returns its id and the receiver for events
    /// targeted at it alone.
    pub async fn register(&self, identity: Identity) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(
            conn_id,
            ConnectionBinding {
                identity,
                channels: HashSet::new(),
                tx,
            },
        );
        (conn_id, rx)
    }

    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Add a channel to a connection's topic set. The channel is not checked
    /// for existence; joining an unknown id simply never delivers anything.
    pub async fn subscribe(&self, conn_id: Uuid, channel_id: i64) -> bool {
        match self.inner.connections.write().await.get_mut(&conn_id) {
            Some(binding) => {
                let added = binding.channels.insert(channel_id);
                if added {
                    debug!(
                        "{} ({}) joined channel {} [conn={}]",
                        binding.identity.username(),
                        binding.identity.user_id(),
                        channel_id,
                        conn_id
                    );
                }
                added
            }
            None => false,
        }
    }

    pub async fn is_subscribed(&self, conn_id: Uuid, channel_id: i64) -> bool {
        self.inner
            .connections
            .read()
            .await
            .get(&conn_id)
            .is_some_and(|b| b.channels.contains(&channel_id))
    }

    /// Whether a broadcast on `topic` should reach this connection.
    pub async fn delivers(&self, conn_id: Uuid, topic: Topic) -> bool {
        match topic {
            Topic::Global => true,
            Topic::Channel(channel_id) => self.is_subscribed(conn_id, channel_id).await,
        }
    }

    /// Send an event to one connection only.
    pub async fn send_to(&self, conn_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(binding) = connections.get(&conn_id) {
            let _ = binding.tx.send(event);
        }
    }

    #[cfg(test)]
    pub async fn identity(&self, conn_id: Uuid) -> Option<Identity> {
        self.inner
            .connections
            .read()
            .await
            .get(&conn_id)
            .map(|b| b.identity.clone())
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}
