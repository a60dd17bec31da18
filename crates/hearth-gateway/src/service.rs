use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use hearth_db::Database;
use hearth_types::events::BroadcastScope;

use crate::dispatcher::Dispatcher;
use crate::error::ChatError;

/// Behaviour switches for the chat engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatSettings {
    pub broadcast_scope: BroadcastScope,
    /// Reject a new channel whose name is already taken.
    pub unique_channel_names: bool,
}

/// The realtime chat engine: store operations plus fan-out of whatever the
/// store persisted. Shared by the REST handlers and every gateway connection.
#[derive(Clone)]
pub struct ChatService {
    inner: Arc<ChatServiceInner>,
}

struct ChatServiceInner {
    db: Database,
    dispatcher: Dispatcher,
    settings: ChatSettings,

    /// Held from a mutation's store call through its publish, so events
    /// leave in the order their transactions committed.
    commit_order: Mutex<()>,
}

impl ChatService {
    pub fn new(db: Database, settings: ChatSettings) -> Self {
        Self {
            inner: Arc::new(ChatServiceInner {
                db,
                dispatcher: Dispatcher::new(settings.broadcast_scope),
                settings,
                commit_order: Mutex::new(()),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn settings(&self) -> ChatSettings {
        self.inner.settings
    }

    /// Take before a mutating store call and keep until its event is
    /// published. Reads do not need it.
    pub(crate) async fn sequence(&self) -> MutexGuard<'_, ()> {
        self.inner.commit_order.lock().await
    }

    /// Run a blocking store call off the async runtime.
    pub(crate) async fn store<F, T>(&self, f: F) -> Result<T, ChatError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || f(&inner.db))
            .await
            .map_err(|e| ChatError::StoreFailure(anyhow::anyhow!("spawn_blocking join error: {}", e)))?;
        Ok(result?)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
