//! Store facade - the key/value store contract the rest of the system
//! depends on, plus game bind/unbind lifecycle and event fan-out.
//!
//! The store presents the plugin map as a single logical record under
//! [`STORE_KEY`]. Mutations (`set_item` / `remove_item`) update the in-memory
//! map and enqueue a serialized disk write; reads (`get_item`) serve from
//! memory, triggering a reload first if nothing has been loaded yet.
//!
//! Reload outcomes and write failures are published as [`SyncEvent`]s on a
//! broadcast channel rather than absorbed into logs alone, so the owning
//! system can decide about user notification.

pub(crate) mod shared;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::models::{GameDiscovery, PluginMap};
use crate::services::reload::{ReloadEngine, ReloadState};
use crate::services::serializer::WriteSerializer;
use crate::services::watcher::ChangeWatcher;
use shared::{Binding, SharedState};

/// The single logical key the store contract exposes.
pub const STORE_KEY: &str = "plugins";

/// Events published after state transitions worth surfacing to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A reload completed and the map was rebuilt from disk. The owning
    /// system should drop any cached view of the map.
    Reloaded,

    /// The reload retry budget ran out; the map is frozen at its last good
    /// value until the next externally triggered reload.
    ReloadExhausted { message: String },

    /// A queued disk write failed. The queue proceeds; the next write
    /// re-persists the full map.
    WriteFailed { path: String, message: String },
}

/// Errors surfaced to store-contract callers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// `set_item` received JSON that does not decode into a plugin map.
    /// Nothing is mutated and no write is enqueued.
    #[error("invalid plugin map payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// `bind` was asked for a game the discovery source does not know.
    #[error("unknown game id: {0}")]
    UnknownGame(String),
}

/// Persistence adapter for one game's plugin list files.
///
/// Create with [`PluginStore::new`] inside a tokio runtime (the write worker
/// is spawned immediately), then [`bind`](Self::bind) a game to start
/// synchronizing. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct PluginStore {
    shared: Arc<SharedState>,
    events: broadcast::Sender<SyncEvent>,
    serializer: WriteSerializer,
    engine: Arc<ReloadEngine>,
    watcher: Arc<tokio::sync::Mutex<Option<ChangeWatcher>>>,
    discovery: Arc<dyn GameDiscovery>,
    debounce: Duration,
}

impl PluginStore {
    /// Create an unbound store. Must be called within a tokio runtime.
    pub fn new(discovery: Arc<dyn GameDiscovery>, config: SyncConfig) -> Self {
        let shared = Arc::new(SharedState::new());
        let (events, _) = broadcast::channel(100);

        let serializer = WriteSerializer::new(Arc::clone(&shared), events.clone());
        let engine = Arc::new(ReloadEngine::new(
            Arc::clone(&shared),
            events.clone(),
            config.retry_count,
            Duration::from_millis(config.retry_delay_ms),
        ));

        Self {
            shared,
            events,
            serializer,
            engine,
            watcher: Arc::new(tokio::sync::Mutex::new(None)),
            discovery,
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }

    /// Bind to `game_id`: tear down any previous binding, install the new
    /// one, kick off the initial reload in the background and start watching
    /// the plugin directory.
    ///
    /// Watcher setup failure (missing or unreadable directory) is logged and
    /// tolerated; reloads then only happen on explicit triggers.
    pub async fn bind(&self, game_id: &str) -> Result<(), StoreError> {
        let spec = self
            .discovery
            .resolve(game_id)
            .ok_or_else(|| StoreError::UnknownGame(game_id.to_string()))?;

        self.unbind().await;

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.binding.write().unwrap() = Some(Binding {
            generation,
            spec: spec.clone(),
        });

        tracing::info!(
            "bound {} ({:?}) at {}",
            game_id,
            spec.format,
            spec.data_path
        );

        // Initial reload runs in the background so bind never blocks on
        // disk; completion is observable via subscribe().
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.reload().await;
        });

        match ChangeWatcher::spawn(
            Arc::clone(&self.shared),
            Arc::clone(&self.engine),
            generation,
            spec.data_path.clone(),
            spec.format.file_names(),
            self.debounce,
        ) {
            Ok(watcher) => {
                *self.watcher.lock().await = Some(watcher);
            }
            Err(err) => {
                tracing::warn!("could not watch {}: {}", spec.data_path, err);
            }
        }

        Ok(())
    }

    /// Clear the binding. The watcher is torn down deterministically, the map
    /// is reset to empty and all further operations become no-ops until the
    /// next [`bind`](Self::bind). Safe to call while already unbound.
    pub async fn unbind(&self) {
        if let Some(watcher) = self.watcher.lock().await.take() {
            watcher.close().await;
        }

        let had_binding = self.shared.binding.write().unwrap().take().is_some();
        // Invalidates every continuation issued against the old binding.
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.loaded.store(false, Ordering::SeqCst);
        self.shared.map.write().unwrap().clear();
        self.engine.force_idle();

        if had_binding {
            tracing::info!("unbound");
        }
    }

    /// Full plugin map serialized as JSON. The key is ignored; the store
    /// holds a single logical record. Triggers a reload first when bound but
    /// not yet loaded.
    pub async fn get_item(&self, _key: &str) -> Result<String, StoreError> {
        if self.shared.binding_snapshot().is_some() && !self.shared.is_loaded() {
            self.engine.reload().await;
        }
        Ok(serde_json::to_string(&self.shared.map_snapshot())?)
    }

    /// Replace the map wholesale with the decoded payload, then enqueue and
    /// await a serialized write.
    ///
    /// The decode fails closed: malformed JSON or unknown entry fields return
    /// [`StoreError::InvalidPayload`] without mutating anything.
    pub async fn set_item(&self, _key: &str, json: &str) -> Result<(), StoreError> {
        if self.shared.binding_snapshot().is_none() {
            tracing::debug!("set_item while unbound, ignoring");
            return Ok(());
        }
        let parsed: PluginMap = serde_json::from_str(json)?;
        *self.shared.map.write().unwrap() = parsed;
        self.serializer.enqueue().wait().await;
        Ok(())
    }

    /// Delete one entry by plugin name, then enqueue and await a serialized
    /// write. Remaining entries keep their `load_order` values.
    pub async fn remove_item(&self, name: &str) {
        if self.shared.binding_snapshot().is_none() {
            tracing::debug!("remove_item while unbound, ignoring");
            return;
        }
        let removed = self.shared.map.write().unwrap().shift_remove(name).is_some();
        if removed {
            tracing::debug!("removed plugin entry {}", name);
        }
        self.serializer.enqueue().wait().await;
    }

    /// The store always reports exactly one logical key.
    pub fn get_all_keys(&self) -> Vec<&'static str> {
        vec![STORE_KEY]
    }

    /// Subscribe to reload and write outcome events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Clone out the current map (diagnostics and tests).
    pub fn snapshot(&self) -> PluginMap {
        self.shared.map_snapshot()
    }

    /// Whether the first successful reload since bind has completed.
    pub fn is_loaded(&self) -> bool {
        self.shared.is_loaded()
    }

    /// Current reload engine state.
    pub fn reload_state(&self) -> ReloadState {
        self.engine.state()
    }

    /// Reads attempted during the most recent reload cycle (diagnostics).
    pub fn last_reload_attempts(&self) -> u32 {
        self.engine.last_attempt_count()
    }
}
