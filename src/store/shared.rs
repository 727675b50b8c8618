//! State shared between the store facade and its background services.
//!
//! The binding carries a generation counter: `bind` and `unbind` both bump
//! it, and every asynchronous continuation (reload attempts, queued writes,
//! watcher callbacks) captures the generation it was issued against and
//! re-checks it before touching the map or the disk. A stale generation means
//! the binding changed underneath the continuation and it must back off.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::models::{GameSpec, PluginMap};

/// The active `(directory, format, native set)` tuple plus its generation.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub generation: u64,
    pub spec: GameSpec,
}

/// Runtime state shared across the facade, serializer, reload engine and
/// watcher. All fields are independently synchronized; none of the services
/// ever holds two locks at once.
pub(crate) struct SharedState {
    /// The plugin map. Source of truth for reads and writes while bound.
    pub map: RwLock<PluginMap>,

    /// Active binding, `None` while unbound.
    pub binding: RwLock<Option<Binding>>,

    /// False until the first successful reload after a bind. Writes enqueued
    /// before this flips are suppressed so a pre-existing on-disk state is
    /// never clobbered by the initial empty map.
    pub loaded: AtomicBool,

    /// Bumped by every bind and unbind; see module docs.
    pub generation: AtomicU64,

    /// Writes enqueued but not yet completed. The watcher drops filesystem
    /// events while this is non-zero so our own writes never self-reload.
    pub pending_writes: AtomicUsize,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(PluginMap::new()),
            binding: RwLock::new(None),
            loaded: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            pending_writes: AtomicUsize::new(0),
        }
    }

    /// Clone out the active binding, if any.
    pub fn binding_snapshot(&self) -> Option<Binding> {
        self.binding.read().unwrap().clone()
    }

    /// Whether `generation` still identifies the active binding.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && self
                .binding
                .read()
                .unwrap()
                .as_ref()
                .is_some_and(|b| b.generation == generation)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn write_in_flight(&self) -> bool {
        self.pending_writes.load(Ordering::SeqCst) > 0
    }

    /// Clone out the current map.
    pub fn map_snapshot(&self) -> PluginMap {
        self.map.read().unwrap().clone()
    }
}
