//! Reload/retry engine: reads the bound files, rebuilds the plugin map and
//! retries transient failures with a fixed budget.
//!
//! The engine is a three-state machine. `Idle` is the resting state;
//! `Reloading` covers the read/parse/rebuild cycle including the inter-retry
//! delays; `Exhausted` is entered after the retry budget runs out and sticks
//! until the next externally triggered reload. While `Exhausted`, the map
//! keeps its last-known-good value (or stays empty if the very first load
//! failed).

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use crate::format;
use crate::models::{GameSpec, PluginFormat, PluginMap};
use crate::store::SyncEvent;
use crate::store::shared::SharedState;

/// Where the engine currently is in its reload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Reloading,
    /// Retry budget spent; no automatic retries until the next trigger.
    Exhausted,
}

pub(crate) struct ReloadEngine {
    shared: Arc<SharedState>,
    events: broadcast::Sender<SyncEvent>,
    state: std::sync::Mutex<ReloadState>,
    /// Reads attempted during the most recent reload cycle (diagnostics).
    attempts: AtomicU32,
    retry_count: u32,
    retry_delay: Duration,
}

impl ReloadEngine {
    pub fn new(
        shared: Arc<SharedState>,
        events: broadcast::Sender<SyncEvent>,
        retry_count: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            shared,
            events,
            state: std::sync::Mutex::new(ReloadState::Idle),
            attempts: AtomicU32::new(0),
            retry_count,
            retry_delay,
        }
    }

    pub fn state(&self) -> ReloadState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ReloadState) {
        *self.state.lock().unwrap() = state;
    }

    /// Reads attempted during the most recent reload cycle.
    pub fn last_attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Force the engine back to `Idle`. Called on unbind; any in-flight
    /// attempt will notice the stale generation and back off on its own.
    pub fn force_idle(&self) {
        self.set_state(ReloadState::Idle);
    }

    /// Run one reload cycle: read, parse, rebuild, with bounded retry.
    ///
    /// No-op while unbound. On success the map is replaced wholesale, the
    /// `loaded` flag flips true and [`SyncEvent::Reloaded`] fires. On
    /// exhaustion the map is left untouched and
    /// [`SyncEvent::ReloadExhausted`] fires instead.
    pub async fn reload(&self) {
        let Some(binding) = self.shared.binding_snapshot() else {
            tracing::debug!("reload requested while unbound, ignoring");
            return;
        };
        let generation = binding.generation;

        self.set_state(ReloadState::Reloading);
        self.attempts.store(0, Ordering::SeqCst);

        let mut retries_left = self.retry_count;
        loop {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let outcome = read_plugin_files(&binding.spec).await;

            // The binding may have been torn down while we were on disk.
            if !self.shared.is_current(generation) {
                tracing::debug!("binding changed during reload, discarding result");
                self.set_state(ReloadState::Idle);
                return;
            }

            match outcome {
                Ok(map) => {
                    let count = map.len();
                    *self.shared.map.write().unwrap() = map;
                    self.shared.loaded.store(true, Ordering::SeqCst);
                    self.set_state(ReloadState::Idle);
                    tracing::info!(
                        "reloaded {} plugins from {}",
                        count,
                        binding.spec.data_path
                    );
                    let _ = self.events.send(SyncEvent::Reloaded);
                    return;
                }
                Err(err) if retries_left > 0 => {
                    retries_left -= 1;
                    tracing::debug!(
                        "reload attempt failed ({} retries left): {:#}",
                        retries_left,
                        err
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    tracing::error!(
                        "reload of {} failed after {} attempts: {:#}",
                        binding.spec.data_path,
                        self.attempts.load(Ordering::SeqCst),
                        err
                    );
                    self.set_state(ReloadState::Exhausted);
                    let _ = self.events.send(SyncEvent::ReloadExhausted {
                        message: format!("{err:#}"),
                    });
                    return;
                }
            }
        }
    }
}

/// Read and decode the file set for `spec`, producing a fresh map.
async fn read_plugin_files(spec: &GameSpec) -> Result<PluginMap> {
    match spec.format {
        PluginFormat::Original => {
            let order_path = spec.data_path.join("loadorder.txt");
            let enabled_path = spec.data_path.join("plugins.txt");

            let order_bytes = tokio::fs::read(&order_path)
                .await
                .with_context(|| format!("failed to read {order_path}"))?;
            let enabled_bytes = tokio::fs::read(&enabled_path)
                .await
                .with_context(|| format!("failed to read {enabled_path}"))?;

            let mut parsed = format::parse(&order_bytes, PluginFormat::Original)
                .with_context(|| format!("failed to decode {order_path}"))?;
            let enabled = format::parse_enabled_set(&enabled_bytes)
                .with_context(|| format!("failed to decode {enabled_path}"))?;

            // Order file is authoritative for order; enabled state is
            // membership in the second file, compared case-insensitively.
            for plugin in &mut parsed {
                plugin.enabled_hint = enabled.contains(&plugin.name.to_lowercase());
            }

            Ok(format::reconcile(&parsed, &spec.native_plugins))
        }
        PluginFormat::AlternateOrdered => {
            let path = spec.data_path.join("plugins.txt");
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {path}"))?;
            let parsed = format::parse(&bytes, PluginFormat::AlternateOrdered)
                .with_context(|| format!("failed to decode {path}"))?;
            Ok(format::reconcile(&parsed, &spec.native_plugins))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::shared::Binding;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn bind_to(shared: &SharedState, dir: &TempDir, format: PluginFormat) {
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        shared.generation.store(1, Ordering::SeqCst);
        *shared.binding.write().unwrap() = Some(Binding {
            generation: 1,
            spec: GameSpec::new(path, format),
        });
    }

    #[tokio::test]
    async fn test_reload_original_format_resolves_enabled_membership() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("loadorder.txt"),
            "#hdr\r\nModA\r\nModB\r\nModC\r\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("plugins.txt"), "#hdr\r\nModA\r\nModC\r\n").unwrap();

        let shared = Arc::new(SharedState::new());
        bind_to(&shared, &dir, PluginFormat::Original);
        let (events, mut rx) = broadcast::channel(16);
        let engine = ReloadEngine::new(Arc::clone(&shared), events, 3, Duration::from_millis(10));

        engine.reload().await;

        assert_eq!(engine.state(), ReloadState::Idle);
        assert!(shared.is_loaded());
        assert!(matches!(rx.try_recv().unwrap(), SyncEvent::Reloaded));

        let map = shared.map_snapshot();
        assert_eq!(map.len(), 3);
        assert!(map["ModA"].enabled);
        assert_eq!(map["ModA"].load_order, 0);
        assert!(!map["ModB"].enabled);
        assert_eq!(map["ModB"].load_order, 1);
        assert!(map["ModC"].enabled);
        assert_eq!(map["ModC"].load_order, 2);
    }

    #[tokio::test]
    async fn test_reload_retries_then_exhausts() {
        let dir = TempDir::new().unwrap(); // no files inside

        let shared = Arc::new(SharedState::new());
        bind_to(&shared, &dir, PluginFormat::AlternateOrdered);
        let (events, mut rx) = broadcast::channel(16);
        let engine = ReloadEngine::new(Arc::clone(&shared), events, 3, Duration::from_millis(5));

        engine.reload().await;

        assert_eq!(engine.state(), ReloadState::Exhausted);
        // 1 initial attempt + 3 retries
        assert_eq!(engine.last_attempt_count(), 4);
        assert!(!shared.is_loaded());
        assert!(shared.map_snapshot().is_empty());
        assert!(matches!(
            rx.try_recv().unwrap(),
            SyncEvent::ReloadExhausted { .. }
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_last_good_map() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plugins.txt"), "#hdr\r\n*ModX\r\nModY\r\n").unwrap();

        let shared = Arc::new(SharedState::new());
        bind_to(&shared, &dir, PluginFormat::AlternateOrdered);
        let (events, _rx) = broadcast::channel(16);
        let engine = ReloadEngine::new(Arc::clone(&shared), events, 2, Duration::from_millis(5));

        engine.reload().await;
        let good = shared.map_snapshot();
        assert_eq!(good.len(), 2);

        // Truncate the file so every attempt hits EmptyContent.
        std::fs::write(dir.path().join("plugins.txt"), "").unwrap();
        engine.reload().await;

        assert_eq!(engine.state(), ReloadState::Exhausted);
        assert_eq!(shared.map_snapshot(), good);
    }

    #[tokio::test]
    async fn test_reload_noop_while_unbound() {
        let shared = Arc::new(SharedState::new());
        let (events, mut rx) = broadcast::channel(16);
        let engine = ReloadEngine::new(Arc::clone(&shared), events, 3, Duration::from_millis(5));

        engine.reload().await;

        assert_eq!(engine.state(), ReloadState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unbind_during_retry_discards_result() {
        let dir = TempDir::new().unwrap(); // no files yet: first attempt fails

        let shared = Arc::new(SharedState::new());
        bind_to(&shared, &dir, PluginFormat::AlternateOrdered);
        let (events, mut rx) = broadcast::channel(16);
        let engine = Arc::new(ReloadEngine::new(
            Arc::clone(&shared),
            events,
            3,
            Duration::from_millis(150),
        ));

        let task = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.reload().await }
        });

        // Let the first attempt fail and enter the retry sleep, then make
        // the next read succeed while tearing the binding down underneath it.
        tokio::time::sleep(Duration::from_millis(40)).await;
        std::fs::write(dir.path().join("plugins.txt"), "#hdr\r\n*ModX\r\n").unwrap();
        shared.generation.store(2, Ordering::SeqCst);
        *shared.binding.write().unwrap() = None;

        task.await.unwrap();

        // The second attempt read the file successfully but against a stale
        // binding, so the result was discarded without mutating anything.
        assert_eq!(engine.last_attempt_count(), 2);
        assert!(shared.map_snapshot().is_empty());
        assert!(!shared.is_loaded());
        assert_eq!(engine.state(), ReloadState::Idle);
        assert!(rx.try_recv().is_err());
    }
}
