//! Change watcher: detects external edits to the bound plugin files and
//! debounces them into reload triggers.
//!
//! A `notify` watcher feeds raw filesystem events into a tokio channel; a
//! spawned select loop filters them down to the one or two filenames the
//! active format uses, drops everything while our own writes are pending, and
//! coalesces bursts with a reschedule-on-event debounce deadline. When the
//! deadline fires the reload engine runs once.
//!
//! The watcher is an owned handle: `close()` signals the loop over a watch
//! channel and awaits it, so no callback can outlive the binding it was
//! created for.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::services::reload::ReloadEngine;
use crate::store::shared::SharedState;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to watch plugin directory: {0}")]
    Setup(#[from] notify::Error),
}

/// Owned subscription to filesystem changes in the bound directory.
pub(crate) struct ChangeWatcher {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ChangeWatcher {
    /// Start watching `dir` for changes to `file_names`.
    ///
    /// Fails if the directory cannot be watched (missing or unreadable); the
    /// caller logs and leaves the watcher unset until the next bind.
    pub fn spawn(
        shared: Arc<SharedState>,
        engine: Arc<ReloadEngine>,
        generation: u64,
        dir: Utf8PathBuf,
        file_names: &'static [&'static str],
        debounce: Duration,
    ) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.blocking_send(res);
        })?;
        watcher.watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(watch_loop(
            shared,
            engine,
            generation,
            file_names,
            debounce,
            event_rx,
            shutdown_rx,
            watcher,
        ));

        tracing::debug!("watching {} for {:?}", dir, file_names);
        Ok(Self { shutdown, handle })
    }

    /// Stop the watcher and wait for its loop to exit.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn watch_loop(
    shared: Arc<SharedState>,
    engine: Arc<ReloadEngine>,
    generation: u64,
    file_names: &'static [&'static str],
    debounce: Duration,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut shutdown_rx: watch::Receiver<bool>,
    _watcher: notify::RecommendedWatcher,
) {
    // Reschedule-on-event debounce: a new relevant event overwrites the
    // deadline, so a burst coalesces into a single reload.
    let mut deadline: Option<Instant> = None;

    loop {
        let debounce_timer = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown_rx.changed() => break,

            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if is_relevant(&event, file_names) && !shared.write_in_flight() {
                            deadline = Some(Instant::now() + debounce);
                        }
                    }
                    Some(Err(err)) => {
                        tracing::error!("filesystem watch error: {}", err);
                    }
                    None => break,
                }
            }

            _ = debounce_timer => {
                deadline = None;
                if shared.is_current(generation) {
                    tracing::debug!("external plugin file change detected, reloading");
                    engine.reload().await;
                } else {
                    break;
                }
            }
        }
    }

    tracing::debug!("change watcher stopped");
}

/// Whether the event touches one of the managed file names and is a content
/// change we care about.
fn is_relevant(event: &Event, file_names: &'static [&'static str]) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }

    event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                file_names
                    .iter()
                    .any(|managed| name.eq_ignore_ascii_case(managed))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn modify_event(path: &str) -> Event {
        Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Any),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_relevance_filters_by_file_name() {
        let managed: &'static [&'static str] = &["loadorder.txt", "plugins.txt"];

        assert!(is_relevant(&modify_event("/game/plugins.txt"), managed));
        assert!(is_relevant(&modify_event("/game/LoadOrder.TXT"), managed));
        assert!(!is_relevant(&modify_event("/game/archive.bsa"), managed));
    }

    #[test]
    fn test_relevance_ignores_access_events() {
        let event = Event {
            kind: EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![PathBuf::from("/game/plugins.txt")],
            attrs: Default::default(),
        };
        assert!(!is_relevant(&event, &["plugins.txt"]));
    }
}
