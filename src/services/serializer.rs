//! Write serializer: guarantees at most one in-flight disk write, FIFO order.
//!
//! Every store mutation enqueues a write request on an explicit queue drained
//! by a single worker loop. Each request gets a [`WriteTicket`] that resolves
//! once that write and all writes queued ahead of it have completed, so the
//! two on-disk files can never be torn by interleaved writers.
//!
//! Failure policy: a write error is logged and surfaced as
//! [`SyncEvent::WriteFailed`], but the queue always proceeds to the next
//! request. There is no write retry; the next mutation re-persists the full
//! map anyway.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::format;
use crate::store::SyncEvent;
use crate::store::shared::SharedState;

/// Resolves once the associated write (and everything ahead of it) finished.
///
/// Resolution does not imply the bytes hit the disk: suppressed writes
/// (unbound, or before the first successful reload) and failed writes also
/// complete their ticket. Failures are reported on the event channel instead.
pub(crate) struct WriteTicket {
    done: oneshot::Receiver<()>,
}

impl WriteTicket {
    pub async fn wait(self) {
        // The worker never drops a request without signalling, but if the
        // runtime is tearing down we just return.
        let _ = self.done.await;
    }
}

struct WriteRequest {
    done: oneshot::Sender<()>,
}

/// FIFO write queue with a single draining worker.
#[derive(Clone)]
pub(crate) struct WriteSerializer {
    tx: mpsc::UnboundedSender<WriteRequest>,
    shared: Arc<SharedState>,
}

impl WriteSerializer {
    /// Create the serializer and spawn its worker loop.
    pub fn new(shared: Arc<SharedState>, events: broadcast::Sender<SyncEvent>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();

        let worker_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                run_write(&worker_shared, &events).await;
                worker_shared.pending_writes.fetch_sub(1, Ordering::SeqCst);
                let _ = request.done.send(());
            }
        });

        Self { tx, shared }
    }

    /// Enqueue a write of the current map and return its ticket.
    pub fn enqueue(&self) -> WriteTicket {
        let (done, rx) = oneshot::channel();
        self.shared.pending_writes.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(WriteRequest { done }).is_err() {
            // Worker gone (runtime shutdown); undo the counter so the watcher
            // is not wedged into ignoring events forever.
            self.shared.pending_writes.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("write queue closed, dropping write request");
        }
        WriteTicket { done: rx }
    }
}

/// Execute one write: snapshot the map, render, write the file set.
async fn run_write(shared: &SharedState, events: &broadcast::Sender<SyncEvent>) {
    if !shared.is_loaded() {
        tracing::debug!("suppressing write before first successful reload");
        return;
    }

    let Some(binding) = shared.binding_snapshot() else {
        tracing::debug!("suppressing write while unbound");
        return;
    };

    let snapshot = shared.map_snapshot();
    let files = format::render(&snapshot, binding.spec.format, &binding.spec.native_plugins);

    for file in files {
        // The binding may have been cleared while an earlier file in this set
        // was being written; re-check before each file touches disk.
        if !shared.is_current(binding.generation) {
            tracing::debug!("binding changed mid-write, abandoning remaining files");
            return;
        }

        let path = binding.spec.data_path.join(file.name);
        if let Err(err) = tokio::fs::write(&path, &file.bytes).await {
            tracing::error!("failed to write {}: {}", path, err);
            let _ = events.send(SyncEvent::WriteFailed {
                path: path.to_string(),
                message: err.to_string(),
            });
            return;
        }
        tracing::debug!("wrote {} ({} bytes)", path, file.bytes.len());
    }
}
