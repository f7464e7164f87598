//! The dispatcher: a single worker draining a FIFO of job identifiers.
//!
//! Jobs never run concurrently. Frame classification already fans out
//! inside a run, and the shared model handle and frames directory are not
//! worth contending for across jobs.
//!
//! The queue lives in memory only. Identifiers still queued when the
//! process exits are lost; their records stay at whatever state was last
//! persisted (usually `queued`).
//!
//! Each run is spawned on its own task and awaited, so a panic inside the
//! pipeline marks that job `failed` and the worker moves on to the next id.

use crate::error::Video2DeckError;
use crate::orchestrator::Orchestrator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Single-worker FIFO job queue. Construct once with [`JobQueue::start`].
#[derive(Debug)]
pub struct JobQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
}

impl JobQueue {
    /// Spawn the worker task. Must be called inside a Tokio runtime.
    pub fn start(orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let busy = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(drain(
            rx,
            orchestrator,
            Arc::clone(&pending),
            Arc::clone(&busy),
        ));
        Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            pending,
            busy,
        })
    }

    /// Append `id` to the queue. Fails once [`shutdown`](Self::shutdown) has begun.
    pub fn enqueue(&self, id: impl Into<String>) -> Result<(), Video2DeckError> {
        let id = id.into();
        let guard = self
            .tx
            .lock()
            .map_err(|_| Video2DeckError::Internal("job queue lock poisoned".into()))?;
        let tx = guard
            .as_ref()
            .ok_or_else(|| Video2DeckError::Internal("job queue is shut down".into()))?;

        self.pending.fetch_add(1, Ordering::SeqCst);
        if tx.send(id.clone()).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(Video2DeckError::Internal("job queue worker has stopped".into()));
        }
        debug!("Enqueued job {} ({} pending)", id, self.pending());
        Ok(())
    }

    /// Identifiers waiting behind the current run.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether a job is running right now.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Stop accepting work, run everything already queued, then join the worker.
    pub async fn shutdown(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Job queue worker panicked: {}", e);
            }
        }
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<String>,
    orchestrator: Arc<Orchestrator>,
    pending: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
) {
    while let Some(id) = rx.recv().await {
        pending.fetch_sub(1, Ordering::SeqCst);
        busy.store(true, Ordering::SeqCst);

        let orch = Arc::clone(&orchestrator);
        let job_id = id.clone();
        let run = tokio::spawn(async move { orch.run_job(&job_id).await });

        match run.await {
            Ok(Ok(job)) => info!("Job {} finished as {}", id, job.status),
            Ok(Err(e)) => error!("Job {} could not be run: {}", id, e),
            Err(e) => {
                let message = format!("job run panicked: {e}");
                if let Err(store_err) = orchestrator.fail_job(&id, &message).await {
                    error!("Job {}: {} (and marking it failed failed: {})", id, message, store_err);
                }
            }
        }

        busy.store(false, Ordering::SeqCst);
    }
    debug!("Job queue drained, worker exiting");
}
