//! Progress-callback trait for per-job stage events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator moves a job through its checkpoints. The job
//! store remains the source of truth; callbacks are a push-style mirror of
//! what was just persisted, useful for terminal progress bars or forwarding
//! to a WebSocket.
//!
//! # Example
//!
//! ```rust
//! use edgequake_video2deck::{JobProgressCallback, PipelineConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, job_id: &str, stage: Stage, progress: u8) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{job_id}: {} ({progress}%)", stage.label());
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { stages: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(cb as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::job::Stage;
use std::sync::Arc;

/// Called by the orchestrator as it processes a job.
///
/// Implementations must be `Send + Sync`: the dispatcher runs jobs on a
/// spawned Tokio task. All methods have default no-op implementations so
/// callers only override what they care about.
pub trait JobProgressCallback: Send + Sync {
    /// Called once when a job enters `processing`.
    fn on_job_start(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called after a checkpoint has been persisted.
    ///
    /// # Arguments
    /// * `stage`    — the checkpoint just reached
    /// * `progress` — the persisted progress value (0–100)
    fn on_stage_complete(&self, job_id: &str, stage: Stage, progress: u8) {
        let _ = (job_id, stage, progress);
    }

    /// Called when a stage failed and its output fell back to a safe default.
    fn on_stage_degraded(&self, job_id: &str, stage: Stage, reason: &str) {
        let _ = (job_id, stage, reason);
    }

    /// Called once when a job reaches `done`.
    fn on_job_done(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called once when a job reaches `failed`.
    fn on_job_failed(&self, job_id: &str, error: &str) {
        let _ = (job_id, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
