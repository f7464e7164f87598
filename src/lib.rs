//! # edgequake-video2deck
//!
//! Turn a lecture or presentation video into a slide deck PDF, a timed
//! transcript and Markdown study notes.
//!
//! ## Why this crate?
//!
//! Sampling a frame every few seconds gives hundreds of images, most of
//! them the speaker, a hand in front of the board, or the same slide again.
//! This crate decides which frames are legible slide content by fusing a
//! zero-shot visual label with OCR text density, then drops perceptual
//! near-duplicates so each slide appears once. Around that engine it runs a
//! persisted, single-worker job pipeline where a failing stage degrades to
//! a safe default instead of sinking the whole job.
//!
//! ## Pipeline Overview
//!
//! ```text
//! video (file or URL)
//!  │
//!  ├─ 1. Submit      create job record, enqueue (download first for URLs)
//!  ├─ 2. Resolve     stored reference → absolute path          5%
//!  ├─ 3. Extract     ffmpeg, one frame every 2 s               30%  (fatal)
//!  ├─ 4. Select      classify ×4 concurrent, rank, dedup       45%
//!  ├─ 5. Transcribe  Whisper-compatible API, word timings      65%
//!  ├─ 6. Notes       LLM → Markdown, cleaned                   80%
//!  ├─ 7. Assemble    second dedup pass + pdfium, A4 landscape  95%
//!  └─ 8. Done                                                  100%
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_video2deck::{
//!     Collaborators, JobQueue, MemoryJobStore, Orchestrator, PipelineConfig, Submitter,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider auto-detected from EDGEQUAKE_LLM_PROVIDER / OPENAI_API_KEY / …
//!     let config = PipelineConfig::builder().upload_root("./uploads").build()?;
//!     let store = Arc::new(MemoryJobStore::new());
//!     let collab = Collaborators::from_config(&config, store.clone())?;
//!     let fetcher = collab.fetcher.clone();
//!     let orchestrator = Arc::new(Orchestrator::new(config, collab));
//!     let queue = JobQueue::start(orchestrator);
//!
//!     let submitter = Submitter::new(store.clone(), queue.clone(), fetcher);
//!     let job = submitter.submit("lecture.mp4").await?;
//!     println!("submitted {}", job.id);
//!
//!     queue.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `video2deck` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## External tools
//!
//! `ffmpeg` and `tesseract` must be on `PATH` (or configured), and a pdfium
//! shared library must be loadable for PDF assembly. Every one of them sits
//! behind a trait, so tests and embedders can substitute their own.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod flashcards;
pub mod job;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod queue;
pub mod store;
pub mod submit;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, ScoringPolicy, SelectionOptions};
pub use error::{ErrorKind, FrameError, Video2DeckError};
pub use flashcards::Flashcard;
pub use job::{Job, JobStatus, JobUpdate, Stage, TranscriptionDetail};
pub use orchestrator::{Collaborators, Orchestrator};
pub use outcome::Outcome;
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use queue::JobQueue;
pub use store::{FileJobStore, JobStore, MemoryJobStore};
pub use submit::{HttpVideoFetcher, Submitter, VideoFetcher};
