//! Error types for the edgequake-video2deck library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Video2DeckError`] — **Fatal** for whatever call returned it. Inside a
//!   job run only a missing job record, a missing source file, and a failed
//!   frame extraction are fatal; the orchestrator turns those into
//!   `status = failed` with the error's display string.
//!
//! * [`FrameError`] — **Non-fatal**: a single frame could not be decoded,
//!   classified, or hashed. It is recorded on the frame's classification and
//!   the selection pass carries on with the remaining frames.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse error taxonomy, independent of which stage raised the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing job record or missing source file.
    NotFound,
    /// An external collaborator (ffmpeg, OCR, vision, transcription, LLM, PDF) failed.
    Collaborator,
    /// Malformed submission or configuration.
    Validation,
    /// Anything else: panicked task, store I/O, serialisation.
    Internal,
}

/// All fatal errors returned by the edgequake-video2deck library.
#[derive(Debug, Error)]
pub enum Video2DeckError {
    // ── Lookup errors ─────────────────────────────────────────────────────
    /// No job record exists for this identifier.
    #[error("Job '{id}' not found")]
    JobNotFound { id: String },

    /// The job's source reference resolved to a path that does not exist.
    #[error("Video file not found at: {path}")]
    SourceNotFound { path: PathBuf },

    /// The job has no source reference yet (remote fetch still pending).
    #[error("Job '{id}' has no source video yet")]
    SourceMissing { id: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The frame extraction tool failed or could not be spawned.
    #[error("Frame extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    /// Extraction finished but produced no image files.
    #[error("No frames extracted into '{dir}'")]
    NoFrames { dir: PathBuf },

    /// Any other external call failed.
    #[error("{stage} failed: {detail}")]
    Collaborator { stage: &'static str, detail: String },

    /// The configured LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set VIDEO2DECK_PDFIUM_DIR to the directory holding libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Submission errors ─────────────────────────────────────────────────
    /// The input string is neither an existing file nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The job store could not read or write a record.
    #[error("Job store error: {detail}")]
    Store { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Video2DeckError {
    /// Map this error onto the coarse [`ErrorKind`] taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::JobNotFound { .. } | Self::SourceNotFound { .. } | Self::SourceMissing { .. } => {
                ErrorKind::NotFound
            }
            Self::ExtractionFailed { .. }
            | Self::NoFrames { .. }
            | Self::Collaborator { .. }
            | Self::ProviderNotConfigured { .. }
            | Self::PdfiumBindingFailed(_)
            | Self::DownloadFailed { .. }
            | Self::DownloadTimeout { .. } => ErrorKind::Collaborator,
            Self::InvalidInput { .. } | Self::InvalidConfig(_) => ErrorKind::Validation,
            Self::Store { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a [`Video2DeckError::Collaborator`] error.
    pub fn collaborator(stage: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            stage,
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal error for a single frame.
///
/// Stored on the frame's [`crate::pipeline::classify::Classification`] so the
/// selector can log it and move on.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum FrameError {
    /// The image could not be opened or decoded.
    #[error("{path}: unreadable image: {detail}")]
    Unreadable { path: PathBuf, detail: String },

    /// The zero-shot visual classifier failed for this frame.
    #[error("{path}: visual classification failed: {detail}")]
    Vision { path: PathBuf, detail: String },

    /// Fingerprinting failed for this frame.
    #[error("{path}: hashing failed: {detail}")]
    Hash { path: PathBuf, detail: String },

    /// A collaborator panicked while this frame was being classified.
    #[error("{path}: classification panicked: {detail}")]
    Panicked { path: PathBuf, detail: String },
}
