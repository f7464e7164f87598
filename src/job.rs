//! The job record: one explicit schema for everything a caller can poll.
//!
//! Every field is always present; genuinely optional data is `Option`. The
//! record is mutated only through [`JobUpdate`], whose named constructors
//! document which stage owns which fields:
//!
//! | Constructor | Owner | Fields |
//! |-------------|-------|--------|
//! | [`JobUpdate::source_ready`] | submission | `source`, `status=queued`, `progress=5` |
//! | [`JobUpdate::started`] | orchestrator | `status=processing` |
//! | [`JobUpdate::path_resolved`] | orchestrator | `progress=5` |
//! | [`JobUpdate::frames_extracted`] | orchestrator | `progress=30` |
//! | [`JobUpdate::slides_selected`] | orchestrator | `selected_frames`, `progress=45` |
//! | [`JobUpdate::transcribed`] | orchestrator | `transcript`, `transcription`, `progress=65` |
//! | [`JobUpdate::notes_synthesized`] | orchestrator | `final_notes`, `progress=80` |
//! | [`JobUpdate::slides_assembled`] | orchestrator | `slides_pdf`, `progress=95` |
//! | [`JobUpdate::done`] | orchestrator | `status=done`, `progress=100` |
//! | [`JobUpdate::failed`] | orchestrator / submission | `status=failed`, `error` |
//!
//! Because each stage's data and its progress value travel in the same
//! update, a reader never sees a progress bump without the matching output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the dispatcher queue.
    Queued,
    /// Remote fetch in progress; `source` is still `None`.
    Downloading,
    /// The orchestrator is running the pipeline.
    Processing,
    /// Terminal: artefacts (possibly partial) are populated.
    Done,
    /// Terminal: `error` carries a human-readable message.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Internal progress checkpoints of a `processing` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PathResolved,
    FramesExtracted,
    SlidesSelected,
    Transcribed,
    NotesSynthesized,
    PdfAssembled,
    Done,
}

impl Stage {
    /// Progress percentage persisted when this checkpoint is reached.
    pub fn progress(self) -> u8 {
        match self {
            Stage::PathResolved => 5,
            Stage::FramesExtracted => 30,
            Stage::SlidesSelected => 45,
            Stage::Transcribed => 65,
            Stage::NotesSynthesized => 80,
            Stage::PdfAssembled => 95,
            Stage::Done => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::PathResolved => "path resolved",
            Stage::FramesExtracted => "frames extracted",
            Stage::SlidesSelected => "slides selected",
            Stage::Transcribed => "transcript obtained",
            Stage::NotesSynthesized => "notes synthesized",
            Stage::PdfAssembled => "PDF assembled",
            Stage::Done => "done",
        }
    }
}

/// A single transcribed word with timing in seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A transcript segment with timing in seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub id: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Word- and segment-level timing returned by the transcription collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranscriptionDetail {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// The unit of work and its externally visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique identifier, never reused.
    pub id: String,
    pub status: JobStatus,
    /// 0–100, non-decreasing within a run.
    pub progress: u8,
    /// Stored file reference; `None` while a remote fetch is pending.
    pub source: Option<String>,
    pub transcript: String,
    pub transcription: TranscriptionDetail,
    pub final_notes: String,
    /// Web-addressable paths of the selected slide frames.
    pub selected_frames: Vec<String>,
    /// Public path of the generated PDF, if assembly succeeded.
    pub slides_pdf: Option<String>,
    /// Present only when `status == Failed`.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh record with a new UUID.
    pub fn new(status: JobStatus, source: Option<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), status, source)
    }

    pub fn with_id(id: impl Into<String>, status: JobStatus, source: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status,
            progress: 0,
            source,
            transcript: String::new(),
            transcription: TranscriptionDetail::default(),
            final_notes: String::new(),
            selected_frames: Vec::new(),
            slides_pdf: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(source) = update.source {
            self.source = Some(source);
        }
        if let Some(transcript) = update.transcript {
            self.transcript = transcript;
        }
        if let Some(detail) = update.transcription {
            self.transcription = detail;
        }
        if let Some(notes) = update.final_notes {
            self.final_notes = notes;
        }
        if let Some(frames) = update.selected_frames {
            self.selected_frames = frames;
        }
        if let Some(pdf) = update.slides_pdf {
            self.slides_pdf = pdf;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.updated_at = Utc::now();
    }
}

/// A partial, field-level update to a [`Job`].
///
/// `slides_pdf` is doubly optional: `None` leaves the field alone,
/// `Some(None)` records "assembly failed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub source: Option<String>,
    pub transcript: Option<String>,
    pub transcription: Option<TranscriptionDetail>,
    pub final_notes: Option<String>,
    pub selected_frames: Option<Vec<String>>,
    pub slides_pdf: Option<Option<String>>,
    pub error: Option<String>,
}

impl JobUpdate {
    fn at(stage: Stage) -> Self {
        Self {
            progress: Some(stage.progress()),
            ..Default::default()
        }
    }

    /// A remote fetch finished: the job now has a local source and is queued.
    pub fn source_ready(path: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Queued),
            progress: Some(5),
            source: Some(path.into()),
            ..Default::default()
        }
    }

    /// Entry into `processing`; written once per run before any stage runs.
    pub fn started() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            ..Default::default()
        }
    }

    pub fn path_resolved() -> Self {
        Self::at(Stage::PathResolved)
    }

    pub fn frames_extracted() -> Self {
        Self::at(Stage::FramesExtracted)
    }

    pub fn slides_selected(public_frames: Vec<String>) -> Self {
        Self {
            selected_frames: Some(public_frames),
            ..Self::at(Stage::SlidesSelected)
        }
    }

    pub fn transcribed(detail: TranscriptionDetail) -> Self {
        Self {
            transcript: Some(detail.text.clone()),
            transcription: Some(detail),
            ..Self::at(Stage::Transcribed)
        }
    }

    pub fn notes_synthesized(notes: impl Into<String>) -> Self {
        Self {
            final_notes: Some(notes.into()),
            ..Self::at(Stage::NotesSynthesized)
        }
    }

    pub fn slides_assembled(pdf_public: Option<String>) -> Self {
        Self {
            slides_pdf: Some(pdf_public),
            ..Self::at(Stage::PdfAssembled)
        }
    }

    pub fn done() -> Self {
        Self {
            status: Some(JobStatus::Done),
            ..Self::at(Stage::Done)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
