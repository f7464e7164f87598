//! The pipeline orchestrator: drives one job from `queued` to a terminal state.
//!
//! ## Failure policy
//!
//! Stages do not fail uniformly. Partial artefacts (notes without slides,
//! slides without a transcript) are worth more to the caller than no job,
//! so most stages degrade instead of aborting:
//!
//! | Stage | On failure |
//! |-------|------------|
//! | path resolution | job `failed` |
//! | frame extraction | job `failed` |
//! | slide selection | first raw frame is used |
//! | transcription | empty transcript |
//! | notes synthesis | [`NOTES_FAILED_PLACEHOLDER`](crate::prompts::NOTES_FAILED_PLACEHOLDER) |
//! | PDF assembly | `slides_pdf = None` |
//!
//! Every checkpoint is persisted together with its output in one
//! [`JobUpdate`], then mirrored to the progress callback.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::job::{Job, JobUpdate, Stage, TranscriptionDetail};
use crate::outcome::Outcome;
use crate::pipeline::extract::list_frames;
use crate::pipeline::notes::synthesize_notes;
use crate::pipeline::{
    FfmpegExtractor, FrameExtractor, LlmClient, LlmNotesSynthesizer, NotesSynthesizer,
    PathResolver, PdfiumAssembler, SlideAssembler, SlideClassifier, SlideSelector, TesseractOcr,
    TextRecognizer, Transcriber, VisualClassifier, VlmZeroShotClassifier, WhisperTranscriber,
};
use crate::store::JobStore;
use crate::submit::{HttpVideoFetcher, VideoFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The external systems a run talks to, as shareable trait objects.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn JobStore>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub vision: Arc<dyn VisualClassifier>,
    pub ocr: Arc<dyn TextRecognizer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub notes: Arc<dyn NotesSynthesizer>,
    pub assembler: Arc<dyn SlideAssembler>,
    pub fetcher: Arc<dyn VideoFetcher>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Collaborators {
    /// The production set: ffmpeg, tesseract, a VLM zero-shot classifier,
    /// Whisper over HTTP, LLM notes, pdfium and an HTTP fetcher.
    ///
    /// The vision classifier and the notes synthesizer share one
    /// [`LlmClient`], so the provider is created at most once.
    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<dyn JobStore>,
    ) -> Result<Self, Video2DeckError> {
        let llm = Arc::new(LlmClient::from_config(config));
        Ok(Self {
            store,
            extractor: Arc::new(FfmpegExtractor::from_config(config)),
            vision: Arc::new(VlmZeroShotClassifier::new(Arc::clone(&llm))),
            ocr: Arc::new(TesseractOcr::from_config(config)),
            transcriber: Arc::new(WhisperTranscriber::from_config(config)?),
            notes: Arc::new(LlmNotesSynthesizer::new(llm, config)),
            assembler: Arc::new(PdfiumAssembler::from_config(config)),
            fetcher: Arc::new(HttpVideoFetcher::from_config(config)),
        })
    }
}

/// Runs jobs through the pipeline. One instance per process, shared by `Arc`.
pub struct Orchestrator {
    config: PipelineConfig,
    collab: Collaborators,
    selector: SlideSelector,
    resolver: PathResolver,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, collab: Collaborators) -> Self {
        let classifier = SlideClassifier::new(
            Arc::clone(&collab.vision),
            Arc::clone(&collab.ocr),
            config.scoring.clone(),
        );
        let selector = SlideSelector::new(classifier, config.classify_concurrency);
        let resolver = PathResolver::from_config(&config);
        Self {
            config,
            collab,
            selector,
            resolver,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.collab.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Run job `id` to completion.
    ///
    /// Returns the final record, which is `done` or `failed`. A job that is
    /// already terminal is returned untouched. `Err` means the job could not
    /// be found, or its failure could not be persisted.
    pub async fn run_job(&self, id: &str) -> Result<Job, Video2DeckError> {
        let job = self
            .collab
            .store
            .find(id)
            .await?
            .ok_or_else(|| Video2DeckError::JobNotFound { id: id.to_string() })?;

        if job.status.is_terminal() {
            warn!("Job {} is already {}, not re-running", id, job.status);
            return Ok(job);
        }

        let start = Instant::now();
        match self.run_stages(job).await {
            Ok(job) => {
                info!("Job {} done in {}ms", id, start.elapsed().as_millis());
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_job_done(id);
                }
                Ok(job)
            }
            Err(e) => self.fail_job(id, &e.to_string()).await,
        }
    }

    /// Mark `id` as failed with `message`.
    pub async fn fail_job(&self, id: &str, message: &str) -> Result<Job, Video2DeckError> {
        error!("Job {} failed: {}", id, message);
        let job = self
            .collab
            .store
            .update(id, JobUpdate::failed(message))
            .await?;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_failed(id, message);
        }
        Ok(job)
    }

    async fn run_stages(&self, job: Job) -> Result<Job, Video2DeckError> {
        let id = job.id.as_str();

        self.collab.store.update(id, JobUpdate::started()).await?;
        info!("Job {} processing", id);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_job_start(id);
        }

        // ── Path ─────────────────────────────────────────────────────────
        let stored = job
            .source
            .as_deref()
            .ok_or_else(|| Video2DeckError::SourceMissing { id: id.to_string() })?;
        let video = self.resolver.resolve(stored).await?;
        self.checkpoint(id, Stage::PathResolved, JobUpdate::path_resolved())
            .await?;

        // ── Frames (fatal) ───────────────────────────────────────────────
        let frames_dir = self.collab.extractor.extract(&video, id).await?;
        let frames = list_frames(&frames_dir).await?;
        if frames.is_empty() {
            return Err(Video2DeckError::NoFrames { dir: frames_dir });
        }
        self.checkpoint(id, Stage::FramesExtracted, JobUpdate::frames_extracted())
            .await?;

        // ── Slides ───────────────────────────────────────────────────────
        let slides = self.select_slides(&frames).await;
        self.note_degraded(id, Stage::SlidesSelected, &slides);
        let slides = slides.into_value();
        let public: Vec<String> = slides
            .iter()
            .map(|p| self.resolver.public_path(p))
            .collect();
        self.checkpoint(id, Stage::SlidesSelected, JobUpdate::slides_selected(public))
            .await?;

        // ── Transcript ───────────────────────────────────────────────────
        let transcript = Outcome::from_result(
            self.collab.transcriber.transcribe(&video).await,
            TranscriptionDetail::default(),
        );
        self.note_degraded(id, Stage::Transcribed, &transcript);
        let transcript = transcript.into_value();
        let text = transcript.text.clone();
        self.checkpoint(id, Stage::Transcribed, JobUpdate::transcribed(transcript))
            .await?;

        // ── Notes ────────────────────────────────────────────────────────
        let notes = synthesize_notes(
            self.collab.notes.as_ref(),
            &text,
            self.config.transcript_char_limit,
        )
        .await;
        self.note_degraded(id, Stage::NotesSynthesized, &notes);
        self.checkpoint(
            id,
            Stage::NotesSynthesized,
            JobUpdate::notes_synthesized(notes.into_value()),
        )
        .await?;

        // ── PDF ──────────────────────────────────────────────────────────
        let pdf = match self.collab.assembler.build(&slides, id).await {
            Ok(path) => Outcome::Ok(Some(path)),
            Err(e) => Outcome::degraded(None, e.to_string()),
        };
        self.note_degraded(id, Stage::PdfAssembled, &pdf);
        self.checkpoint(
            id,
            Stage::PdfAssembled,
            JobUpdate::slides_assembled(pdf.into_value()),
        )
        .await?;

        self.checkpoint(id, Stage::Done, JobUpdate::done()).await
    }

    /// Run the selector on its own task so a panic inside it is contained.
    ///
    /// A panic, or a selection that came back empty, degrades to the first
    /// extracted frame.
    async fn select_slides(&self, frames: &[PathBuf]) -> Outcome<Vec<PathBuf>> {
        let selector = self.selector.clone();
        let owned = frames.to_vec();
        let opts = self.config.selection;
        let handle = tokio::spawn(async move { selector.select(&owned, opts).await });

        let first_frame = || frames.iter().take(1).cloned().collect::<Vec<_>>();
        match handle.await {
            Ok(selection) if !selection.slides.is_empty() => {
                if selection.fallback_used {
                    debug!("Selector fell back to its best-scoring frame");
                }
                Outcome::Ok(selection.slides)
            }
            Ok(_) => Outcome::degraded(first_frame(), "selection returned no slides"),
            Err(e) => Outcome::degraded(first_frame(), format!("selection task failed: {e}")),
        }
    }

    /// Persist `update` and report `stage` to the progress callback.
    async fn checkpoint(
        &self,
        id: &str,
        stage: Stage,
        update: JobUpdate,
    ) -> Result<Job, Video2DeckError> {
        let job = self.collab.store.update(id, update).await?;
        info!("Job {}: {} ({}%)", id, stage.label(), job.progress);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(id, stage, job.progress);
        }
        Ok(job)
    }

    fn note_degraded<T>(&self, id: &str, stage: Stage, outcome: &Outcome<T>) {
        if let Some(reason) = outcome.reason() {
            warn!("Job {}: {} degraded: {}", id, stage.label(), reason);
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_stage_degraded(id, stage, reason);
            }
        }
    }
}
