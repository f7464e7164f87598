//! Integration tests for the job pipeline, driven entirely by stub collaborators.
//!
//! No test here needs ffmpeg, tesseract, pdfium or network access: frames
//! are synthetic block-pattern PNGs whose perceptual hashes are known
//! exactly, and every external system is a trait object.

use async_trait::async_trait;
use edgequake_video2deck::pipeline::hash::hash_file;
use edgequake_video2deck::pipeline::{
    FrameExtractor, LabelScore, NotesSynthesizer, Reason, SlideAssembler, SlideClassifier,
    SlideSelector, TextRecognizer, Transcriber, VisualClassifier,
};
use edgequake_video2deck::prompts::NOTES_FAILED_PLACEHOLDER;
use edgequake_video2deck::{
    Collaborators, Job, JobProgressCallback, JobQueue, JobStatus, JobStore, JobUpdate,
    MemoryJobStore, Orchestrator, PipelineConfig, ScoringPolicy, SelectionOptions, Stage,
    Submitter, TranscriptionDetail, Video2DeckError, VideoFetcher,
};
use image::{DynamicImage, GrayImage, Luma};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Frame patterns ───────────────────────────────────────────────────────────

/// Pairwise 32 bits apart.
const A: u64 = 0xFFFF_FFFF_0000_0000;
const B: u64 = 0x00FF_00FF_00FF_00FF;
const C: u64 = 0xF0F0_F0F0_F0F0_F0F0;

/// A 160×160 PNG whose 8×8 cells are white where `bits` has a 1, so its
/// average hash is exactly `bits`.
fn pattern_png(path: &Path, bits: u64) {
    let img = GrayImage::from_fn(160, 160, |x, y| {
        let idx = (y / 20) * 8 + (x / 20);
        if bits & (1u64 << (63 - idx)) != 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    DynamicImage::ImageLuma8(img).save(path).unwrap();
}

fn write_frames(dir: &Path, patterns: &[u64]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    patterns
        .iter()
        .enumerate()
        .map(|(i, bits)| {
            let p = dir.join(format!("frame-{:04}.png", i + 1));
            pattern_png(&p, *bits);
            p
        })
        .collect()
}

// ── Stub collaborators ───────────────────────────────────────────────────────

/// Wraps a [`MemoryJobStore`] and logs every persisted `(id, progress, status)`.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryJobStore,
    log: Mutex<Vec<(String, u8, JobStatus)>>,
}

impl RecordingStore {
    fn progress_of(&self, id: &str) -> Vec<u8> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _, _)| i == id)
            .map(|(_, p, _)| *p)
            .collect()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn create(&self, job: Job) -> Result<Job, Video2DeckError> {
        self.inner.create(job).await
    }

    async fn find(&self, id: &str) -> Result<Option<Job>, Video2DeckError> {
        self.inner.find(id).await
    }

    async fn update(&self, id: &str, update: JobUpdate) -> Result<Job, Video2DeckError> {
        let job = self.inner.update(id, update).await?;
        self.log
            .lock()
            .unwrap()
            .push((job.id.clone(), job.progress, job.status));
        Ok(job)
    }
}

struct StubExtractor {
    root: PathBuf,
    patterns: Vec<u64>,
    fail: bool,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[async_trait]
impl FrameExtractor for StubExtractor {
    async fn extract(&self, _video: &Path, job_id: &str) -> Result<PathBuf, Video2DeckError> {
        self.calls.lock().unwrap().push(job_id.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(Video2DeckError::ExtractionFailed {
                detail: "ffmpeg exited with status 1".into(),
            });
        }
        let dir = self.root.join(job_id);
        write_frames(&dir, &self.patterns);
        Ok(dir)
    }
}

/// Every frame gets the same label and score.
struct FixedVision(&'static str, f32);

#[async_trait]
impl VisualClassifier for FixedVision {
    async fn classify(
        &self,
        _image: &Path,
        _labels: &[String],
    ) -> Result<Vec<LabelScore>, Video2DeckError> {
        Ok(vec![LabelScore::new(self.0, self.1)])
    }
}

/// Per-file "presentation slide" scores, keyed by file name.
struct ByNameVision(HashMap<String, f32>);

#[async_trait]
impl VisualClassifier for ByNameVision {
    async fn classify(
        &self,
        image: &Path,
        _labels: &[String],
    ) -> Result<Vec<LabelScore>, Video2DeckError> {
        let name = image.file_name().unwrap().to_string_lossy().to_string();
        let score = self.0.get(&name).copied().unwrap_or(0.0);
        Ok(vec![LabelScore::new("presentation slide", score)])
    }
}

struct PanickingVision;

/// Panics on one file name; every other frame is a "presentation slide" at 0.5.
struct PanicsOnVision(&'static str);

#[async_trait]
impl VisualClassifier for PanicsOnVision {
    async fn classify(
        &self,
        image: &Path,
        _labels: &[String],
    ) -> Result<Vec<LabelScore>, Video2DeckError> {
        if image.file_name().is_some_and(|n| n == self.0) {
            panic!("vision model crashed on {}", self.0);
        }
        Ok(vec![LabelScore::new("presentation slide", 0.5)])
    }
}

#[async_trait]
impl VisualClassifier for PanickingVision {
    async fn classify(
        &self,
        _image: &Path,
        _labels: &[String],
    ) -> Result<Vec<LabelScore>, Video2DeckError> {
        panic!("vision model crashed");
    }
}

struct StubOcr {
    text: String,
    calls: AtomicUsize,
}

impl StubOcr {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextRecognizer for StubOcr {
    async fn recognize(&self, _image: &Path) -> Result<String, Video2DeckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

struct StubTranscriber(Option<&'static str>);

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _video: &Path) -> Result<TranscriptionDetail, Video2DeckError> {
        match self.0 {
            Some(text) => Ok(TranscriptionDetail {
                text: text.to_string(),
                ..Default::default()
            }),
            None => Err(Video2DeckError::collaborator("transcription", "HTTP 503")),
        }
    }
}

struct StubNotes(bool);

#[async_trait]
impl NotesSynthesizer for StubNotes {
    async fn complete(&self, _prompt: &str) -> Result<String, Video2DeckError> {
        if self.0 {
            Ok("## Key Points\n- TCP is reliable\n".to_string())
        } else {
            Err(Video2DeckError::collaborator("notes synthesis", "rate limited"))
        }
    }
}

#[derive(Default)]
struct StubAssembler {
    fail: bool,
    received: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl SlideAssembler for StubAssembler {
    async fn build(&self, frames: &[PathBuf], job_id: &str) -> Result<String, Video2DeckError> {
        *self.received.lock().unwrap() = frames.to_vec();
        if self.fail {
            return Err(Video2DeckError::PdfiumBindingFailed("libpdfium.so not found".into()));
        }
        Ok(format!("/slides/{job_id}/{job_id}-slides.pdf"))
    }
}

struct StubFetcher {
    dir: PathBuf,
    fail: bool,
}

#[async_trait]
impl VideoFetcher for StubFetcher {
    async fn fetch(&self, url: &str, job_id: &str) -> Result<PathBuf, Video2DeckError> {
        if self.fail {
            return Err(Video2DeckError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".into(),
            });
        }
        let path = self.dir.join(format!("{job_id}.mp4"));
        tokio::fs::write(&path, b"fake video").await.unwrap();
        Ok(path)
    }
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl JobProgressCallback for EventLog {
    fn on_job_start(&self, _job_id: &str) {
        self.0.lock().unwrap().push("start".into());
    }
    fn on_stage_complete(&self, _job_id: &str, stage: Stage, progress: u8) {
        self.0
            .lock()
            .unwrap()
            .push(format!("{} {progress}", stage.label()));
    }
    fn on_stage_degraded(&self, _job_id: &str, stage: Stage, _reason: &str) {
        self.0
            .lock()
            .unwrap()
            .push(format!("degraded {}", stage.label()));
    }
    fn on_job_done(&self, _job_id: &str) {
        self.0.lock().unwrap().push("done".into());
    }
    fn on_job_failed(&self, _job_id: &str, _error: &str) {
        self.0.lock().unwrap().push("failed".into());
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Setup {
    patterns: Vec<u64>,
    vision: Arc<dyn VisualClassifier>,
    extract_fails: bool,
    extract_delay: Duration,
    transcript: Option<&'static str>,
    notes_ok: bool,
    assemble_fails: bool,
    fetch_fails: bool,
    events: Option<Arc<EventLog>>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            patterns: vec![A, A ^ 0b11, B, B ^ 0x0300_0000_0000_0000, C],
            vision: Arc::new(FixedVision("presentation slide", 0.5)),
            extract_fails: false,
            extract_delay: Duration::ZERO,
            transcript: Some("Today we cover TCP and UDP."),
            notes_ok: true,
            assemble_fails: false,
            fetch_fails: false,
            events: None,
        }
    }
}

struct Harness {
    dir: TempDir,
    store: Arc<RecordingStore>,
    extractor: Arc<StubExtractor>,
    assembler: Arc<StubAssembler>,
    orchestrator: Arc<Orchestrator>,
}

impl Harness {
    fn new(setup: Setup) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = PipelineConfig::builder()
            .upload_root(dir.path())
            .project_root(dir.path())
            .dedup_distance(5);
        if let Some(events) = setup.events.clone() {
            builder = builder.progress_callback(events as Arc<dyn JobProgressCallback>);
        }
        let config = builder.build().unwrap();

        let store = Arc::new(RecordingStore::default());
        let extractor = Arc::new(StubExtractor {
            root: dir.path().join("frames"),
            patterns: setup.patterns,
            fail: setup.extract_fails,
            delay: setup.extract_delay,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        });
        let assembler = Arc::new(StubAssembler {
            fail: setup.assemble_fails,
            ..Default::default()
        });
        let collab = Collaborators {
            store: store.clone(),
            extractor: extractor.clone(),
            vision: setup.vision,
            ocr: StubOcr::new(&"x".repeat(60)),
            transcriber: Arc::new(StubTranscriber(setup.transcript)),
            notes: Arc::new(StubNotes(setup.notes_ok)),
            assembler: assembler.clone(),
            fetcher: Arc::new(StubFetcher {
                dir: dir.path().to_path_buf(),
                fail: setup.fetch_fails,
            }),
        };
        let orchestrator = Arc::new(Orchestrator::new(config, collab));
        Self {
            dir,
            store,
            extractor,
            assembler,
            orchestrator,
        }
    }

    fn video(&self) -> PathBuf {
        let path = self.dir.path().join("lecture.mp4");
        if !path.exists() {
            std::fs::write(&path, b"fake video").unwrap();
        }
        path
    }

    async fn queued_job(&self) -> Job {
        let source = self.video().to_string_lossy().into_owned();
        self.store
            .create(Job::new(JobStatus::Queued, Some(source)))
            .await
            .unwrap()
    }

    async fn run(&self) -> Job {
        let job = self.queued_job().await;
        self.orchestrator.run_job(&job.id).await.unwrap()
    }

    fn submitter(&self, queue: &Arc<JobQueue>) -> Submitter {
        let collab = self.orchestrator.collaborators();
        Submitter::new(collab.store.clone(), queue.clone(), collab.fetcher.clone())
    }
}

async fn wait_terminal(store: &dyn JobStore, id: &str) -> Job {
    for _ in 0..200 {
        let job = store.find(id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {id} never reached a terminal state");
}

fn classifier(vision: Arc<dyn VisualClassifier>, ocr: Arc<StubOcr>) -> SlideClassifier {
    SlideClassifier::new(vision, ocr, ScoringPolicy::default())
}

// ── Classifier ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn classifier_is_deterministic_on_fixed_collaborators() {
    let dir = tempfile::tempdir().unwrap();
    let frame = write_frames(dir.path(), &[A]).remove(0);
    let ocr = StubOcr::new(&"a".repeat(60));
    let c = classifier(Arc::new(FixedVision("presentation slide", 0.5)), ocr);

    let first = c.classify(&frame).await;
    let second = c.classify(&frame).await;

    assert!((first.score - 0.85).abs() < 1e-5, "score {}", first.score);
    assert!(first.keep);
    assert_eq!(first.reason, Reason::Composite);
    assert_eq!(first, second);
}

#[tokio::test]
async fn confident_negative_label_never_calls_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let frame = write_frames(dir.path(), &[A]).remove(0);
    let ocr = StubOcr::new("plenty of slide text here, more than enough to matter");
    let c = classifier(Arc::new(FixedVision("human face", 0.9)), ocr.clone());

    let verdict = c.classify(&frame).await;

    assert!(!verdict.keep);
    assert_eq!(verdict.reason, Reason::ClipReject);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
}

// ── Selector ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn all_rejected_falls_back_to_best_raw_score() {
    let dir = tempfile::tempdir().unwrap();
    let frames = write_frames(dir.path(), &[A, B, C, A ^ 0xFF, B ^ 0xFF]);
    let scores: HashMap<String, f32> = [0.05, 0.2, 0.1, 0.15, 0.02]
        .iter()
        .enumerate()
        .map(|(i, s)| (format!("frame-{:04}.png", i + 1), *s))
        .collect();
    // No OCR text: every fused score is the raw score, all under 0.28.
    let selector = SlideSelector::new(
        classifier(Arc::new(ByNameVision(scores)), StubOcr::new("")),
        4,
    );

    let selection = selector.select(&frames, SelectionOptions::default()).await;

    assert!(selection.fallback_used);
    assert!(selection.classifications.iter().all(|c| !c.keep));
    assert_eq!(selection.slides, vec![frames[1].clone()]);
}

#[tokio::test]
async fn selected_slides_are_pairwise_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = [
        A,
        A ^ 0b1,
        A ^ 0xFF,
        B,
        B ^ 0b111,
        C,
        C ^ 0xF0,
        C ^ 0x0F00_0000,
        0x0F0F_0F0F_0F0F_0F0F,
    ];
    let frames = write_frames(dir.path(), &patterns);
    let selector = SlideSelector::new(
        classifier(
            Arc::new(FixedVision("presentation slide", 0.5)),
            StubOcr::new(&"t".repeat(60)),
        ),
        3,
    );

    for dedup_distance in [0, 3, 5, 8, 16] {
        let opts = SelectionOptions {
            dedup_distance,
            max_keep: 30,
        };
        let selection = selector.select(&frames, opts).await;
        let hashes: Vec<_> = selection
            .slides
            .iter()
            .map(|p| hash_file(p, 10).into_value())
            .collect();
        assert!(!hashes.is_empty());
        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert!(
                    a.distance(*b) > dedup_distance,
                    "distance {} ≤ {}",
                    a.distance(*b),
                    dedup_distance
                );
            }
        }
    }
}

#[tokio::test]
async fn max_keep_caps_the_selection() {
    let dir = tempfile::tempdir().unwrap();
    let frames = write_frames(dir.path(), &[A, B, C]);
    let selector = SlideSelector::new(
        classifier(
            Arc::new(FixedVision("presentation slide", 0.5)),
            StubOcr::new(&"t".repeat(60)),
        ),
        4,
    );
    let opts = SelectionOptions {
        dedup_distance: 5,
        max_keep: 2,
    };
    let selection = selector.select(&frames, opts).await;
    assert_eq!(selection.slides, frames[..2].to_vec());
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_distinct_slides_survive_two_near_duplicates() {
    let h = Harness::new(Setup::default());
    let job = h.run().await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.selected_frames.len(), 3);
    assert_eq!(h.assembler.received.lock().unwrap().len(), 3);
    let expected: Vec<String> = ["frame-0001.png", "frame-0003.png", "frame-0005.png"]
        .iter()
        .map(|f| format!("/frames/{}/{}", job.id, f))
        .collect();
    assert_eq!(job.selected_frames, expected);
}

#[tokio::test]
async fn successful_run_progress_is_monotonic_and_ends_at_100() {
    let h = Harness::new(Setup::default());
    let job = h.run().await;

    let progress = h.store.progress_of(&job.id);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(job.progress, 100);
    assert_eq!(job.transcript, "Today we cover TCP and UDP.");
    assert!(job.final_notes.starts_with("## Key Points"));
    assert_eq!(
        job.slides_pdf,
        Some(format!("/slides/{0}/{0}-slides.pdf", job.id))
    );
    assert!(job.error.is_none());
}

#[tokio::test]
async fn transcription_failure_degrades_to_empty_transcript() {
    let events = Arc::new(EventLog::default());
    let h = Harness::new(Setup {
        transcript: None,
        events: Some(events.clone()),
        ..Default::default()
    });
    let job = h.run().await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.transcript, "");
    assert!(!job.final_notes.is_empty());
    assert!(job.slides_pdf.is_some());

    let events = events.0.lock().unwrap();
    assert_eq!(events.first().map(String::as_str), Some("start"));
    assert!(events.contains(&"degraded transcript obtained".to_string()));
    assert_eq!(events.last().map(String::as_str), Some("done"));
}

#[tokio::test]
async fn notes_and_pdf_failures_still_finish_the_job() {
    let h = Harness::new(Setup {
        notes_ok: false,
        assemble_fails: true,
        ..Default::default()
    });
    let job = h.run().await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.final_notes, NOTES_FAILED_PLACEHOLDER);
    assert!(job.slides_pdf.is_none());
    assert_eq!(job.selected_frames.len(), 3);
    assert_eq!(job.progress, 100);
}

#[tokio::test]
async fn vision_panicking_on_every_frame_keeps_the_first_frame() {
    let h = Harness::new(Setup {
        vision: Arc::new(PanickingVision),
        ..Default::default()
    });
    let job = h.run().await;

    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(
        job.selected_frames,
        vec![format!("/frames/{}/frame-0001.png", job.id)]
    );
}

#[tokio::test]
async fn one_panicking_frame_does_not_cost_the_others() {
    let h = Harness::new(Setup {
        vision: Arc::new(PanicsOnVision("frame-0001.png")),
        ..Default::default()
    });
    let job = h.run().await;

    assert_eq!(job.status, JobStatus::Done);
    let expected: Vec<String> = ["frame-0002.png", "frame-0003.png", "frame-0005.png"]
        .iter()
        .map(|f| format!("/frames/{}/{}", job.id, f))
        .collect();
    assert_eq!(job.selected_frames, expected);
}

#[tokio::test]
async fn extraction_failure_fails_the_job() {
    let events = Arc::new(EventLog::default());
    let h = Harness::new(Setup {
        extract_fails: true,
        events: Some(events.clone()),
        ..Default::default()
    });
    let job = h.run().await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.as_deref().unwrap_or_default();
    assert!(error.contains("ffmpeg exited"), "error: {error}");
    assert_eq!(job.progress, 5);
    assert_eq!(events.0.lock().unwrap().last().map(String::as_str), Some("failed"));
}

#[tokio::test]
async fn missing_source_file_fails_the_job() {
    let h = Harness::new(Setup::default());
    let job = h
        .store
        .create(Job::new(JobStatus::Queued, Some("uploads/gone.mp4".into())))
        .await
        .unwrap();

    let job = h.orchestrator.run_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("Video file not found"));
    assert!(h.extractor.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let h = Harness::new(Setup::default());
    let err = h.orchestrator.run_job("no-such-job").await.unwrap_err();
    assert!(matches!(err, Video2DeckError::JobNotFound { .. }));
}

#[tokio::test]
async fn terminal_jobs_are_not_rerun() {
    let h = Harness::new(Setup::default());
    let first = h.run().await;

    let again = h.orchestrator.run_job(&first.id).await.unwrap();

    assert_eq!(again, first);
    assert_eq!(h.extractor.calls.lock().unwrap().len(), 1);
}

// ── Dispatcher and submission ────────────────────────────────────────────────

#[tokio::test]
async fn queue_runs_jobs_one_at_a_time_in_fifo_order() {
    let h = Harness::new(Setup {
        extract_delay: Duration::from_millis(30),
        ..Default::default()
    });
    let queue = JobQueue::start(h.orchestrator.clone());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let job = h.queued_job().await;
        queue.enqueue(job.id.clone()).unwrap();
        ids.push(job.id);
    }
    queue.shutdown().await;

    assert_eq!(*h.extractor.calls.lock().unwrap(), ids);
    assert_eq!(h.extractor.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(queue.pending(), 0);
    assert!(!queue.is_busy());
    for id in &ids {
        let job = h.store.find(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
    }
    assert!(queue.enqueue("late").is_err());
}

#[tokio::test]
async fn file_submission_stores_absolute_slash_path() {
    let h = Harness::new(Setup::default());
    let queue = JobQueue::start(h.orchestrator.clone());
    let submitter = h.submitter(&queue);

    let job = submitter.submit(&h.video().to_string_lossy()).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    let source = job.source.clone().unwrap();
    assert!(Path::new(&source).is_absolute());
    assert!(!source.contains('\\'));

    let done = wait_terminal(h.store.as_ref(), &job.id).await;
    assert_eq!(done.status, JobStatus::Done);

    let missing = submitter.submit_file(h.dir.path().join("nope.mp4")).await;
    assert!(matches!(missing, Err(Video2DeckError::SourceNotFound { .. })));
    queue.shutdown().await;
}

#[tokio::test]
async fn url_submission_downloads_then_queues() {
    let h = Harness::new(Setup::default());
    let queue = JobQueue::start(h.orchestrator.clone());
    let submitter = h.submitter(&queue);

    let job = submitter
        .submit("https://videos.example.test/lecture.mp4")
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Downloading);
    assert!(job.source.is_none());

    let done = wait_terminal(h.store.as_ref(), &job.id).await;
    assert_eq!(done.status, JobStatus::Done);
    let source = done.source.unwrap();
    assert!(Path::new(&source).is_absolute());
    assert!(source.ends_with(&format!("{}.mp4", job.id)));
    assert_eq!(done.selected_frames.len(), 3);
    queue.shutdown().await;
}

#[tokio::test]
async fn failed_download_marks_job_failed() {
    let h = Harness::new(Setup {
        fetch_fails: true,
        ..Default::default()
    });
    let queue = JobQueue::start(h.orchestrator.clone());
    let submitter = h.submitter(&queue);

    let job = submitter
        .submit_url("https://videos.example.test/missing.mp4")
        .await
        .unwrap();
    let failed = wait_terminal(h.store.as_ref(), &job.id).await;

    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("404"));
    assert!(h.extractor.calls.lock().unwrap().is_empty());
    queue.shutdown().await;
}

#[tokio::test]
async fn non_http_url_is_rejected() {
    let h = Harness::new(Setup::default());
    let queue = JobQueue::start(h.orchestrator.clone());
    let err = h
        .submitter(&queue)
        .submit_url("ftp://videos.example.test/a.mp4")
        .await
        .unwrap_err();
    assert!(matches!(err, Video2DeckError::InvalidInput { .. }));
    queue.shutdown().await;
}
