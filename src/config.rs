//! Configuration types for the video-to-deck job pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The slide-scoring thresholds live in
//! [`ScoringPolicy`] and the selection limits in [`SelectionOptions`]; both
//! are plain serialisable data so a run's exact tuning can be logged and
//! diffed against another run.
//!
//! The scoring thresholds were tuned empirically. Treat them as knobs, not
//! as meaningful constants: the reject threshold (0.30) sitting just above
//! the keep threshold (0.28) carries no intent.

use crate::error::Video2DeckError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Labels that indicate legible slide-like content.
pub const DEFAULT_POSITIVE_LABELS: &[&str] = &[
    "presentation slide",
    "powerpoint slide",
    "digital text document",
    "screen capture",
    "diagram and text",
    "whiteboard with writing",
    "handwritten lecture notes",
    "paper with handwriting",
    "text on paper",
];

/// Labels that indicate a speaker, occlusion, blur, or scenery.
pub const DEFAULT_NEGATIVE_LABELS: &[&str] = &[
    "person speaking",
    "human face",
    "blurry image",
    "motion blur",
    "transition effect",
    "out of focus",
    "audience",
    "wall",
    "natural scenery",
    "hand blocking text",
    "hand covering text",
    "arm obscuring view",
    "close up of hand",
    "person blocking screen",
    "person standing in front of whiteboard",
    "person obscuring presentation",
    "body blocking text",
    "teacher blocking board",
];

/// Thresholds and label sets for the slide classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Frames narrower or shorter than this are rejected as `too_small`. Default: 50.
    pub min_dimension: u32,

    /// Frames below this size hash to the all-zero sentinel. Default: 10.
    pub hash_min_dimension: u32,

    /// A NEGATIVE top label above this confidence rejects without OCR. Default: 0.30.
    pub negative_reject_threshold: f32,

    /// Fused score needed to keep a frame. Default: 0.28.
    pub keep_threshold: f32,

    /// Base score when the top label is NEGATIVE. Default: 0.1.
    pub negative_floor: f32,

    /// Subtracted from the fused score when the top label is NEGATIVE. Default: 0.1.
    pub negative_penalty: f32,

    /// `(min_chars, bonus)` pairs; every threshold the text length strictly
    /// exceeds adds its bonus. Default: `[(30, 0.15), (50, 0.2), (150, 0.3)]`.
    pub text_bonuses: Vec<(usize, f32)>,

    pub positive_labels: Vec<String>,
    pub negative_labels: Vec<String>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            min_dimension: 50,
            hash_min_dimension: 10,
            negative_reject_threshold: 0.30,
            keep_threshold: 0.28,
            negative_floor: 0.1,
            negative_penalty: 0.1,
            text_bonuses: vec![(30, 0.15), (50, 0.2), (150, 0.3)],
            positive_labels: DEFAULT_POSITIVE_LABELS.iter().map(|s| s.to_string()).collect(),
            negative_labels: DEFAULT_NEGATIVE_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ScoringPolicy {
    /// Positive labels followed by negative labels, as sent to the classifier.
    pub fn all_labels(&self) -> Vec<String> {
        self.positive_labels
            .iter()
            .chain(self.negative_labels.iter())
            .cloned()
            .collect()
    }

    pub fn is_positive(&self, label: &str) -> bool {
        self.positive_labels.iter().any(|l| l == label)
    }
}

/// Limits for the slide selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Candidates within this Hamming distance of an accepted slide are dropped.
    pub dedup_distance: u32,
    /// Upper bound on the number of selected slides.
    pub max_keep: usize,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            dedup_distance: 5,
            max_keep: 30,
        }
    }
}

/// Configuration for the job pipeline.
///
/// # Example
/// ```rust
/// use edgequake_video2deck::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .upload_root("/srv/video2deck")
///     .classify_concurrency(4)
///     .max_keep(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.selection.max_keep, 20);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Base directory for uploads and generated artefacts. Default: `./uploads`.
    pub upload_root: PathBuf,

    /// Extracted frames go to `<frames_root>/<job_id>/fps/`. Default: `<upload_root>/frames`.
    pub frames_root: PathBuf,

    /// PDFs go to `<slides_root>/<job_id>/<job_id>-slides.pdf`. Default: `<upload_root>/slides`.
    pub slides_root: PathBuf,

    /// Prefix stripped from filesystem paths to form public paths. Default: `<upload_root>`.
    pub public_root: PathBuf,

    /// Base against which relative stored references are resolved. Default: current dir.
    pub project_root: PathBuf,

    /// Dedup distance and slide cap used by the pipeline. Default: 8 / 30.
    pub selection: SelectionOptions,

    /// Concurrent frame classifications. Default: 4.
    pub classify_concurrency: usize,

    pub scoring: ScoringPolicy,

    /// Secondary dedup distance applied while laying out the PDF. Default: 10.
    pub pdf_dedup_distance: u32,

    /// Transcript characters passed to the notes prompt. Default: 8000.
    pub transcript_char_limit: usize,

    /// Seconds between extracted frames. Default: 2.0.
    pub frame_interval_secs: f32,

    /// Width extracted frames are scaled to. Default: 1280.
    pub frame_scale_width: u32,

    pub ffmpeg_bin: PathBuf,
    pub tesseract_bin: PathBuf,

    /// Tesseract language code. Default: "eng".
    pub ocr_language: String,

    /// Image files smaller than this are treated as corrupt and not OCR'd. Default: 1000.
    pub ocr_min_file_bytes: u64,

    /// LLM model identifier for notes, flashcards and vision classification.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for notes synthesis. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Whisper-compatible API base URL. Default: Groq's OpenAI-compatible endpoint.
    pub transcription_base_url: String,

    /// Default: "whisper-large-v3".
    pub transcription_model: String,

    /// API key for the transcription endpoint. Falls back to `GROQ_API_KEY`.
    pub transcription_api_key: Option<String>,

    /// Directory holding the pdfium shared library. `None` binds the system library.
    pub pdfium_dir: Option<PathBuf>,

    /// Download timeout for URL submissions in seconds. Default: 600.
    pub download_timeout_secs: u64,

    /// Per external call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Optional stage-event callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let upload_root = PathBuf::from("uploads");
        Self {
            frames_root: upload_root.join("frames"),
            slides_root: upload_root.join("slides"),
            public_root: upload_root.clone(),
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            upload_root,
            selection: SelectionOptions {
                dedup_distance: 8,
                max_keep: 30,
            },
            classify_concurrency: 4,
            scoring: ScoringPolicy::default(),
            pdf_dedup_distance: 10,
            transcript_char_limit: 8000,
            frame_interval_secs: 2.0,
            frame_scale_width: 1280,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            tesseract_bin: PathBuf::from("tesseract"),
            ocr_language: "eng".to_string(),
            ocr_min_file_bytes: 1000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            transcription_base_url: "https://api.groq.com/openai/v1".to_string(),
            transcription_model: "whisper-large-v3".to_string(),
            transcription_api_key: None,
            pdfium_dir: None,
            download_timeout_secs: 600,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("upload_root", &self.upload_root)
            .field("frames_root", &self.frames_root)
            .field("slides_root", &self.slides_root)
            .field("public_root", &self.public_root)
            .field("project_root", &self.project_root)
            .field("selection", &self.selection)
            .field("classify_concurrency", &self.classify_concurrency)
            .field("scoring", &self.scoring)
            .field("pdf_dedup_distance", &self.pdf_dedup_distance)
            .field("transcript_char_limit", &self.transcript_char_limit)
            .field("frame_interval_secs", &self.frame_interval_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("transcription_model", &self.transcription_model)
            .field(
                "transcription_api_key",
                &self.transcription_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the upload root and re-derive `frames_root`, `slides_root` and
    /// `public_root` beneath it. Call the specific setters afterwards to override.
    pub fn upload_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.config.frames_root = root.join("frames");
        self.config.slides_root = root.join("slides");
        self.config.public_root = root.clone();
        self.config.upload_root = root;
        self
    }

    pub fn frames_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.frames_root = dir.into();
        self
    }

    pub fn slides_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.slides_root = dir.into();
        self
    }

    pub fn public_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.public_root = dir.into();
        self
    }

    pub fn project_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.project_root = dir.into();
        self
    }

    pub fn dedup_distance(mut self, d: u32) -> Self {
        self.config.selection.dedup_distance = d.min(64);
        self
    }

    pub fn max_keep(mut self, n: usize) -> Self {
        self.config.selection.max_keep = n;
        self
    }

    pub fn classify_concurrency(mut self, n: usize) -> Self {
        self.config.classify_concurrency = n.max(1);
        self
    }

    pub fn scoring(mut self, policy: ScoringPolicy) -> Self {
        self.config.scoring = policy;
        self
    }

    pub fn pdf_dedup_distance(mut self, d: u32) -> Self {
        self.config.pdf_dedup_distance = d.min(64);
        self
    }

    pub fn transcript_char_limit(mut self, n: usize) -> Self {
        self.config.transcript_char_limit = n;
        self
    }

    pub fn frame_interval_secs(mut self, secs: f32) -> Self {
        self.config.frame_interval_secs = secs;
        self
    }

    pub fn frame_scale_width(mut self, px: u32) -> Self {
        self.config.frame_scale_width = px.max(64);
        self
    }

    pub fn ffmpeg_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_bin = bin.into();
        self
    }

    pub fn tesseract_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.config.tesseract_bin = bin.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn transcription_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.transcription_base_url = url.into();
        self
    }

    pub fn transcription_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription_model = model.into();
        self
    }

    pub fn transcription_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.transcription_api_key = Some(key.into());
        self
    }

    pub fn pdfium_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Video2DeckError> {
        let c = &self.config;
        if c.selection.max_keep == 0 {
            return Err(Video2DeckError::InvalidConfig(
                "max_keep must be ≥ 1".into(),
            ));
        }
        if c.classify_concurrency == 0 {
            return Err(Video2DeckError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if !(c.frame_interval_secs > 0.0) {
            return Err(Video2DeckError::InvalidConfig(format!(
                "frame interval must be positive, got {}",
                c.frame_interval_secs
            )));
        }
        if c.scoring.positive_labels.is_empty() {
            return Err(Video2DeckError::InvalidConfig(
                "at least one positive label is required".into(),
            ));
        }
        if c.scoring.min_dimension < c.scoring.hash_min_dimension {
            return Err(Video2DeckError::InvalidConfig(format!(
                "min_dimension ({}) must be ≥ hash_min_dimension ({})",
                c.scoring.min_dimension, c.scoring.hash_min_dimension
            )));
        }
        Ok(self.config)
    }
}
