//! Pipeline stages for video-to-deck processing.
//!
//! Each submodule implements one step. External systems sit behind
//! `async_trait` traits so the orchestrator can be driven by stubs.
//!
//! ## Data Flow
//!
//! ```text
//! resolve ──▶ extract ──▶ select ──────────────▶ assemble
//! (path)      (ffmpeg)    (classify + hash)      (pdfium)
//!    │                      ├─ vision (VLM)
//!    │                      └─ ocr (tesseract)
//!    └──────▶ transcribe ──▶ notes
//!             (Whisper)      (LLM + postprocess)
//! ```
//!
//! 1. [`resolve`]    — stored source reference → existing absolute path
//! 2. [`extract`]    — sample frames with ffmpeg
//! 3. [`classify`]   — fuse zero-shot labels and OCR length into keep/reject
//! 4. [`select`]     — rank kept frames and drop perceptual near-duplicates
//! 5. [`transcribe`] — audio → text with word and segment timings
//! 6. [`notes`]      — transcript → Markdown study notes
//! 7. [`assemble`]   — selected frames → landscape PDF
//!
//! Support modules: [`hash`] (aHash), [`llm`] (shared provider + retries),
//! [`encode`] (frame → base64 PNG), [`process`] (tool invocation),
//! [`postprocess`] (LLM output cleanup).

pub mod assemble;
pub mod classify;
pub mod encode;
pub mod extract;
pub mod hash;
pub mod llm;
pub mod notes;
pub mod ocr;
pub mod postprocess;
pub mod process;
pub mod resolve;
pub mod select;
pub mod transcribe;
pub mod vision;

pub use assemble::{PdfiumAssembler, SlideAssembler};
pub use classify::{Classification, Reason, SlideClassifier};
pub use extract::{FfmpegExtractor, FrameExtractor};
pub use hash::ImageHash;
pub use llm::LlmClient;
pub use notes::{LlmNotesSynthesizer, NotesSynthesizer};
pub use ocr::{TesseractOcr, TextRecognizer};
pub use resolve::PathResolver;
pub use select::{Selection, SlideSelector};
pub use transcribe::{Transcriber, WhisperTranscriber};
pub use vision::{LabelScore, VisualClassifier, VlmZeroShotClassifier};
