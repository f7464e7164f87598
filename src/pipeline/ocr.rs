//! Text recognition on frames.
//!
//! The slide classifier only needs a character count, so the contract is a
//! plain "image in, text out". [`TesseractOcr`] runs the `tesseract` CLI and
//! reads the recognised text from stdout.
//!
//! Before spawning anything the file is checked: a missing frame or one
//! below `min_file_bytes` (a truncated JPEG from an interrupted extraction)
//! is reported as an error without invoking the engine. Callers treat any
//! OCR error as "no text".

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::pipeline::process::run_tool;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image-to-text recognition.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, Video2DeckError>;
}

/// `tesseract <image> stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    bin: PathBuf,
    language: String,
    min_file_bytes: u64,
    timeout_secs: u64,
}

impl TesseractOcr {
    pub fn new(bin: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            language: language.into(),
            min_file_bytes: 1000,
            timeout_secs: 120,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            bin: config.tesseract_bin.clone(),
            language: config.ocr_language.clone(),
            min_file_bytes: config.ocr_min_file_bytes,
            timeout_secs: config.api_timeout_secs,
        }
    }

    pub fn with_min_file_bytes(mut self, bytes: u64) -> Self {
        self.min_file_bytes = bytes;
        self
    }

    /// Refuse frames that are missing or too small to be a real image.
    async fn check_frame(&self, image: &Path) -> Result<(), Video2DeckError> {
        let meta = tokio::fs::metadata(image).await.map_err(|e| {
            Video2DeckError::collaborator("ocr", format!("{}: {}", image.display(), e))
        })?;
        if meta.len() < self.min_file_bytes {
            return Err(Video2DeckError::collaborator(
                "ocr",
                format!(
                    "{}: {} bytes is below the {} byte minimum, skipping",
                    image.display(),
                    meta.len(),
                    self.min_file_bytes
                ),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TextRecognizer for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String, Video2DeckError> {
        self.check_frame(image).await?;

        let args = [
            image.as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(&self.language),
        ];
        let output = run_tool(&self.bin, args, Some(self.timeout_secs))
            .await
            .map_err(|e| Video2DeckError::collaborator("ocr", e))?;

        let text = output.stdout.trim().to_string();
        debug!("{}: OCR read {} chars", image.display(), text.chars().count());
        Ok(text)
    }
}
