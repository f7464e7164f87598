//! Speech transcription through a Whisper-compatible HTTP API.
//!
//! The audio track is first pulled out of the video with ffmpeg as a small
//! mono MP3 (64 kbit/s, 16 kHz), which keeps uploads well under the API's
//! size limit for lecture-length videos. The MP3 is then posted as a
//! multipart form to `<base_url>/audio/transcriptions` asking for
//! `verbose_json` with word-level timestamps.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::job::TranscriptionDetail;
use crate::pipeline::process::run_tool;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const STAGE: &str = "transcription";

/// Audio transcription of a video file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, video: &Path) -> Result<TranscriptionDetail, Video2DeckError>;
}

/// ffmpeg audio extraction + Whisper-compatible `/audio/transcriptions`.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    ffmpeg_bin: PathBuf,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl WhisperTranscriber {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Video2DeckError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| Video2DeckError::collaborator(STAGE, e))?;
        let api_key = config
            .transcription_api_key
            .clone()
            .or_else(|| std::env::var("GROQ_API_KEY").ok())
            .filter(|k| !k.is_empty());
        Ok(Self {
            client,
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            base_url: config.transcription_base_url.trim_end_matches('/').to_string(),
            model: config.transcription_model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }

    /// Extract the audio track next to the video as `<stem>_audio.mp3`.
    async fn extract_audio(&self, video: &Path) -> Result<PathBuf, Video2DeckError> {
        let audio = audio_path_for(video);
        let args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-y".into(),
            "-i".into(),
            video.as_os_str().to_owned(),
            "-vn".into(),
            "-ac".into(),
            "1".into(),
            "-ar".into(),
            "16000".into(),
            "-b:a".into(),
            "64k".into(),
            audio.as_os_str().to_owned(),
        ];
        run_tool(&self.ffmpeg_bin, args, None)
            .await
            .map_err(|e| Video2DeckError::collaborator(STAGE, e))?;
        Ok(audio)
    }

    async fn upload(&self, audio: &Path) -> Result<TranscriptionDetail, Video2DeckError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| Video2DeckError::collaborator(STAGE, format!("{}: {e}", audio.display())))?;
        debug!("Uploading {} bytes of audio", bytes.len());

        let part = Part::bytes(bytes)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| Video2DeckError::collaborator(STAGE, e))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("temperature", "0");

        let mut request = self.client.post(self.endpoint()).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Video2DeckError::collaborator(STAGE, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Video2DeckError::collaborator(
                STAGE,
                format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>()),
            ));
        }

        response
            .json::<TranscriptionDetail>()
            .await
            .map_err(|e| Video2DeckError::collaborator(STAGE, format!("bad response: {e}")))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, video: &Path) -> Result<TranscriptionDetail, Video2DeckError> {
        info!("Transcribing {}", video.display());
        let audio = self.extract_audio(video).await?;
        let result = self.upload(&audio).await;
        if let Err(e) = tokio::fs::remove_file(&audio).await {
            warn!("Could not remove {}: {}", audio.display(), e);
        }
        let detail = result?;
        info!(
            "Transcript: {} chars, {} words, {} segments",
            detail.text.chars().count(),
            detail.words.len(),
            detail.segments.len()
        );
        Ok(detail)
    }
}

/// `<dir>/<stem>_audio.mp3` beside the video.
fn audio_path_for(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{stem}_audio.mp3"))
}
