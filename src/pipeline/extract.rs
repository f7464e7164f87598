//! Frame extraction: sample still images from a video with ffmpeg.
//!
//! Frames land in `<frames_root>/<job_id>/fps/frame-0001.jpg`, … at one
//! frame every `frame_interval_secs`, scaled to `frame_scale_width` pixels
//! wide with the aspect ratio kept. Zero-padded names make lexicographic
//! order equal to temporal order, which [`list_frames`] relies on.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::pipeline::process::run_tool;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions recognised as extracted frames.
const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Produces a directory of ordered still frames from a video.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract frames of `video` for `job_id` and return the directory holding them.
    async fn extract(&self, video: &Path, job_id: &str) -> Result<PathBuf, Video2DeckError>;
}

/// `ffmpeg -i <video> -vf fps=<1/interval>,scale=<w>:-1 -q:v 2 frame-%04d.jpg`
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg_bin: PathBuf,
    frames_root: PathBuf,
    interval_secs: f32,
    scale_width: u32,
}

impl FfmpegExtractor {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            frames_root: config.frames_root.clone(),
            interval_secs: config.frame_interval_secs,
            scale_width: config.frame_scale_width,
        }
    }

    /// Directory frames for `job_id` are written to.
    pub fn frames_dir(&self, job_id: &str) -> PathBuf {
        self.frames_root.join(job_id).join("fps")
    }

    fn filter(&self) -> String {
        format!(
            "fps={},scale={}:-1",
            fps_expr(self.interval_secs),
            self.scale_width
        )
    }
}

/// `1/interval` written the way ffmpeg's `fps` filter accepts it.
fn fps_expr(interval_secs: f32) -> String {
    let fps = 1.0 / f64::from(interval_secs);
    let s = format!("{:.6}", fps);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, video: &Path, job_id: &str) -> Result<PathBuf, Video2DeckError> {
        let dir = self.frames_dir(job_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Video2DeckError::ExtractionFailed {
                detail: format!("cannot create {}: {}", dir.display(), e),
            })?;

        let pattern = dir.join("frame-%04d.jpg");
        let args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-y".into(),
            "-i".into(),
            video.as_os_str().to_owned(),
            "-vf".into(),
            self.filter().into(),
            "-q:v".into(),
            "2".into(),
            pattern.into_os_string(),
        ];

        info!("Extracting frames from {} → {}", video.display(), dir.display());
        run_tool(&self.ffmpeg_bin, args, None)
            .await
            .map_err(|detail| Video2DeckError::ExtractionFailed { detail })?;

        let frames = list_frames(&dir).await?;
        if frames.is_empty() {
            return Err(Video2DeckError::NoFrames { dir });
        }
        info!("Extracted {} frames", frames.len());
        Ok(dir)
    }
}

/// Image files in `dir`, sorted by name.
pub async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, Video2DeckError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Video2DeckError::ExtractionFailed {
            detail: format!("cannot read {}: {}", dir.display(), e),
        })?;

    let mut frames = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Video2DeckError::ExtractionFailed {
            detail: format!("cannot read {}: {}", dir.display(), e),
        })?
    {
        let path = entry.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    debug!("{}: {} frames", dir.display(), frames.len());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_expression() {
        assert_eq!(fps_expr(2.0), "0.5");
        assert_eq!(fps_expr(1.0), "1");
        assert_eq!(fps_expr(4.0), "0.25");
    }

    #[test]
    fn default_filter_matches_sampling_rate() {
        let ex = FfmpegExtractor::from_config(&PipelineConfig::default());
        assert_eq!(ex.filter(), "fps=0.5,scale=1280:-1");
        assert!(ex.frames_dir("job-1").ends_with("frames/job-1/fps"));
    }

    #[tokio::test]
    async fn listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame-0010.jpg", "frame-0002.JPG", "frame-0001.png", "notes.txt", "x.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let frames = list_frames(dir.path()).await.unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["frame-0001.png", "frame-0002.JPG", "frame-0010.jpg", "x.jpeg"]
        );
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_extraction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .upload_root(dir.path())
            .ffmpeg_bin("/nonexistent/ffmpeg")
            .build()
            .unwrap();
        let err = FfmpegExtractor::from_config(&config)
            .extract(Path::new("/tmp/talk.mp4"), "j1")
            .await
            .unwrap_err();
        assert!(matches!(err, Video2DeckError::ExtractionFailed { .. }));
    }
}
