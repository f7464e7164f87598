//! Slide deck assembly: selected frames → one landscape PDF.
//!
//! Before layout the frames get a second, looser dedup pass
//! (`pdf_dedup_distance`, default 10): the selector's pass is tuned to keep
//! distinct slides, this one removes the "same slide, speaker moved"
//! pairs that would read as repeated pages. A frame whose hash cannot be
//! computed is kept. If nothing survives, the first frame is used alone.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not async-safe.
//! Layout runs on the blocking pool so Tokio workers never stall on it.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::pipeline::hash::{hash_file_async, ImageHash};
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A4 landscape, in PDF points.
pub const PAGE_WIDTH_PT: f32 = 842.0;
pub const PAGE_HEIGHT_PT: f32 = 595.0;

/// Builds a slide document from frames.
#[async_trait]
pub trait SlideAssembler: Send + Sync {
    /// Build the deck for `job_id` and return its public path.
    async fn build(&self, frames: &[PathBuf], job_id: &str) -> Result<String, Video2DeckError>;
}

/// pdfium-backed [`SlideAssembler`].
#[derive(Debug, Clone)]
pub struct PdfiumAssembler {
    slides_root: PathBuf,
    dedup_distance: u32,
    hash_min_dimension: u32,
    pdfium_dir: Option<PathBuf>,
}

impl PdfiumAssembler {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            slides_root: config.slides_root.clone(),
            dedup_distance: config.pdf_dedup_distance,
            hash_min_dimension: config.scoring.hash_min_dimension,
            pdfium_dir: config
                .pdfium_dir
                .clone()
                .or_else(|| std::env::var_os("VIDEO2DECK_PDFIUM_DIR").map(PathBuf::from)),
        }
    }

    /// Filesystem location of the deck for `job_id`.
    pub fn output_path(&self, job_id: &str) -> PathBuf {
        self.slides_root
            .join(job_id)
            .join(format!("{job_id}-slides.pdf"))
    }
}

/// Public path of the deck for `job_id`.
pub fn public_pdf_path(job_id: &str) -> String {
    format!("/slides/{job_id}/{job_id}-slides.pdf")
}

#[async_trait]
impl SlideAssembler for PdfiumAssembler {
    async fn build(&self, frames: &[PathBuf], job_id: &str) -> Result<String, Video2DeckError> {
        if frames.is_empty() {
            return Err(Video2DeckError::collaborator("PDF assembly", "no frames to assemble"));
        }

        let pages = dedup_for_layout(frames, self.dedup_distance, self.hash_min_dimension).await;
        let out = self.output_path(job_id);
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Video2DeckError::collaborator("PDF assembly", e))?;
        }

        let out_path = out.clone();
        let pdfium_dir = self.pdfium_dir.clone();
        let page_count = pages.len();
        tokio::task::spawn_blocking(move || {
            render_pdf_blocking(&pages, &out_path, pdfium_dir.as_deref())
        })
        .await
        .map_err(|e| Video2DeckError::Internal(format!("PDF task panicked: {}", e)))??;

        info!("Wrote {} pages to {}", page_count, out.display());
        Ok(public_pdf_path(job_id))
    }
}

/// Drop frames within `distance` of an earlier kept frame.
///
/// Missing files are skipped. A frame whose hash fails is kept without
/// joining the comparison set. An empty result falls back to `frames[0]`.
pub async fn dedup_for_layout(frames: &[PathBuf], distance: u32, min_dimension: u32) -> Vec<PathBuf> {
    let mut kept = Vec::new();
    let mut hashes: Vec<ImageHash> = Vec::new();

    for frame in frames {
        if !tokio::fs::try_exists(frame).await.unwrap_or(false) {
            warn!("{}: missing, left out of the deck", frame.display());
            continue;
        }
        let outcome = hash_file_async(frame, min_dimension).await;
        if outcome.is_degraded() {
            kept.push(frame.clone());
            continue;
        }
        let hash = outcome.into_value();
        if hashes.iter().any(|h| h.distance(hash) <= distance) {
            debug!("{}: near-duplicate page dropped", frame.display());
            continue;
        }
        hashes.push(hash);
        kept.push(frame.clone());
    }

    if kept.is_empty() {
        kept.extend(frames.first().cloned());
    }
    kept
}

/// Scale `(w, h)` to fit inside the page, preserving aspect ratio.
fn fit_to_page(w: u32, h: u32) -> (f32, f32) {
    let (w, h) = (w.max(1) as f32, h.max(1) as f32);
    let scale = (PAGE_WIDTH_PT / w).min(PAGE_HEIGHT_PT / h);
    (w * scale, h * scale)
}

/// Bind the library in `dir` when given, falling back to the system library.
fn bind_pdfium(dir: Option<&Path>) -> Result<Pdfium, Video2DeckError> {
    let bindings = match dir {
        Some(dir) => {
            let dir = dir.to_string_lossy();
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&*dir))
                .or_else(|_| Pdfium::bind_to_system_library())
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Video2DeckError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn render_pdf_blocking(
    frames: &[PathBuf],
    out: &Path,
    pdfium_dir: Option<&Path>,
) -> Result<(), Video2DeckError> {
    let pdf_err = |e: PdfiumError| Video2DeckError::collaborator("PDF assembly", format!("{:?}", e));

    let pdfium = bind_pdfium(pdfium_dir)?;
    let mut document = pdfium.create_new_pdf().map_err(pdf_err)?;
    let paper = PdfPagePaperSize::new_custom(
        PdfPoints::new(PAGE_WIDTH_PT),
        PdfPoints::new(PAGE_HEIGHT_PT),
    );

    for frame in frames {
        let mut page = document.pages_mut().create_page_at_end(paper).map_err(pdf_err)?;

        let img: DynamicImage = match image::open(frame) {
            Ok(img) => img,
            Err(e) => {
                warn!("{}: cannot render slide, leaving page blank: {}", frame.display(), e);
                continue;
            }
        };

        let (w, h) = fit_to_page(img.width(), img.height());
        let x = (PAGE_WIDTH_PT - w) / 2.0;
        let y = (PAGE_HEIGHT_PT - h) / 2.0;
        if let Err(e) = page.objects_mut().create_image_object(
            PdfPoints::new(x),
            PdfPoints::new(y),
            &img,
            Some(PdfPoints::new(w)),
            Some(PdfPoints::new(h)),
        ) {
            warn!("{}: cannot place image, leaving page blank: {:?}", frame.display(), e);
        }
    }

    document.save_to_file(out).map_err(pdf_err)?;
    Ok(())
}
