//! Slide classification: decide whether one frame shows legible content.
//!
//! Each frame goes through three gates:
//!
//! 1. **Size**: frames under `min_dimension` on either side are rejected.
//! 2. **Visual**: the zero-shot classifier scores every positive and negative
//!    label. A negative top label above `negative_reject_threshold` rejects
//!    the frame immediately and OCR is skipped.
//! 3. **Text**: OCR runs and the whitespace-collapsed character count earns
//!    cumulative bonuses. An OCR failure counts as zero characters.
//!
//! The fused score is the top label's confidence when that label is
//! positive, otherwise `negative_floor`; plus every text bonus whose
//! threshold the length strictly exceeds; minus `negative_penalty` when the
//! top label is negative. The frame is kept when the fused score reaches
//! `keep_threshold`.
//!
//! [`SlideClassifier::classify`] never fails. Unreadable images and visual
//! classifier errors become `keep = false, score = 0, reason = Error`. A
//! collaborator panic is caught per frame by the selector and recorded the
//! same way.

use crate::config::ScoringPolicy;
use crate::error::FrameError;
use crate::outcome::Outcome;
use crate::pipeline::ocr::TextRecognizer;
use crate::pipeline::vision::{LabelScore, VisualClassifier};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a frame was kept or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Below the minimum dimension.
    TooSmall,
    /// Confident negative top label; OCR skipped.
    ClipReject,
    /// Fused score under the keep threshold.
    LowScore,
    /// Fused score at or above the keep threshold.
    Composite,
    /// The frame could not be classified.
    Error,
}

/// The verdict for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub path: PathBuf,
    pub keep: bool,
    pub score: f32,
    pub reason: Reason,
    /// Top zero-shot label, when classification got that far.
    pub label: Option<String>,
    /// Whitespace-collapsed OCR length, when OCR ran.
    pub text_len: Option<usize>,
    /// Set when OCR ran but failed and its text was taken as empty.
    pub ocr_degraded: Option<String>,
    /// Set when `reason == Error`.
    pub error: Option<FrameError>,
}

impl Classification {
    fn rejected(path: &Path, reason: Reason, label: Option<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            keep: false,
            score: 0.0,
            reason,
            label,
            text_len: None,
            ocr_degraded: None,
            error: None,
        }
    }

    pub(crate) fn failed(path: &Path, error: FrameError) -> Self {
        warn!("{}", error);
        Self {
            error: Some(error),
            ..Self::rejected(path, Reason::Error, None)
        }
    }
}

/// Number of characters once every run of whitespace is collapsed to one space.
pub fn collapsed_len(text: &str) -> usize {
    let mut len = 0;
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            len += 1;
        }
        len += word.chars().count();
    }
    len
}

/// The first highest-scoring label; earlier entries win ties. NaN scores
/// never win.
pub fn top_label(scores: &[LabelScore]) -> Option<&LabelScore> {
    let mut best: Option<&LabelScore> = None;
    for s in scores.iter().filter(|s| !s.score.is_nan()) {
        if best.map_or(true, |b| s.score.total_cmp(&b.score).is_gt()) {
            best = Some(s);
        }
    }
    best
}

/// `true` when the top label alone rejects the frame, before OCR.
pub fn is_fast_reject(policy: &ScoringPolicy, top: &LabelScore) -> bool {
    !policy.is_positive(&top.label) && top.score > policy.negative_reject_threshold
}

/// Fuse the visual verdict and the text length into `(score, keep)`.
pub fn fuse_score(policy: &ScoringPolicy, top: &LabelScore, text_len: usize) -> (f32, bool) {
    let positive = policy.is_positive(&top.label);
    let mut score = if positive { top.score } else { policy.negative_floor };
    for &(min_chars, bonus) in &policy.text_bonuses {
        if text_len > min_chars {
            score += bonus;
        }
    }
    if !positive {
        score -= policy.negative_penalty;
    }
    (score, score >= policy.keep_threshold)
}

/// Classifies frames using injected visual and OCR collaborators.
#[derive(Clone)]
pub struct SlideClassifier {
    vision: Arc<dyn VisualClassifier>,
    ocr: Arc<dyn TextRecognizer>,
    policy: Arc<ScoringPolicy>,
    labels: Arc<Vec<String>>,
}

impl std::fmt::Debug for SlideClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlideClassifier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SlideClassifier {
    pub fn new(
        vision: Arc<dyn VisualClassifier>,
        ocr: Arc<dyn TextRecognizer>,
        policy: ScoringPolicy,
    ) -> Self {
        let labels = Arc::new(policy.all_labels());
        Self {
            vision,
            ocr,
            policy: Arc::new(policy),
            labels,
        }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Classify one frame. Never fails.
    pub async fn classify(&self, path: &Path) -> Classification {
        let owned = path.to_path_buf();
        let dims = match tokio::task::spawn_blocking(move || image::image_dimensions(&owned)).await
        {
            Ok(Ok(dims)) => dims,
            Ok(Err(e)) => {
                return Classification::failed(
                    path,
                    FrameError::Unreadable {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    },
                )
            }
            Err(e) => {
                return Classification::failed(
                    path,
                    FrameError::Unreadable {
                        path: path.to_path_buf(),
                        detail: format!("reading dimensions panicked: {e}"),
                    },
                )
            }
        };

        let (width, height) = dims;
        if width < self.policy.min_dimension || height < self.policy.min_dimension {
            debug!("{}: {}x{} too small", path.display(), width, height);
            return Classification::rejected(path, Reason::TooSmall, None);
        }

        let scores = match self.vision.classify(path, &self.labels).await {
            Ok(scores) => scores,
            Err(e) => {
                return Classification::failed(
                    path,
                    FrameError::Vision {
                        path: path.to_path_buf(),
                        detail: e.to_string(),
                    },
                )
            }
        };
        let Some(top) = top_label(&scores) else {
            return Classification::failed(
                path,
                FrameError::Vision {
                    path: path.to_path_buf(),
                    detail: "classifier returned no labels".to_string(),
                },
            );
        };

        if is_fast_reject(&self.policy, top) {
            debug!(
                "{}: rejected on '{}' ({:.3})",
                path.display(),
                top.label,
                top.score
            );
            return Classification::rejected(path, Reason::ClipReject, Some(top.label.clone()));
        }

        let text = Outcome::from_result(self.ocr.recognize(path).await, String::new());
        if let Some(reason) = text.reason() {
            warn!("{}: OCR degraded to empty text: {}", path.display(), reason);
        }
        let ocr_degraded = text.reason().map(str::to_string);
        let text_len = collapsed_len(text.value());

        let (score, keep) = fuse_score(&self.policy, top, text_len);
        debug!(
            "{}: label='{}' clip={:.3} text_len={} score={:.3} keep={}",
            path.display(),
            top.label,
            top.score,
            text_len,
            score,
            keep
        );

        Classification {
            path: path.to_path_buf(),
            keep,
            score,
            reason: if keep { Reason::Composite } else { Reason::LowScore },
            label: Some(top.label.clone()),
            text_len: Some(text_len),
            ocr_degraded,
            error: None,
        }
    }
}
