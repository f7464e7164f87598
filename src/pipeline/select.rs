//! Slide selection: classify every frame, rank, and drop near-duplicates.
//!
//! ## Steps
//!
//! 1. Classify all frames with at most `concurrency` classifications in
//!    flight. Results come back in input order. Each classification runs
//!    on its own task, so a collaborator panic costs only that frame.
//! 2. Rank the kept frames by fused score, highest first. The sort is
//!    stable, so equal scores keep their extraction order.
//! 3. If nothing was kept, fall back to the single best-scoring frame that
//!    still exists on disk. The selection is empty only when every input
//!    frame has vanished.
//! 4. Walk the ranking and accept a frame only if its perceptual hash is
//!    more than `dedup_distance` bits from every frame accepted so far.
//!    Stop at `max_keep`.
//!
//! The greedy walk means the accepted set is not globally optimal: a
//! high-scoring frame can shadow a slightly different, lower-scoring one.

use crate::config::SelectionOptions;
use crate::error::FrameError;
use crate::pipeline::classify::{Classification, SlideClassifier};
use crate::pipeline::hash::{hash_file_async, ImageHash};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The outcome of a selection pass.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    /// Accepted frames, best first.
    pub slides: Vec<PathBuf>,
    /// One verdict per input frame, in input order.
    pub classifications: Vec<Classification>,
    /// `true` when no frame passed the classifier and the best one was taken anyway.
    pub fallback_used: bool,
}

/// Ranks and deduplicates frames using a [`SlideClassifier`].
#[derive(Debug, Clone)]
pub struct SlideSelector {
    classifier: SlideClassifier,
    concurrency: usize,
}

impl SlideSelector {
    pub fn new(classifier: SlideClassifier, concurrency: usize) -> Self {
        Self {
            classifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Select up to `opts.max_keep` distinct slides from `frames`.
    pub async fn select(&self, frames: &[PathBuf], opts: SelectionOptions) -> Selection {
        if frames.is_empty() {
            return Selection {
                slides: Vec::new(),
                classifications: Vec::new(),
                fallback_used: false,
            };
        }

        let classifications: Vec<Classification> = stream::iter(frames.to_vec())
            .map(|frame| {
                let classifier = self.classifier.clone();
                async move {
                    let task = tokio::spawn({
                        let frame = frame.clone();
                        async move { classifier.classify(&frame).await }
                    });
                    match task.await {
                        Ok(c) => c,
                        Err(e) => Classification::failed(
                            &frame,
                            FrameError::Panicked {
                                path: frame.clone(),
                                detail: e.to_string(),
                            },
                        ),
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let kept = classifications.iter().filter(|c| c.keep).count();
        let mut ranked = rank(&classifications, true);
        let fallback_used = ranked.is_empty();
        if fallback_used {
            warn!(
                "No frame passed the classifier ({} frames); using the best-scoring one",
                frames.len()
            );
            ranked = rank(&classifications, false);
        }
        let cap = if fallback_used { 1 } else { opts.max_keep };

        let hash_min = self.classifier.policy().hash_min_dimension;
        let mut slides = Vec::new();
        let mut accepted: Vec<ImageHash> = Vec::new();

        for idx in ranked {
            if slides.len() >= cap {
                break;
            }
            let path = &classifications[idx].path;
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                warn!("{}: vanished before dedup, skipping", path.display());
                continue;
            }

            let hash = hash_file_async(path, hash_min).await.into_value();
            if let Some(near) = accepted
                .iter()
                .find(|h| h.distance(hash) <= opts.dedup_distance)
            {
                debug!(
                    "{}: duplicate (distance {} ≤ {})",
                    path.display(),
                    near.distance(hash),
                    opts.dedup_distance
                );
                continue;
            }

            accepted.push(hash);
            slides.push(path.clone());
        }

        info!(
            "Selected {} of {} frames ({} passed the classifier)",
            slides.len(),
            frames.len(),
            kept
        );

        Selection {
            slides,
            classifications,
            fallback_used,
        }
    }
}

/// Indices into `classifications` ordered by score, highest first, ties in
/// input order. With `kept_only`, rejected frames are left out.
fn rank(classifications: &[Classification], kept_only: bool) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..classifications.len())
        .filter(|&i| !kept_only || classifications[i].keep)
        .collect();
    idx.sort_by(|&a, &b| {
        classifications[b]
            .score
            .total_cmp(&classifications[a].score)
    });
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringPolicy;
    use crate::error::Video2DeckError;
    use crate::pipeline::classify::Reason;
    use crate::pipeline::hash::tests::pattern_image;
    use crate::pipeline::ocr::TextRecognizer;
    use crate::pipeline::vision::{LabelScore, VisualClassifier};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    /// Scores each frame by file name; unknown names get a confident negative.
    struct ByName(HashMap<String, f32>);

    #[async_trait]
    impl VisualClassifier for ByName {
        async fn classify(
            &self,
            image: &Path,
            _labels: &[String],
        ) -> Result<Vec<LabelScore>, Video2DeckError> {
            let name = image.file_name().unwrap().to_string_lossy().to_string();
            Ok(match self.0.get(&name) {
                Some(&s) => vec![LabelScore::new("presentation slide", s)],
                None => vec![LabelScore::new("human face", 0.9)],
            })
        }
    }

    struct PanicsOn(&'static str);

    #[async_trait]
    impl VisualClassifier for PanicsOn {
        async fn classify(
            &self,
            image: &Path,
            _labels: &[String],
        ) -> Result<Vec<LabelScore>, Video2DeckError> {
            if image.file_name().is_some_and(|n| n == self.0) {
                panic!("model crashed");
            }
            Ok(vec![LabelScore::new("presentation slide", 0.5)])
        }
    }

    struct NoText;

    #[async_trait]
    impl TextRecognizer for NoText {
        async fn recognize(&self, _image: &Path) -> Result<String, Video2DeckError> {
            Ok(String::new())
        }
    }

    fn selector(scores: &[(&str, f32)]) -> SlideSelector {
        let map = scores.iter().map(|(n, s)| (n.to_string(), *s)).collect();
        SlideSelector::new(
            SlideClassifier::new(Arc::new(ByName(map)), Arc::new(NoText), ScoringPolicy::default()),
            4,
        )
    }

    fn write_frames(dir: &tempfile::TempDir, patterns: &[(&str, u64)]) -> Vec<PathBuf> {
        patterns
            .iter()
            .map(|(name, bits)| {
                let p = dir.path().join(name);
                pattern_image(*bits, 160).save(&p).unwrap();
                p
            })
            .collect()
    }

    const A: u64 = 0xFFFF_FFFF_0000_0000;
    const B: u64 = 0x00FF_00FF_00FF_00FF;
    const C: u64 = 0xF0F0_F0F0_F0F0_F0F0;

    #[tokio::test]
    async fn ranks_by_score_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let frames = write_frames(&dir, &[("a.png", A), ("b.png", B), ("c.png", C)]);
        let sel = selector(&[("a.png", 0.4), ("b.png", 0.9), ("c.png", 0.6)]);

        let out = sel
            .select(&frames, SelectionOptions { dedup_distance: 5, max_keep: 2 })
            .await;
        assert_eq!(out.slides, vec![frames[1].clone(), frames[2].clone()]);
        assert!(!out.fallback_used);
        assert_eq!(out.classifications.len(), 3);
        assert_eq!(out.classifications[0].path, frames[0]);
    }

    #[tokio::test]
    async fn near_duplicates_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let frames = write_frames(
            &dir,
            &[("a.png", A), ("a2.png", A ^ 0b101), ("b.png", B)],
        );
        let sel = selector(&[("a.png", 0.5), ("a2.png", 0.5), ("b.png", 0.5)]);

        let out = sel.select(&frames, SelectionOptions::default()).await;
        assert_eq!(out.slides, vec![frames[0].clone(), frames[2].clone()]);
    }

    #[tokio::test]
    async fn falls_back_to_single_best_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frames = write_frames(&dir, &[("x.png", A), ("y.png", B), ("z.png", C)]);
        let sel = selector(&[]);

        let out = sel.select(&frames, SelectionOptions::default()).await;
        assert!(out.fallback_used);
        assert_eq!(out.slides.len(), 1);
        assert!(out
            .classifications
            .iter()
            .all(|c| c.reason == Reason::ClipReject));
    }

    #[tokio::test]
    async fn panic_on_one_frame_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let frames = write_frames(&dir, &[("a.png", A), ("b.png", B), ("c.png", C)]);
        let sel = SlideSelector::new(
            SlideClassifier::new(
                Arc::new(PanicsOn("a.png")),
                Arc::new(NoText),
                ScoringPolicy::default(),
            ),
            4,
        );

        let out = sel.select(&frames, SelectionOptions::default()).await;
        assert_eq!(out.slides, vec![frames[1].clone(), frames[2].clone()]);
        assert!(!out.fallback_used);
        let first = &out.classifications[0];
        assert_eq!(first.reason, Reason::Error);
        assert_eq!(first.score, 0.0);
        assert!(matches!(first.error, Some(FrameError::Panicked { .. })));
    }

    #[tokio::test]
    async fn fallback_skips_a_vanished_best_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frames = write_frames(&dir, &[("x.png", A), ("y.png", B), ("z.png", C)]);
        std::fs::remove_file(&frames[0]).unwrap();

        let out = selector(&[]).select(&frames, SelectionOptions::default()).await;
        assert!(out.fallback_used);
        assert_eq!(out.slides, vec![frames[1].clone()]);
    }

    #[tokio::test]
    async fn empty_input_selects_nothing() {
        let out = selector(&[]).select(&[], SelectionOptions::default()).await;
        assert!(out.slides.is_empty());
        assert!(!out.fallback_used);
    }

    #[test]
    fn rank_is_stable_on_ties() {
        let mk = |name: &str, score: f32, keep: bool| Classification {
            path: PathBuf::from(name),
            keep,
            score,
            reason: if keep { Reason::Composite } else { Reason::LowScore },
            label: None,
            text_len: None,
            ocr_degraded: None,
            error: None,
        };
        let cs = vec![
            mk("a", 0.5, true),
            mk("b", 0.9, false),
            mk("c", 0.5, true),
            mk("d", 0.7, true),
        ];
        assert_eq!(rank(&cs, true), vec![3, 0, 2]);
        assert_eq!(rank(&cs, false), vec![1, 3, 0, 2]);
    }
}
