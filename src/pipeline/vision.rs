//! Zero-shot visual classification of frames.
//!
//! [`VisualClassifier`] is the seam the slide classifier talks to: given an
//! image and candidate labels it returns a confidence per label, highest
//! first. The production implementation, [`VlmZeroShotClassifier`], asks a
//! vision LLM to score the labels and normalises the scores so they sum to
//! one. The provider behind it is created once, on first use, by the shared
//! [`LlmClient`].

use crate::error::Video2DeckError;
use crate::pipeline::encode::{encode_frame, CLASSIFY_MAX_EDGE};
use crate::pipeline::llm::{completion_options, LlmClient};
use crate::pipeline::postprocess::strip_code_fences;
use crate::prompts::{zero_shot_labels, ZERO_SHOT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// One candidate label and its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Zero-shot image classification over a caller-supplied label set.
#[async_trait]
pub trait VisualClassifier: Send + Sync {
    /// Score `labels` against the image at `image`, highest confidence first.
    async fn classify(
        &self,
        image: &Path,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, Video2DeckError>;
}

/// Vision-LLM backed zero-shot classifier.
#[derive(Debug)]
pub struct VlmZeroShotClassifier {
    llm: Arc<LlmClient>,
    max_tokens: usize,
}

impl VlmZeroShotClassifier {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self {
            llm,
            max_tokens: 1024,
        }
    }
}

#[async_trait]
impl VisualClassifier for VlmZeroShotClassifier {
    async fn classify(
        &self,
        image: &Path,
        labels: &[String],
    ) -> Result<Vec<LabelScore>, Video2DeckError> {
        let path = image.to_path_buf();
        let encoded = tokio::task::spawn_blocking(move || {
            let img = image::open(&path)?;
            encode_frame(&img, CLASSIFY_MAX_EDGE)
        })
        .await
        .map_err(|e| Video2DeckError::Internal(format!("Encode task panicked: {}", e)))?
        .map_err(|e| Video2DeckError::collaborator("visual classification", e))?;

        let messages = vec![
            ChatMessage::system(ZERO_SHOT_SYSTEM_PROMPT),
            ChatMessage::user_with_images(&zero_shot_labels(labels), vec![encoded]),
        ];
        let options = completion_options(0.0, self.max_tokens);

        let raw = self
            .llm
            .chat("visual classification", &messages, &options)
            .await?;
        let scores = parse_label_scores(&raw, labels)
            .map_err(|e| Video2DeckError::collaborator("visual classification", e))?;

        if let Some(top) = scores.first() {
            debug!("{}: top label '{}' ({:.3})", image.display(), top.label, top.score);
        }
        Ok(scores)
    }
}

/// Parse a `{"label": score, ...}` answer into normalised scores.
///
/// Labels the model omitted score zero; labels it invented are ignored.
/// Scores are clamped to `[0, 1]`, normalised to sum to one, and returned
/// highest first with ties kept in `labels` order.
pub fn parse_label_scores(raw: &str, labels: &[String]) -> Result<Vec<LabelScore>, String> {
    let body = strip_code_fences(raw);
    let map: HashMap<String, f64> =
        serde_json::from_str(&body).map_err(|e| format!("unparseable label scores: {e}"))?;

    let mut scores: Vec<LabelScore> = labels
        .iter()
        .map(|label| {
            let score = map.get(label).copied().unwrap_or(0.0).clamp(0.0, 1.0);
            LabelScore::new(label.clone(), score as f32)
        })
        .collect();

    let total: f32 = scores.iter().map(|s| s.score).sum();
    if total <= 0.0 {
        return Err("model assigned no confidence to any label".to_string());
    }
    for s in &mut scores {
        s.score /= total;
    }

    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec![
            "presentation slide".to_string(),
            "human face".to_string(),
            "blurry image".to_string(),
        ]
    }

    #[test]
    fn scores_are_normalised_and_sorted() {
        let raw = r#"{"presentation slide": 0.6, "human face": 0.2, "blurry image": 0.2}"#;
        let scores = parse_label_scores(raw, &labels()).unwrap();
        assert_eq!(scores[0].label, "presentation slide");
        let total: f32 = scores.iter().map(|s| s.score).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!((scores[0].score - 0.6).abs() < 1e-5);
    }

    #[test]
    fn fenced_answer_is_accepted() {
        let raw = "```json\n{\"human face\": 0.9}\n```";
        let scores = parse_label_scores(raw, &labels()).unwrap();
        assert_eq!(scores[0].label, "human face");
        assert!((scores[0].score - 1.0).abs() < 1e-6);
        assert_eq!(scores.len(), 3);
    }

    #[test]
    fn ties_keep_label_order() {
        let raw = r#"{"presentation slide": 0.5, "human face": 0.5}"#;
        let scores = parse_label_scores(raw, &labels()).unwrap();
        assert_eq!(scores[0].label, "presentation slide");
        assert_eq!(scores[1].label, "human face");
    }

    #[test]
    fn invented_labels_are_ignored() {
        let raw = r#"{"cat": 1.0, "blurry image": 0.1}"#;
        let scores = parse_label_scores(raw, &labels()).unwrap();
        assert_eq!(scores[0].label, "blurry image");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_label_scores("I think it's a slide", &labels()).is_err());
        assert!(parse_label_scores("{}", &labels()).is_err());
    }
}
