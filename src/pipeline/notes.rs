//! Study-notes synthesis from the transcript.
//!
//! [`NotesSynthesizer`] is a plain prompt-in, text-out seam; the prompt
//! itself and the failure placeholder belong to [`synthesize_notes`], so a
//! stub synthesizer in tests sees exactly what a real LLM would.

use crate::config::PipelineConfig;
use crate::error::Video2DeckError;
use crate::outcome::Outcome;
use crate::pipeline::llm::{completion_options, LlmClient};
use crate::pipeline::postprocess::clean_notes;
use crate::prompts::{notes_prompt, NOTES_FAILED_PLACEHOLDER};
use async_trait::async_trait;
use edgequake_llm::ChatMessage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Free-form text completion.
#[async_trait]
pub trait NotesSynthesizer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, Video2DeckError>;
}

/// [`NotesSynthesizer`] backed by the shared [`LlmClient`].
#[derive(Debug)]
pub struct LlmNotesSynthesizer {
    llm: Arc<LlmClient>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmNotesSynthesizer {
    pub fn new(llm: Arc<LlmClient>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl NotesSynthesizer for LlmNotesSynthesizer {
    async fn complete(&self, prompt: &str) -> Result<String, Video2DeckError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = completion_options(self.temperature, self.max_tokens);
        self.llm.chat("notes synthesis", &messages, &options).await
    }
}

/// The first `limit` characters of `transcript`.
pub fn truncate_chars(transcript: &str, limit: usize) -> &str {
    match transcript.char_indices().nth(limit) {
        Some((byte_idx, _)) => &transcript[..byte_idx],
        None => transcript,
    }
}

/// Turn a transcript into Markdown notes.
///
/// On failure the notes are [`NOTES_FAILED_PLACEHOLDER`], tagged as degraded.
pub async fn synthesize_notes(
    synth: &dyn NotesSynthesizer,
    transcript: &str,
    char_limit: usize,
) -> Outcome<String> {
    let excerpt = truncate_chars(transcript, char_limit);
    debug!(
        "Synthesizing notes from {} of {} transcript chars",
        excerpt.chars().count(),
        transcript.chars().count()
    );
    match synth.complete(&notes_prompt(excerpt)).await {
        Ok(raw) => Outcome::Ok(clean_notes(&raw)),
        Err(e) => {
            warn!("Notes synthesis failed: {}", e);
            Outcome::degraded(NOTES_FAILED_PLACEHOLDER.to_string(), e.to_string())
        }
    }
}
