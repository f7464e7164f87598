//! Study flashcards generated from a finished job's notes and transcript.

use crate::outcome::Outcome;
use crate::pipeline::notes::{truncate_chars, NotesSynthesizer};
use crate::pipeline::postprocess::strip_code_fences;
use crate::prompts::flashcards_prompt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Transcript characters included in the flashcard prompt.
const TRANSCRIPT_EXCERPT_CHARS: usize = 8000;

/// One question/answer card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

/// Ask the synthesizer for flashcards.
///
/// Any failure (the call itself, or a reply that is not a JSON array of
/// cards) yields an empty list tagged as degraded.
pub async fn generate(
    synth: &dyn NotesSynthesizer,
    notes: &str,
    transcript: &str,
) -> Outcome<Vec<Flashcard>> {
    let prompt = flashcards_prompt(notes, truncate_chars(transcript, TRANSCRIPT_EXCERPT_CHARS));
    let raw = match synth.complete(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Flashcard generation failed: {}", e);
            return Outcome::empty(e.to_string());
        }
    };

    match parse_flashcards(&raw) {
        Ok(cards) => {
            info!("Generated {} flashcards", cards.len());
            Outcome::Ok(cards)
        }
        Err(e) => {
            warn!("Flashcard reply was not valid JSON: {}", e);
            Outcome::empty(format!("invalid flashcard JSON: {e}"))
        }
    }
}

/// Parse a reply, tolerating a surrounding code fence.
pub fn parse_flashcards(raw: &str) -> Result<Vec<Flashcard>, serde_json::Error> {
    let cards: Vec<Flashcard> = serde_json::from_str(&strip_code_fences(raw))?;
    Ok(cards
        .into_iter()
        .filter(|c| !c.front.trim().is_empty() && !c.back.trim().is_empty())
        .collect())
}
