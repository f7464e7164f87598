//! Prompts for every LLM call the pipeline makes.
//!
//! Keeping them together means a wording change touches one file, and unit
//! tests can inspect prompts without a live model.

/// System prompt for zero-shot frame classification.
///
/// The model sees one video frame and a list of candidate labels and must
/// answer with a JSON object mapping each label to a confidence.
pub const ZERO_SHOT_SYSTEM_PROMPT: &str = r#"You are a zero-shot image classifier for frames sampled from lecture and presentation videos.

You will receive one image and a list of candidate labels. Score how well each label describes the image.

Rules:
- Answer with ONE JSON object and nothing else.
- Keys are the candidate labels, copied exactly.
- Values are confidences between 0 and 1.
- Every candidate label must appear.
- Do NOT wrap the JSON in code fences.
- Do NOT add commentary."#;

/// User-turn text listing the candidate labels.
pub fn zero_shot_labels(labels: &[String]) -> String {
    let mut out = String::from("Candidate labels:\n");
    for label in labels {
        out.push_str("- ");
        out.push_str(label);
        out.push('\n');
    }
    out
}

/// Placeholder stored as the notes when synthesis fails.
pub const NOTES_FAILED_PLACEHOLDER: &str = "AI Notes generation failed.";

/// Build the notes prompt around an (already truncated) transcript.
pub fn notes_prompt(transcript: &str) -> String {
    format!(
        r#"You are an expert note-taker. Turn the following lecture transcript into study notes in Markdown.

Use exactly these sections:

## Key Points
A bulleted list of the most important ideas.

## Summary
One or two paragraphs summarising the lecture.

## Detailed Notes
Structured notes with sub-headings and bullets, following the order of the lecture.

Output only the Markdown. Do not wrap it in code fences.

Transcript:
"""
{transcript}
""""#
    )
}

/// Build the flashcard prompt from notes and transcript.
pub fn flashcards_prompt(notes: &str, transcript: &str) -> String {
    format!(
        r#"Create study flashcards from the lecture material below.

Return ONLY a JSON array. Each element must be an object with these keys:
- "front": the question (string)
- "back": the answer (string)
- "hints": short hints (array of strings, may be empty)
- "difficulty": one of "easy", "medium", "hard"
- "tags": topic tags (array of strings)

Do not wrap the JSON in code fences and do not add commentary.

Notes:
"""
{notes}
"""

Transcript:
"""
{transcript}
""""#
    )
}
