use serde::{Deserialize, Serialize};

use crate::remote::PacedChunk;

pub const MIN_AI_MULTIPLIER: f64 = 0.5;
pub const MAX_AI_MULTIPLIER: f64 = 2.0;

/// One scheduled step of RSVP playback: a word, or a chunk supplied by the
/// smart pacer together with its display multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUnit {
    pub text: String,
    pub multiplier: Option<f64>,
}

impl DisplayUnit {
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            multiplier: None,
        }
    }

    /// Builds an AI-paced unit. Non-finite multipliers are discarded so the
    /// unit falls back to heuristic pacing.
    pub fn chunk(text: impl Into<String>, multiplier: f64) -> Self {
        let multiplier = multiplier
            .is_finite()
            .then(|| multiplier.clamp(MIN_AI_MULTIPLIER, MAX_AI_MULTIPLIER));
        Self {
            text: text.into(),
            multiplier,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count().max(1)
    }
}

/// Splits pre-cleaned text into word units. Empty or whitespace-only input
/// yields an empty sequence.
pub fn tokenize(text: &str) -> Vec<DisplayUnit> {
    text.split_whitespace().map(DisplayUnit::word).collect()
}

/// Turns smart-pacer records into the unit sequence directly. Chunk
/// boundaries are trusted as returned.
pub fn units_from_chunks(chunks: &[PacedChunk]) -> Vec<DisplayUnit> {
    chunks
        .iter()
        .map(|c| DisplayUnit::chunk(c.chunk.trim(), c.multiplier))
        .collect()
}
