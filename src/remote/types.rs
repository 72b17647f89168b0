use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comprehension {
    Skim,
    #[default]
    Normal,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    #[default]
    Maintain,
    Improve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Brief,
    #[default]
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacingRequest {
    pub text: String,
    pub user_wpm: u32,
    pub comprehension: Comprehension,
    pub goal: Goal,
}

/// One smart-pacer record. Older deployments answer with `word` instead of
/// `chunk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacedChunk {
    #[serde(alias = "word")]
    pub chunk: String,
    #[serde(default = "neutral_multiplier")]
    pub multiplier: f64,
}

fn neutral_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRequest {
    pub text: String,
    pub summary_length: SummaryLength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub phrase: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub text: String,
    pub highlights: Vec<Highlight>,
}

/// The summary service answers either with bare text or a structured object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum SummaryPayload {
    Text(String),
    Structured {
        summary: String,
        #[serde(default)]
        highlights: Vec<Highlight>,
    },
}

impl From<SummaryPayload> for Summary {
    fn from(payload: SummaryPayload) -> Self {
        match payload {
            SummaryPayload::Text(text) => Summary {
                text: text.trim().to_string(),
                highlights: Vec::new(),
            },
            SummaryPayload::Structured {
                summary,
                highlights,
            } => Summary {
                text: summary.trim().to_string(),
                highlights,
            },
        }
    }
}

/// Response body shared by both endpoints: `{ result }` on success,
/// `{ error }` otherwise.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}
