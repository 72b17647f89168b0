mod client;
mod types;

pub use client::{AiService, HttpAiClient, RemoteConfig};
pub use types::{
    Comprehension, Goal, Highlight, PacedChunk, PacingRequest, Summary, SummaryLength,
    SummaryRequest,
};
