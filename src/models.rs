//! Core data model for the multi-stage pipeline

use serde::Deserialize;
use serde::Serialize;

/// One retrieved passage, produced by the retrieval stage
///
/// `rank` is the zero-based position the search service returned this
/// candidate at; ranks within one response are contiguous from 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchCandidate {
    pub id: i64,
    pub content: String,
    pub rank: usize,
}

/// A candidate enriched with a generated summary and relevance score
///
/// `id`, `rank` and `content` are carried over from the source candidate for
/// traceability and debugging. One `AugmentedCandidate` corresponds to exactly
/// one `SearchCandidate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentedCandidate {
    pub id: i64,
    pub rank: usize,
    pub content: String,
    pub summary: String,
    pub relevance_score: f32,
}

/// Final output of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Raw payload from the chat collaborator, preserved for audit/debugging
    pub raw_response: serde_json::Value,
}
