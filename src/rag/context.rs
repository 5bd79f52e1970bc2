//! Context assembly from augmented candidates

use crate::models::AugmentedCandidate;

/// Builder for the QA context string
pub struct ContextBuilder {
    separator: String,
}

impl ContextBuilder {
    /// Create a new context builder with a custom entry separator
    #[must_use]
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Concatenate the summaries of the top `top_k` candidates
    ///
    /// Candidates are ordered by descending relevance score, ties broken by
    /// ascending rank of the originating search hit, so the output is
    /// deterministic for a given input. An empty input yields an empty
    /// string, never an error.
    #[must_use]
    pub fn build_context(&self, augmented: &[AugmentedCandidate], top_k: usize) -> String {
        let mut sorted: Vec<&AugmentedCandidate> = augmented.iter().collect();
        sorted.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then(a.rank.cmp(&b.rank))
        });

        sorted
            .into_iter()
            .take(top_k)
            .map(|candidate| candidate.summary.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new("\n")
    }
}
