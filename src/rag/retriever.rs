//! Retrieval stage: similarity search against the external index

use std::sync::Arc;

use tracing::debug;

use crate::clients::SearchIndexClient;
use crate::config::SearchConfig;
use crate::errors::Result;
use crate::errors::StageRagError;
use crate::models::SearchCandidate;

/// Retriever for candidate passages
pub struct Retriever {
    client: Arc<dyn SearchIndexClient>,
    max_top_k: usize,
    require_results: bool,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(client: Arc<dyn SearchIndexClient>, config: &SearchConfig) -> Self {
        Self {
            client,
            max_top_k: config.max_top_k,
            require_results: config.require_results,
        }
    }

    /// Search the index for passages relevant to `question`
    ///
    /// Candidates are returned in response order with contiguous ranks
    /// starting at 0.
    ///
    /// # Errors
    /// - Empty question or `top_k` outside `1..=max_top_k`
    /// - Search collaborator unreachable or returning malformed hits
    /// - Zero results when `require_results` is configured
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Vec<SearchCandidate>> {
        if question.trim().is_empty() {
            return Err(StageRagError::Retrieval(
                "question must not be empty".to_string(),
            ));
        }
        if top_k == 0 || top_k > self.max_top_k {
            return Err(StageRagError::Retrieval(format!(
                "top_k must be in 1..={}, got {top_k}",
                self.max_top_k
            )));
        }

        debug!("Performing similarity search: {}", question);

        let hits = self
            .client
            .similarity_search(question, top_k)
            .await
            .map_err(|e| match e {
                StageRagError::Retrieval(_) => e,
                other => StageRagError::Retrieval(other.to_string()),
            })?;

        if hits.is_empty() && self.require_results {
            return Err(StageRagError::Retrieval(
                "search returned no results".to_string(),
            ));
        }

        let candidates = hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| {
                if hit.content.trim().is_empty() {
                    return Err(StageRagError::Retrieval(format!(
                        "search hit {} has no content",
                        hit.id
                    )));
                }
                Ok(SearchCandidate {
                    id: hit.id,
                    content: hit.content,
                    rank,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Retrieved {} candidates", candidates.len());

        Ok(candidates)
    }
}
