//! Augmentation stage: concurrent per-candidate summarization and scoring
//!
//! Each retrieved candidate is sent to the completion collaborator with a
//! templated prompt asking for a relevance score and a short summary. Calls
//! run concurrently with a bounded number in flight; results come back
//! index-aligned with the input regardless of completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream;
use futures::StreamExt;
use tracing::debug;
use tracing::warn;

use crate::clients::CompletionClient;
use crate::clients::GenerationParams;
use crate::config::SummarizeConfig;
use crate::errors::Result;
use crate::errors::StageRagError;
use crate::models::AugmentedCandidate;
use crate::models::SearchCandidate;
use crate::rag::prompts::build_summary_prompt;

/// Augmenter for retrieved candidates
pub struct Augmenter {
    client: Arc<dyn CompletionClient>,
    config: SummarizeConfig,
}

impl Augmenter {
    /// Create a new augmenter
    pub fn new(client: Arc<dyn CompletionClient>, config: &SummarizeConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Summarize and score all candidates concurrently
    ///
    /// Output order matches input order; a candidate whose generation fails
    /// after all retries is excluded from the output. The whole call fails
    /// only when the failed fraction exceeds the configured threshold.
    ///
    /// # Errors
    /// - `StageRagError::Augmentation` when too many candidates fail
    pub async fn augment(
        &self,
        candidates: &[SearchCandidate],
        question: &str,
    ) -> Result<Vec<AugmentedCandidate>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let total = candidates.len();

        // `buffered` bounds in-flight calls and yields results in input
        // order, which is the index-alignment guarantee callers rely on
        let slots: Vec<Option<AugmentedCandidate>> = stream::iter(candidates.iter().cloned())
            .map(|candidate| self.augment_one(candidate, question))
            .buffered(self.config.max_in_flight)
            .collect()
            .await;

        let mut augmented = Vec::with_capacity(total);
        let mut failed = 0;
        for slot in slots {
            match slot {
                Some(result) => augmented.push(result),
                None => failed += 1,
            }
        }

        if failed > 0 {
            let failure_rate = failed as f32 / total as f32;
            if failure_rate > self.config.failure_threshold {
                return Err(StageRagError::Augmentation { failed, total });
            }
            warn!(
                "Excluded {} of {} candidates after retries (failure rate {:.2})",
                failed, total, failure_rate
            );
        }

        debug!("Augmented {} of {} candidates", augmented.len(), total);

        Ok(augmented)
    }

    /// Summarize one candidate, retrying transient failures with exponential
    /// backoff; returns `None` when the retry budget is exhausted
    async fn augment_one(
        &self,
        candidate: SearchCandidate,
        question: &str,
    ) -> Option<AugmentedCandidate> {
        let prompt = build_summary_prompt(&candidate.content, question);
        let mut attempt: u32 = 0;

        loop {
            match self.generate_once(&prompt).await {
                Ok((relevance_score, summary)) => {
                    return Some(AugmentedCandidate {
                        id: candidate.id,
                        rank: candidate.rank,
                        content: candidate.content,
                        summary,
                        relevance_score,
                    });
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        warn!(
                            "Candidate {} failed after {} attempts: {}",
                            candidate.id,
                            attempt + 1,
                            e
                        );
                        return None;
                    }
                    let delay = backoff_delay(self.config.retry_backoff_ms, attempt);
                    debug!(
                        "Candidate {} attempt {} failed ({}), retrying in {:?}",
                        candidate.id,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One generation call with a per-call timeout, parsed into (score, summary)
    async fn generate_once(&self, prompt: &str) -> Result<(f32, String)> {
        let params = GenerationParams {
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stop: Vec::new(),
        };

        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.client.generate(prompt, &params),
        )
        .await
        .map_err(|_| StageRagError::Http("summarization call timed out".to_string()))??;

        parse_augmentation(&response.text)
    }
}

/// Exponential backoff delay for a retry attempt
///
/// Saturates instead of overflowing, so arbitrarily large configured retry
/// budgets stay safe.
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(2u64.saturating_pow(attempt.min(32))))
}

/// Parse a completion response into a relevance score and summary
///
/// Expected shape is a `SCORE: <float>` first line followed by the summary.
/// The prompt ends with `SCORE:`, so a bare leading number is accepted too.
pub fn parse_augmentation(text: &str) -> Result<(f32, String)> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("SCORE:").unwrap_or(trimmed);

    let mut lines = rest.trim_start().lines();
    let score_line = lines
        .next()
        .ok_or_else(|| StageRagError::Http("empty summarization response".to_string()))?;

    let score: f32 = score_line.trim().parse().map_err(|_| {
        StageRagError::Http(format!("unparseable relevance score `{score_line}`"))
    })?;
    if !score.is_finite() {
        return Err(StageRagError::Http(format!(
            "non-finite relevance score `{score_line}`"
        )));
    }

    let summary = lines.collect::<Vec<_>>().join("\n");
    let summary = summary
        .trim()
        .strip_prefix("SUMMARY:")
        .map(str::trim)
        .unwrap_or(summary.trim())
        .to_string();

    if summary.is_empty() {
        return Err(StageRagError::Http(
            "summarization response has no summary text".to_string(),
        ));
    }

    Ok((score, summary))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use tokio_test::assert_ok;

    use super::*;
    use crate::clients::GenerationResponse;

    fn candidate(id: i64, rank: usize, content: &str) -> SearchCandidate {
        SearchCandidate {
            id,
            content: content.to_string(),
            rank,
        }
    }

    fn test_config() -> SummarizeConfig {
        SummarizeConfig {
            endpoint: "http://localhost:11434".to_string(),
            model: "test".to_string(),
            max_in_flight: 4,
            max_retries: 2,
            retry_backoff_ms: 1,
            failure_threshold: 0.5,
            timeout_secs: 5,
            max_tokens: 128,
            temperature: 0.1,
        }
    }

    /// Responds with a fixed-format summary; candidates whose content
    /// contains "poison" always fail, and each call can be delayed so that
    /// completion order differs from submission order
    struct StubCompletionClient {
        delays_ms: Vec<u64>,
        calls: AtomicU32,
    }

    impl StubCompletionClient {
        fn immediate() -> Self {
            Self {
                delays_ms: Vec::new(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for StubCompletionClient {
        async fn generate(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<GenerationResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            if let Some(delay) = self.delays_ms.get(call) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }
            if prompt.contains("poison") {
                return Err(StageRagError::Http("simulated endpoint failure".to_string()));
            }
            let marker = prompt
                .lines()
                .find(|l| l.starts_with("passage-"))
                .unwrap_or("passage-?")
                .to_string();
            Ok(GenerationResponse {
                text: format!("SCORE: 0.8\nsummary of {marker}"),
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn output_is_index_aligned_with_input() {
        // First submitted call is the slowest, so completion order is
        // reversed relative to submission order
        let client = Arc::new(StubCompletionClient {
            delays_ms: vec![50, 20, 1],
            calls: AtomicU32::new(0),
        });
        let augmenter = Augmenter::new(client, &test_config());

        let candidates = vec![
            candidate(10, 0, "passage-a"),
            candidate(11, 1, "passage-b"),
            candidate(12, 2, "passage-c"),
        ];

        let augmented = augmenter.augment(&candidates, "q").await.unwrap();

        assert_eq!(augmented.len(), 3);
        for (i, result) in augmented.iter().enumerate() {
            assert_eq!(result.id, candidates[i].id);
            assert_eq!(result.rank, candidates[i].rank);
        }
        assert!(augmented[0].summary.contains("passage-a"));
        assert!(augmented[2].summary.contains("passage-c"));
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let augmenter = Augmenter::new(Arc::new(StubCompletionClient::immediate()), &test_config());
        let augmented = augmenter.augment(&[], "q").await.unwrap();
        assert!(augmented.is_empty());
    }

    #[tokio::test]
    async fn failing_candidate_is_excluded_below_threshold() {
        let client = Arc::new(StubCompletionClient::immediate());
        let mut config = test_config();
        config.failure_threshold = 0.4;
        let augmenter = Augmenter::new(client, &config);

        let candidates = vec![
            candidate(0, 0, "passage-a"),
            candidate(1, 1, "passage-b"),
            candidate(2, 2, "poison"),
            candidate(3, 3, "passage-d"),
            candidate(4, 4, "passage-e"),
        ];

        let augmented = augmenter.augment(&candidates, "q").await.unwrap();

        assert_eq!(augmented.len(), 4);
        let ids: Vec<i64> = augmented.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn excessive_failure_rate_fails_the_stage() {
        let client = Arc::new(StubCompletionClient::immediate());
        let mut config = test_config();
        config.failure_threshold = 0.1;
        let augmenter = Augmenter::new(client, &config);

        let candidates = vec![
            candidate(0, 0, "passage-a"),
            candidate(1, 1, "passage-b"),
            candidate(2, 2, "poison"),
            candidate(3, 3, "passage-d"),
            candidate(4, 4, "passage-e"),
        ];

        let err = augmenter.augment(&candidates, "q").await.unwrap_err();
        assert!(matches!(
            err,
            StageRagError::Augmentation { failed: 1, total: 5 }
        ));
    }

    /// Fails the first two calls, then succeeds
    struct FlakyCompletionClient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CompletionClient for FlakyCompletionClient {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<GenerationResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < 2 {
                return Err(StageRagError::Http("transient failure".to_string()));
            }
            Ok(GenerationResponse {
                text: "SCORE: 0.6\nrecovered summary".to_string(),
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let client = Arc::new(FlakyCompletionClient {
            calls: AtomicU32::new(0),
        });
        let augmenter = Augmenter::new(client.clone(), &test_config());

        let augmented =
            tokio_test::assert_ok!(augmenter.augment(&[candidate(1, 0, "passage-a")], "q").await);

        assert_eq!(augmented.len(), 1);
        assert_eq!(augmented[0].summary, "recovered summary");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    /// Always responds with text the parser cannot handle
    struct MalformedCompletionClient;

    #[async_trait]
    impl CompletionClient for MalformedCompletionClient {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<GenerationResponse> {
            Ok(GenerationResponse {
                text: "no score here at all".to_string(),
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn malformed_response_counts_as_failure() {
        let mut config = test_config();
        config.failure_threshold = 0.0;
        let augmenter = Augmenter::new(Arc::new(MalformedCompletionClient), &config);

        let err = augmenter
            .augment(&[candidate(1, 0, "passage-a")], "q")
            .await
            .unwrap_err();
        assert!(matches!(err, StageRagError::Augmentation { .. }));
    }

    #[test]
    fn backoff_delay_doubles_per_attempt() {
        assert_eq!(backoff_delay(250, 0), Duration::from_millis(250));
        assert_eq!(backoff_delay(250, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(250, 2), Duration::from_millis(1000));
    }

    #[test]
    fn backoff_delay_saturates_for_large_attempts() {
        // Must not overflow for retry budgets beyond any sensible size
        let capped = backoff_delay(250, 32);
        assert_eq!(backoff_delay(250, 64), capped);
        assert_eq!(backoff_delay(u64::MAX, 64), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn parse_full_score_line() {
        let (score, summary) = parse_augmentation("SCORE: 0.75\nA short summary").unwrap();
        assert!((score - 0.75).abs() < f32::EPSILON);
        assert_eq!(summary, "A short summary");
    }

    #[test]
    fn parse_bare_score_continuation() {
        // The prompt ends with `SCORE:`, so some models reply with the
        // number alone
        let (score, summary) = parse_augmentation(" 0.9\nSUMMARY: details here").unwrap();
        assert!((score - 0.9).abs() < f32::EPSILON);
        assert_eq!(summary, "details here");
    }

    #[test]
    fn parse_rejects_missing_score() {
        assert!(parse_augmentation("just prose, no score").is_err());
    }

    #[test]
    fn parse_rejects_missing_summary() {
        assert!(parse_augmentation("SCORE: 0.4").is_err());
    }

    #[test]
    fn parse_rejects_non_finite_score() {
        assert!(parse_augmentation("SCORE: NaN\nsummary").is_err());
        assert!(parse_augmentation("SCORE: inf\nsummary").is_err());
    }
}
