//! Complete pipeline: Retrieve -> Augment -> Build context -> Answer

use std::sync::Arc;

use tracing::debug;
use tracing::info;
use uuid::Uuid;

use crate::clients::ChatClient;
use crate::clients::CompletionClient;
use crate::clients::HttpChatClient;
use crate::clients::HttpCompletionClient;
use crate::clients::HttpSearchClient;
use crate::clients::SearchIndexClient;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::StageRagError;
use crate::models::AnswerResult;
use crate::models::SearchCandidate;
use crate::rag::Answerer;
use crate::rag::Augmenter;
use crate::rag::ContextBuilder;
use crate::rag::Retriever;

/// Per-invocation query options
#[derive(Debug, Clone)]
pub struct PipelineQuery {
    pub question: String,
    /// Candidates requested from the search stage
    pub retrieval_limit: usize,
    /// Augmented candidates kept in the QA context
    pub context_top_k: usize,
}

/// Four-stage retrieval-augmented QA pipeline
///
/// The orchestrator is a thin, stateless sequencer: stages handle their own
/// retries, and the only policy added here is the overall deadline.
pub struct RagPipeline {
    retriever: Retriever,
    augmenter: Augmenter,
    context_builder: ContextBuilder,
    answerer: Answerer,
    config: AppConfig,
}

impl RagPipeline {
    /// Create a pipeline wired to HTTP collaborators from configuration
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - HTTP client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let search_client = Arc::new(HttpSearchClient::new(
            config.search.endpoint.clone(),
            config.search.api_key.clone(),
            config.search.timeout_secs,
        )?);
        let completion_client = Arc::new(HttpCompletionClient::new(
            config.summarize.endpoint.clone(),
            config.summarize.model.clone(),
            config.summarize.timeout_secs,
        )?);
        let chat_client = Arc::new(HttpChatClient::new(
            config.answer.endpoint.clone(),
            config.answer.model.clone(),
            config.answer.timeout_secs,
        )?);

        Ok(Self::from_clients(
            search_client,
            completion_client,
            chat_client,
            config,
        ))
    }

    /// Create a pipeline from existing collaborators
    #[must_use]
    pub fn from_clients(
        search_client: Arc<dyn SearchIndexClient>,
        completion_client: Arc<dyn CompletionClient>,
        chat_client: Arc<dyn ChatClient>,
        config: &AppConfig,
    ) -> Self {
        Self {
            retriever: Retriever::new(search_client, &config.search),
            augmenter: Augmenter::new(completion_client, &config.summarize),
            context_builder: ContextBuilder::default(),
            answerer: Answerer::new(chat_client, &config.answer),
            config: config.clone(),
        }
    }

    /// Run the full pipeline with default query options
    ///
    /// # Errors
    /// - One of the four stage-tagged error kinds, or `PipelineTimeout` when
    ///   the overall deadline expires
    pub async fn run(&self, question: &str) -> Result<AnswerResult> {
        self.run_with_options(PipelineQuery {
            question: question.to_string(),
            retrieval_limit: self.config.search.default_top_k,
            context_top_k: self.config.pipeline.context_top_k,
        })
        .await
    }

    /// Run the full pipeline with custom query options
    ///
    /// # Errors
    /// - `StageRagError::Retrieval` for bad input or search failures
    /// - `StageRagError::Augmentation` for excessive summarization failures
    /// - `StageRagError::AnswerGeneration` for a failed final call
    /// - `StageRagError::PipelineTimeout` when the overall deadline expires;
    ///   expiry cancels any in-flight augmentation work
    pub async fn run_with_options(&self, query: PipelineQuery) -> Result<AnswerResult> {
        let run_id = Uuid::new_v4();
        let deadline = self.config.pipeline_deadline();

        info!(%run_id, "Processing pipeline query: {}", query.question);

        match tokio::time::timeout(deadline, self.run_stages(&query)).await {
            Ok(result) => {
                if result.is_ok() {
                    info!(%run_id, "Pipeline query completed successfully");
                }
                result
            }
            Err(_) => Err(StageRagError::PipelineTimeout(deadline)),
        }
    }

    async fn run_stages(&self, query: &PipelineQuery) -> Result<AnswerResult> {
        debug!("Stage 1: Retrieving candidates");
        let candidates = self
            .retriever
            .search(&query.question, query.retrieval_limit)
            .await?;
        debug!("Retrieved {} candidates", candidates.len());

        debug!("Stage 2: Augmenting candidates");
        let augmented = self.augmenter.augment(&candidates, &query.question).await?;

        debug!("Stage 3: Building context");
        let context = self
            .context_builder
            .build_context(&augmented, query.context_top_k);

        debug!("Stage 4: Generating answer");
        self.answerer.answer(&query.question, &context).await
    }

    /// Retrieval stage only, without generation
    ///
    /// # Errors
    /// - `StageRagError::Retrieval` for bad input or search failures
    pub async fn search_candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>> {
        self.retriever.search(query, limit).await
    }

    /// Get retriever reference
    #[must_use]
    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Get context builder reference
    #[must_use]
    pub const fn context_builder(&self) -> &ContextBuilder {
        &self.context_builder
    }
}
