//! External collaborator interfaces
//!
//! The pipeline consumes three external services: a vector search index, a
//! completion-style text generation endpoint, and a chat-style generation
//! endpoint. Each is reduced to a minimal trait so that stages can be tested
//! against stubs and wired to HTTP implementations in production.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

pub use http::HttpChatClient;
pub use http::HttpCompletionClient;
pub use http::HttpSearchClient;

use crate::errors::Result;

/// One raw hit from the search service, before rank assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub content: String,
    pub score: f32,
}

/// Sampling parameters shared by completion and chat calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default)]
    pub stop: Vec<String>,
}

/// A single chat message in the `{role, content}` wire shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Generated text plus the untouched collaborator payload
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub raw: serde_json::Value,
}

/// Vector search collaborator
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// Return up to `num_results` passages most similar to `query`,
    /// most relevant first
    async fn similarity_search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>>;
}

/// Completion-style generation collaborator, used per candidate by the
/// augmentation stage
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<GenerationResponse>;
}

/// Chat-style generation collaborator, used by the answering stage
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn generate_chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<GenerationResponse>;
}
