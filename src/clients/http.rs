//! HTTP implementations of the collaborator traits
//!
//! All three clients speak JSON over HTTP: the search client against a vector
//! search service's `/query` route, the generation clients against
//! OpenAI-compatible `/completions` and `/chat/completions` routes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::clients::ChatClient;
use crate::clients::ChatMessage;
use crate::clients::CompletionClient;
use crate::clients::GenerationParams;
use crate::clients::GenerationResponse;
use crate::clients::SearchHit;
use crate::clients::SearchIndexClient;
use crate::errors::Result;
use crate::errors::StageRagError;

fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(32)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| StageRagError::Http(e.to_string()))
}

/// Client for a hosted vector search index
pub struct HttpSearchClient {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSearchClient {
    /// Create a new search client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(endpoint: String, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            endpoint,
            api_key,
            client: build_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl SearchIndexClient for HttpSearchClient {
    async fn similarity_search(&self, query: &str, num_results: usize) -> Result<Vec<SearchHit>> {
        #[derive(Serialize)]
        struct QueryRequest<'a> {
            query: &'a str,
            num_results: usize,
        }

        #[derive(Deserialize)]
        struct QueryResponse {
            results: Vec<SearchHit>,
        }

        let url = format!("{}/query", self.endpoint);
        debug!("Calling vector search API: {}", url);

        let mut request = self.client.post(&url).json(&QueryRequest {
            query,
            num_results,
        });
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| StageRagError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StageRagError::Http(format!(
                "Search API error ({status}): {error_text}"
            )));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| StageRagError::Http(format!("Failed to parse search response: {e}")))?;

        Ok(result.results)
    }
}

/// Client for an OpenAI-compatible text completion endpoint
pub struct HttpCompletionClient {
    endpoint: String,
    model: String,
    client: Client,
}

impl HttpCompletionClient {
    /// Create a new completion client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(endpoint: String, model: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            endpoint,
            model,
            client: build_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<GenerationResponse> {
        #[derive(Serialize)]
        struct CompletionRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            max_tokens: u32,
            temperature: f32,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            stop: Vec<String>,
        }

        let url = format!("{}/completions", self.endpoint);
        debug!("Calling completion API: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&CompletionRequest {
                model: &self.model,
                prompt,
                max_tokens: params.max_tokens,
                temperature: params.temperature,
                stop: params.stop.clone(),
            })
            .send()
            .await
            .map_err(|e| StageRagError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StageRagError::Http(format!(
                "Completion API error ({status}): {error_text}"
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StageRagError::Http(format!("Failed to parse completion response: {e}")))?;

        let text = raw
            .pointer("/choices/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StageRagError::Http("No text in completion response".to_string()))?
            .to_string();

        Ok(GenerationResponse { text, raw })
    }
}

/// Client for an OpenAI-compatible chat completion endpoint
pub struct HttpChatClient {
    endpoint: String,
    model: String,
    client: Client,
}

impl HttpChatClient {
    /// Create a new chat client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(endpoint: String, model: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            endpoint,
            model,
            client: build_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn generate_chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<GenerationResponse> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            max_tokens: u32,
            temperature: f32,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling chat API: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                max_tokens: params.max_tokens,
                temperature: params.temperature,
            })
            .send()
            .await
            .map_err(|e| StageRagError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StageRagError::Http(format!(
                "Chat API error ({status}): {error_text}"
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StageRagError::Http(format!("Failed to parse chat response: {e}")))?;

        let text = raw
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StageRagError::Http("No message content in chat response".to_string()))?
            .to_string();

        Ok(GenerationResponse { text, raw })
    }
}
