//! Answering stage: final QA call against the chat collaborator

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::clients::ChatClient;
use crate::clients::ChatMessage;
use crate::clients::GenerationParams;
use crate::config::AnswerConfig;
use crate::errors::Result;
use crate::errors::StageRagError;
use crate::models::AnswerResult;
use crate::rag::augmenter::backoff_delay;
use crate::rag::prompts::build_qa_prompt;
use crate::rag::prompts::QA_SYSTEM_PROMPT;

/// Answerer for the final question answering call
pub struct Answerer {
    client: Arc<dyn ChatClient>,
    config: AnswerConfig,
}

impl Answerer {
    /// Create a new answerer
    pub fn new(client: Arc<dyn ChatClient>, config: &AnswerConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Answer `question` using the assembled `context`
    ///
    /// An empty context is allowed; the prompt instructs the model to say so
    /// when the context is insufficient.
    ///
    /// # Errors
    /// - `StageRagError::AnswerGeneration` when the chat collaborator is
    ///   unreachable or returns no answer after the retry budget
    pub async fn answer(&self, question: &str, context: &str) -> Result<AnswerResult> {
        let messages = vec![
            ChatMessage::system(QA_SYSTEM_PROMPT),
            ChatMessage::user(build_qa_prompt(question, context)),
        ];
        let params = GenerationParams {
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stop: Vec::new(),
        };

        let mut attempt: u32 = 0;
        loop {
            let call = tokio::time::timeout(
                Duration::from_secs(self.config.timeout_secs),
                self.client.generate_chat(&messages, &params),
            );

            let outcome = match call.await {
                Ok(result) => result,
                Err(_) => Err(StageRagError::Http("answer call timed out".to_string())),
            };

            match outcome {
                Ok(response) => {
                    debug!("Answer generated ({} chars)", response.text.len());
                    return Ok(AnswerResult {
                        answer: response.text,
                        raw_response: response.raw,
                    });
                }
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(StageRagError::AnswerGeneration(e.to_string()));
                    }
                    let delay = backoff_delay(self.config.retry_backoff_ms, attempt);
                    warn!(
                        "Answer attempt {} failed ({}), retrying in {:?}",
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
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::clients::GenerationResponse;

    fn test_config() -> AnswerConfig {
        AnswerConfig {
            endpoint: "http://localhost:11434".to_string(),
            model: "test".to_string(),
            max_retries: 2,
            retry_backoff_ms: 1,
            timeout_secs: 5,
            max_tokens: 256,
            temperature: 0.1,
        }
    }

    /// Records the last prompt and replies with a fixed answer
    struct StubChatClient {
        reply: String,
        last_prompt: Mutex<String>,
    }

    #[async_trait]
    impl ChatClient for StubChatClient {
        async fn generate_chat(
            &self,
            messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<GenerationResponse> {
            let user = messages
                .iter()
                .find(|m| m.role == "user")
                .expect("user message");
            *self.last_prompt.lock().unwrap() = user.content.clone();
            Ok(GenerationResponse {
                text: self.reply.clone(),
                raw: serde_json::json!({"choices": [{"message": {"content": self.reply}}]}),
            })
        }
    }

    #[tokio::test]
    async fn prompt_embeds_question_and_context() {
        let client = Arc::new(StubChatClient {
            reply: "Unity Catalog stores models as...".to_string(),
            last_prompt: Mutex::new(String::new()),
        });
        let answerer = Answerer::new(client.clone(), &test_config());

        let result = answerer
            .answer("How are models stored?", "A\nB")
            .await
            .unwrap();

        assert_eq!(result.answer, "Unity Catalog stores models as...");
        let prompt = client.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("How are models stored?"));
        assert!(prompt.contains("A"));
        assert!(prompt.contains("B"));
    }

    #[tokio::test]
    async fn raw_response_is_preserved() {
        let client = Arc::new(StubChatClient {
            reply: "answer".to_string(),
            last_prompt: Mutex::new(String::new()),
        });
        let answerer = Answerer::new(client, &test_config());

        let result = answerer.answer("q", "ctx").await.unwrap();
        assert!(result.raw_response.pointer("/choices/0/message/content").is_some());
    }

    /// Fails the first two calls, then answers
    struct FlakyChatClient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ChatClient for FlakyChatClient {
        async fn generate_chat(
            &self,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<GenerationResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < 2 {
                return Err(StageRagError::Http("transient failure".to_string()));
            }
            Ok(GenerationResponse {
                text: "late answer".to_string(),
                raw: serde_json::Value::Null,
            })
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let client = Arc::new(FlakyChatClient {
            calls: AtomicU32::new(0),
        });
        let answerer = Answerer::new(client.clone(), &test_config());

        let result = tokio_test::assert_ok!(answerer.answer("q", "ctx").await);
        assert_eq!(result.answer, "late answer");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    /// Always fails
    struct DeadChatClient;

    #[async_trait]
    impl ChatClient for DeadChatClient {
        async fn generate_chat(
            &self,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<GenerationResponse> {
            Err(StageRagError::Http("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn exhausted_retries_tag_the_stage() {
        let answerer = Answerer::new(Arc::new(DeadChatClient), &test_config());

        let err = tokio_test::assert_err!(answerer.answer("q", "ctx").await);
        assert!(matches!(err, StageRagError::AnswerGeneration(_)));
    }
}
