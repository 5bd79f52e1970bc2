//! Multi-stage RAG pipeline
//!
//! This module provides the four-stage question answering pipeline:
//! - Retrieval of candidate passages from a vector search service
//! - Concurrent summarization and relevance scoring of each candidate
//! - Context assembly from the top-scored summaries
//! - LLM-based answer generation
//!
//! # Examples
//!
//! ```rust,no_run
//! use stagerag::config::AppConfig;
//! use stagerag::rag::RagPipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let pipeline = RagPipeline::new(&config)?;
//!
//!     let result = pipeline.run("How are models stored?").await?;
//!     println!("Answer: {}", result.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod answerer;
pub mod augmenter;
pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use answerer::Answerer;
pub use augmenter::Augmenter;
pub use context::ContextBuilder;
pub use pipeline::PipelineQuery;
pub use pipeline::RagPipeline;
pub use retriever::Retriever;
