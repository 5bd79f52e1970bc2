use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageRagError {
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Augmentation error: {failed} of {total} candidates failed")]
    Augmentation { failed: usize, total: usize },

    #[error("Answer generation error: {0}")]
    AnswerGeneration(String),

    #[error("Pipeline deadline of {0:?} exceeded")]
    PipelineTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageRagError {
    /// Name of the pipeline stage (or ambient concern) this error originated from
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Retrieval(_) => "retrieval",
            Self::Augmentation { .. } => "augmentation",
            Self::AnswerGeneration(_) => "answer_generation",
            Self::PipelineTimeout(_) => "pipeline",
            Self::Config(_) => "config",
            Self::Http(_) => "http",
            Self::Serialization(_) => "serialization",
            Self::TomlParsing(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, StageRagError>;
