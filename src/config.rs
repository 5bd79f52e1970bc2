use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub backtrace: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the vector search service
    pub endpoint: String,
    /// Optional bearer token for the search service
    #[serde(default)]
    pub api_key: Option<String>,
    /// Upper bound on `top_k` accepted by the retriever
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Number of candidates requested when the caller does not specify one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Treat an empty search response as a retrieval failure
    #[serde(default = "default_true")]
    pub require_results: bool,
    #[serde(default = "default_call_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeConfig {
    /// Base URL of the completion model endpoint
    pub endpoint: String,
    pub model: String,
    /// Maximum concurrent summarization calls in flight
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Fraction of failed candidates (0.0..=1.0) above which the whole
    /// augmentation stage fails
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f32,
    #[serde(default = "default_call_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_summary_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Base URL of the chat model endpoint
    pub endpoint: String,
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_answer_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How many augmented candidates make it into the QA context
    #[serde(default = "default_context_top_k")]
    pub context_top_k: usize,
    /// Overall wall-clock budget for one pipeline run
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_max_top_k() -> usize {
    100
}

fn default_top_k() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_max_in_flight() -> usize {
    8
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_failure_threshold() -> f32 {
    0.5
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_summary_max_tokens() -> u32 {
    256
}

fn default_answer_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_context_top_k() -> usize {
    3
}

fn default_deadline_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
    pub search: SearchConfig,
    pub summarize: SummarizeConfig,
    pub answer: AnswerConfig,
    #[serde(default = "default_pipeline")]
    pub pipeline: PipelineConfig,
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        backtrace: false,
    }
}

fn default_pipeline() -> PipelineConfig {
    PipelineConfig {
        context_top_k: default_context_top_k(),
        deadline_secs: default_deadline_secs(),
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default config file path
    pub fn load() -> crate::Result<Self> {
        // Try to load from config.toml first, then fall back to config.example.toml
        if Path::new("config.toml").exists() {
            Self::from_file("config.toml")
        } else if Path::new("config.example.toml").exists() {
            eprintln!(
                "Warning: Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")
        } else {
            Err(crate::StageRagError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config file found. Please create config.toml or config.example.toml",
            )))
        }
    }

    /// Reject configurations that cannot produce a working pipeline
    pub fn validate(&self) -> crate::Result<()> {
        for (name, endpoint) in [
            ("search.endpoint", &self.search.endpoint),
            ("summarize.endpoint", &self.summarize.endpoint),
            ("answer.endpoint", &self.answer.endpoint),
        ] {
            url::Url::parse(endpoint).map_err(|e| {
                crate::StageRagError::Config(format!("invalid {name} `{endpoint}`: {e}"))
            })?;
        }

        if self.search.max_top_k == 0 {
            return Err(crate::StageRagError::Config(
                "search.max_top_k must be positive".to_string(),
            ));
        }
        if self.search.default_top_k == 0 || self.search.default_top_k > self.search.max_top_k {
            return Err(crate::StageRagError::Config(format!(
                "search.default_top_k must be in 1..={}",
                self.search.max_top_k
            )));
        }
        if self.summarize.max_in_flight == 0 {
            return Err(crate::StageRagError::Config(
                "summarize.max_in_flight must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.summarize.failure_threshold) {
            return Err(crate::StageRagError::Config(
                "summarize.failure_threshold must be within 0.0..=1.0".to_string(),
            ));
        }
        if self.pipeline.context_top_k == 0 {
            return Err(crate::StageRagError::Config(
                "pipeline.context_top_k must be positive".to_string(),
            ));
        }
        if self.pipeline.deadline_secs == 0 {
            return Err(crate::StageRagError::Config(
                "pipeline.deadline_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Overall pipeline deadline
    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline.deadline_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: default_logging(),
            search: SearchConfig {
                endpoint: "http://localhost:7700".to_string(),
                api_key: None,
                max_top_k: default_max_top_k(),
                default_top_k: default_top_k(),
                require_results: true,
                timeout_secs: default_call_timeout_secs(),
            },
            summarize: SummarizeConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "gemma3:27b".to_string(),
                max_in_flight: default_max_in_flight(),
                max_retries: default_max_retries(),
                retry_backoff_ms: default_backoff_ms(),
                failure_threshold: default_failure_threshold(),
                timeout_secs: default_call_timeout_secs(),
                max_tokens: default_summary_max_tokens(),
                temperature: default_temperature(),
            },
            answer: AnswerConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "gemma3:27b".to_string(),
                max_retries: default_max_retries(),
                retry_backoff_ms: default_backoff_ms(),
                timeout_secs: default_call_timeout_secs(),
                max_tokens: default_answer_max_tokens(),
                temperature: default_temperature(),
            },
            pipeline: default_pipeline(),
        }
    }
}
