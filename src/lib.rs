pub mod clients;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod rag;

pub use config::AppConfig;
pub use errors::*;
pub use models::AnswerResult;
pub use models::AugmentedCandidate;
pub use models::SearchCandidate;
