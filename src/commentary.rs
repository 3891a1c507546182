use crate::config::ReportConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a commentary paragraph could not be produced. Never fatal: the report
/// substitutes placeholder text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    InvalidResponse(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("commentary disabled")]
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl GenerationSettings {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Turns a free-text request into a commentary paragraph.
pub trait CommentaryGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

impl<G: CommentaryGenerator + ?Sized> CommentaryGenerator for &G {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt)
    }
}

/// Generator used when commentary is switched off; every section gets its
/// placeholder text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommentary;

impl CommentaryGenerator for NoCommentary {
    fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}
