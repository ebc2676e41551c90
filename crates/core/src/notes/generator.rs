//! The text-generation seam.

use async_trait::async_trait;

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Classified failures of a completion call.
///
/// The classes drive policy: `RateLimited` is retried with backoff, `Auth` never is, and
/// `Other` covers everything the service cannot act on.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("text generation failed: {0}")]
    Other(String),
}

/// A remote model that turns a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion and return the raw reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GeneratorError>;

    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;
}
