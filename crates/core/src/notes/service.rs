//! Note generation orchestration.

use super::generator::{CompletionRequest, GeneratorError, TextGenerator};
use super::openai::OpenAiClient;
use super::parser::{parse_reply, ParsedReply};
use super::prompt::build_prompt;
use super::retry::RetryPolicy;
use super::{FallbackReason, NoteOutcome, NoteSource, PatientContext};
use crate::{EhrResult, LlmConfig};
use std::sync::Arc;

/// Generates clinical notes, falling back to a deterministic note on any failure.
#[derive(Clone)]
pub struct NoteService {
    generator: Option<Arc<dyn TextGenerator>>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl NoteService {
    /// Create a service around an explicit generator.
    ///
    /// `None` puts the service permanently in degraded mode.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, cfg: &LlmConfig) -> Self {
        Self {
            generator,
            model: cfg.model().to_string(),
            temperature: cfg.temperature(),
            max_tokens: cfg.max_tokens(),
            retry: cfg.retry().clone(),
        }
    }

    /// Create a service backed by the OpenAI-compatible client when an API key is configured.
    ///
    /// # Errors
    ///
    /// Returns `EhrError::HttpClient` if the HTTP client cannot be built.
    pub fn from_config(cfg: &LlmConfig) -> EhrResult<Self> {
        let generator = OpenAiClient::from_config(cfg)?
            .map(|client| Arc::new(client) as Arc<dyn TextGenerator>);
        Ok(Self::new(generator, cfg))
    }

    /// True when no generator is configured and every note will be the fallback.
    pub fn is_degraded(&self) -> bool {
        self.generator.is_none()
    }

    /// Produce a note for `ctx`. Never fails.
    pub async fn generate_note(&self, ctx: &PatientContext) -> NoteOutcome {
        let Some(generator) = &self.generator else {
            tracing::debug!("no text generator configured; using fallback note");
            return NoteOutcome::fallback(ctx, FallbackReason::CredentialMissing);
        };

        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: build_prompt(ctx),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let raw = match self.complete_with_retry(generator.as_ref(), &request).await {
            Ok(raw) => raw,
            Err(reason) => return NoteOutcome::fallback(ctx, reason),
        };

        match parse_reply(&raw) {
            Ok(ParsedReply::Clean(result)) => NoteOutcome {
                result,
                source: NoteSource::Generated,
            },
            Ok(ParsedReply::Repaired(result)) => {
                tracing::warn!("{} reply only parsed after repair", generator.name());
                NoteOutcome {
                    result,
                    source: NoteSource::Repaired,
                }
            }
            Err(e) => {
                tracing::error!("Failed to parse {} reply: {:?}", generator.name(), e);
                NoteOutcome::fallback(ctx, FallbackReason::MalformedResponse(e.to_string()))
            }
        }
    }

    async fn complete_with_retry(
        &self,
        generator: &dyn TextGenerator,
        request: &CompletionRequest,
    ) -> Result<String, FallbackReason> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            match generator.complete(request).await {
                Ok(raw) => return Ok(raw),
                Err(GeneratorError::RateLimited(detail)) if attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} rate limited (attempt {}/{}), retrying in {:?}: {}",
                        generator.name(),
                        attempt,
                        max_attempts,
                        delay,
                        detail
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(GeneratorError::RateLimited(detail)) => {
                    tracing::error!(
                        "{} still rate limited after {} attempt(s): {}",
                        generator.name(),
                        attempt,
                        detail
                    );
                    return Err(FallbackReason::RateLimited { attempts: attempt });
                }
                Err(GeneratorError::Auth(detail)) => {
                    tracing::error!("{} rejected credentials: {}", generator.name(), detail);
                    return Err(FallbackReason::AuthFailure(detail));
                }
                Err(GeneratorError::Other(detail)) => {
                    tracing::error!("{} call failed: {}", generator.name(), detail);
                    return Err(FallbackReason::Unclassified(detail));
                }
            }
        }
    }
}
