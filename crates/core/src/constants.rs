//! Constants used throughout the EHR core crate.
//!
//! Literal defaults for configuration and for the note contract live here so that the
//! service, the prompt and the tests agree on them.

use std::time::Duration;

/// Default location of the flat clinical records file.
pub const DEFAULT_RECORDS_FILE: &str = "data/FINAL_CLINICAL_NOTES.json";

/// Default chat-completions model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Sampling temperature for note generation.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Output token cap for note generation.
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Per-request timeout for the text generator.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Total attempts (first call included) when the generator reports rate limiting.
///
/// One attempt means a rate-limited call goes straight to the fallback note; backoff is only
/// used when `EHR_LLM_MAX_ATTEMPTS` raises the budget.
pub const DEFAULT_RATE_LIMIT_ATTEMPTS: u32 = 1;

/// Prefix of every note produced without the text generator.
pub const DEMO_MODE_MARKER: &str = "[DEMO MODE - API UNAVAILABLE]";

/// Code attached to every fallback note.
pub const FALLBACK_ICD10_CODE: &str = "R51.9";

/// Description attached to every fallback note.
pub const FALLBACK_ICD10_DESCRIPTION: &str = "Headache, unspecified (Fallback Code)";

/// Code used when the model omits or blanks the code field.
pub const DEFAULT_ICD10_CODE: &str = "Z03.8";
