//! Clinical note generation with degraded-mode fallback.
//!
//! [`NoteService::generate_note`] turns a [`PatientContext`] into a [`NoteOutcome`] and never
//! fails: every failure of the external text generator (missing credentials, rejected key,
//! rate limiting, unusable reply, anything else) ends in a deterministic fallback note. The
//! outcome records *why* through [`NoteSource`], so callers branch on structure instead of
//! looking for [`DEMO_MODE_MARKER`](crate::constants::DEMO_MODE_MARKER) in the note text.
//!
//! Layout:
//! - [`generator`]: the `TextGenerator` seam and its failure classification
//! - [`openai`]: OpenAI-compatible chat-completions implementation
//! - [`prompt`]: the fixed instruction template
//! - [`parser`]: fence stripping, structured parse and the one-shot repair pass
//! - [`fallback`]: the deterministic synthesiser
//! - [`retry`]: backoff policy for rate-limited calls
//! - [`service`]: orchestration

pub mod fallback;
pub mod generator;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod service;

pub use generator::{CompletionRequest, GeneratorError, TextGenerator};
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;
pub use service::NoteService;

use crate::NonEmptyText;
use serde::Serialize;

/// Normalised description of a patient encounter.
///
/// Every field is optional. Blank text is treated as missing, and missing fields are replaced
/// by fixed defaults when the prompt or the fallback note is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientContext {
    pub name: Option<NonEmptyText>,
    pub age: Option<u32>,
    pub gender: Option<NonEmptyText>,
    pub symptoms: Option<NonEmptyText>,
    pub findings: Option<NonEmptyText>,
    pub provisional_diagnosis: Option<NonEmptyText>,
}

impl PatientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl AsRef<str>) -> Self {
        self.name = NonEmptyText::optional(Some(name));
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_gender(mut self, gender: impl AsRef<str>) -> Self {
        self.gender = NonEmptyText::optional(Some(gender));
        self
    }

    pub fn with_symptoms(mut self, symptoms: impl AsRef<str>) -> Self {
        self.symptoms = NonEmptyText::optional(Some(symptoms));
        self
    }

    pub fn with_findings(mut self, findings: impl AsRef<str>) -> Self {
        self.findings = NonEmptyText::optional(Some(findings));
        self
    }

    pub fn with_provisional_diagnosis(mut self, diagnosis: impl AsRef<str>) -> Self {
        self.provisional_diagnosis = NonEmptyText::optional(Some(diagnosis));
        self
    }
}

/// One diagnostic code attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticCode {
    pub code: String,
    pub description: String,
}

impl DiagnosticCode {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// A finished clinical note.
///
/// Fields are private: a result is built once, with exactly one code, and then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicalNoteResult {
    note: String,
    codes: Vec<DiagnosticCode>,
}

impl ClinicalNoteResult {
    pub(crate) fn new(note: impl Into<String>, code: DiagnosticCode) -> Self {
        Self {
            note: note.into(),
            codes: vec![code],
        }
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn codes(&self) -> &[DiagnosticCode] {
        &self.codes
    }
}

/// Why a request was answered with the fallback note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No API key was configured.
    CredentialMissing,
    /// The generator rejected the credentials.
    AuthFailure(String),
    /// The generator kept rate limiting until the retry budget ran out.
    RateLimited { attempts: u32 },
    /// The reply could not be parsed, even after repair.
    MalformedResponse(String),
    /// Any other failure (network, timeout, unexpected status or payload).
    Unclassified(String),
}

impl FallbackReason {
    /// Stable identifier for API responses and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            FallbackReason::CredentialMissing => "credential_missing",
            FallbackReason::AuthFailure(_) => "auth_failure",
            FallbackReason::RateLimited { .. } => "rate_limited",
            FallbackReason::MalformedResponse(_) => "malformed_response",
            FallbackReason::Unclassified(_) => "unclassified",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::CredentialMissing => write!(f, "no API key configured"),
            FallbackReason::AuthFailure(detail) => write!(f, "authentication failed: {detail}"),
            FallbackReason::RateLimited { attempts } => {
                write!(f, "rate limited after {attempts} attempt(s)")
            }
            FallbackReason::MalformedResponse(detail) => write!(f, "malformed reply: {detail}"),
            FallbackReason::Unclassified(detail) => write!(f, "unexpected failure: {detail}"),
        }
    }
}

/// How a note was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteSource {
    Generated,
    /// Generated, but the reply only parsed after the quote/brace repair.
    Repaired,
    Fallback(FallbackReason),
}

/// The result of [`NoteService::generate_note`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteOutcome {
    pub result: ClinicalNoteResult,
    pub source: NoteSource,
}

impl NoteOutcome {
    pub(crate) fn fallback(ctx: &PatientContext, reason: FallbackReason) -> Self {
        Self {
            result: fallback::synthesize(ctx),
            source: NoteSource::Fallback(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, NoteSource::Fallback(_))
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match &self.source {
            NoteSource::Fallback(reason) => Some(reason),
            _ => None,
        }
    }
}
