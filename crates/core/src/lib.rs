//! # EHR Core
//!
//! Core business logic for the AI-assisted EHR backend.
//!
//! This crate contains:
//! - Clinical note generation against an OpenAI-compatible model, with a deterministic
//!   fallback whenever the model is unavailable ([`notes`])
//! - The flat-file clinical records store ([`records`])
//! - Startup configuration ([`config`])
//!
//! **No API concerns**: HTTP servers and request mapping belong in `api-rest`; wire types live in
//! `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod notes;
pub mod records;

pub use api_shared::ClinicalRecord;
pub use config::{records_path_from_env_value, CoreConfig, LlmConfig};
pub use ehr_types::NonEmptyText;
pub use error::{EhrError, EhrResult};
pub use notes::{
    ClinicalNoteResult, DiagnosticCode, FallbackReason, NoteOutcome, NoteService, NoteSource,
    PatientContext, RetryPolicy, TextGenerator,
};
pub use records::{seed_records, RecordStore};
