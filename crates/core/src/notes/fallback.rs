//! Deterministic note used whenever the text generator is unavailable or unusable.

use super::{ClinicalNoteResult, DiagnosticCode, PatientContext};
use crate::constants::{DEMO_MODE_MARKER, FALLBACK_ICD10_CODE, FALLBACK_ICD10_DESCRIPTION};
use crate::NonEmptyText;

const UNKNOWN: &str = "Unknown";

fn or_unknown(value: &Option<NonEmptyText>) -> &str {
    value.as_ref().map(NonEmptyText::as_str).unwrap_or(UNKNOWN)
}

/// Build the fallback note for `ctx`. Pure: the same context always yields the same result.
pub fn synthesize(ctx: &PatientContext) -> ClinicalNoteResult {
    let age = ctx
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let note = format!(
        "{DEMO_MODE_MARKER}\n\
         Patient {name} (Age: {age}) presented with {symptoms}. \
         MRI imaging indicates {findings}. \
         Based on clinical presentation, the provisional diagnosis is {diagnosis}. \
         Recommended course of management includes symptomatic relief and follow-up in neurology OPD.",
        name = or_unknown(&ctx.name),
        symptoms = or_unknown(&ctx.symptoms),
        findings = or_unknown(&ctx.findings),
        diagnosis = or_unknown(&ctx.provisional_diagnosis),
    );

    ClinicalNoteResult::new(
        note,
        DiagnosticCode::new(FALLBACK_ICD10_CODE, FALLBACK_ICD10_DESCRIPTION),
    )
}
