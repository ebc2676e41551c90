//! Instruction template for note generation.

use super::PatientContext;
use crate::NonEmptyText;

const DEFAULT_NAME: &str = "Unknown";
const DEFAULT_AGE: u32 = 50;
const DEFAULT_GENDER: &str = "Male";
const DEFAULT_SYMPTOMS: &str = "Not provided";
const DEFAULT_FINDINGS: &str = "Not provided";
const DEFAULT_DIAGNOSIS: &str = "Not specified";

fn or<'a>(value: &'a Option<NonEmptyText>, default: &'a str) -> &'a str {
    value.as_ref().map(NonEmptyText::as_str).unwrap_or(default)
}

/// Render the prompt for `ctx`, substituting defaults for missing fields.
pub fn build_prompt(ctx: &PatientContext) -> String {
    let name = or(&ctx.name, DEFAULT_NAME);
    let age = ctx.age.unwrap_or(DEFAULT_AGE);
    let gender = or(&ctx.gender, DEFAULT_GENDER);
    let symptoms = or(&ctx.symptoms, DEFAULT_SYMPTOMS);
    let findings = or(&ctx.findings, DEFAULT_FINDINGS);
    let diagnosis = or(&ctx.provisional_diagnosis, DEFAULT_DIAGNOSIS);

    format!(
        r#"You are a senior neurologist writing a short, crisp OPD clinical note.

Patient: {name}, {age}-year-old {gender}
Chief Complaint: {symptoms}
MRI Brain: {findings}
Provisional Diagnosis: {diagnosis}

Write a concise, professional clinical note in 4-6 sentences only (exactly like Indian hospital OPD paper).
Then give ONLY ONE correct ICD-10 code.

Return ONLY this JSON:
{{
  "clinical_note": "short note here",
  "icd10_code": "",
  "icd10_description": ""
}}
"#
    )
}
