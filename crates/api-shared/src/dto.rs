//! Request and response bodies for the EHR REST API.
//!
//! Field names follow the JSON the frontend already speaks (`snake_case`, `icd10`,
//! `enhanced_image_base64`), so these types are the contract and should not be renamed.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub status: String,
}

/// Body for `POST /generate-note`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerateNoteReq {
    /// Identifier shown to the model as the patient's name.
    pub patient_id: String,
    pub age: u32,
    pub gender: String,
    pub chief_complaint: String,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub observations: String,
    pub prelim_diagnosis: String,
}

/// One diagnostic code attached to a generated note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Icd10Code {
    pub code: String,
    pub description: String,
}

/// Where a note came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteSourceKind {
    /// Parsed directly from the model reply.
    Generated,
    /// Parsed from the model reply after the quote/brace repair pass.
    Repaired,
    /// Synthesised locally; the model was unavailable or unusable.
    Fallback,
}

/// Response for `POST /generate-note`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerateNoteRes {
    pub patient_id: String,
    pub note: String,
    pub icd10: Vec<Icd10Code>,
    pub source: NoteSourceKind,
    /// Machine-readable cause when `source` is `fallback`.
    pub fallback_reason: Option<String>,
}

/// Response for `POST /enhance-image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EnhanceImageRes {
    pub enhanced_image_base64: String,
}

/// Error body used by endpoints that report failures as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

/// A stored clinical record, as kept in the flat records file.
///
/// Every field defaults when absent or `null` so that older or hand-edited files still load.
/// Keys not listed here are ignored by this view; the store keeps them on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ClinicalRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub patient_id: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub patient_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub age: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub gender: String,
    #[serde(deserialize_with = "null_as_default")]
    pub provisional_diagnosis: String,
    #[serde(deserialize_with = "null_as_default")]
    pub symptoms: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mri_findings: String,
    #[serde(deserialize_with = "null_as_default")]
    pub clinical_note: String,
    #[serde(deserialize_with = "null_as_default")]
    pub icd10_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub icd10_description: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
