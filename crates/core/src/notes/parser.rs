//! Extraction of the structured reply from raw model output.
//!
//! Models are asked for bare JSON but often wrap it in a Markdown fence or stop mid-object when
//! they hit the token limit. Parsing therefore runs in three steps:
//!
//! 1. strip an enclosing code fence, labelled (```` ```json ````) or bare (```` ``` ````)
//! 2. parse `{clinical_note, icd10_code, icd10_description}`
//! 3. on failure, apply the quote/brace repair once and parse again
//!
//! The repair only balances a trailing quote and closes the object. It can turn a truncated
//! reply into JSON that parses but is clinically incomplete; nothing checks the repaired fields
//! for plausibility, and callers see such results tagged as [`ParsedReply::Repaired`].

use super::{ClinicalNoteResult, DiagnosticCode};
use crate::constants::DEFAULT_ICD10_CODE;
use crate::NonEmptyText;
use serde::Deserialize;
use serde_json::Value;

const LABELLED_FENCE: &str = "```json";
const FENCE: &str = "```";

const GENERATED_NOTE_DEFAULT: &str = "Note generation failed";
const GENERATED_DESCRIPTION_DEFAULT: &str = "Unknown";
const REPAIRED_NOTE_DEFAULT: &str = "Failed";
const REPAIRED_DESCRIPTION_DEFAULT: &str = "Observation";

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("reply is not valid JSON ({first}); after repair: {after_repair}")]
    Malformed { first: String, after_repair: String },
}

/// A successfully parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Clean(ClinicalNoteResult),
    Repaired(ClinicalNoteResult),
}

#[derive(Deserialize)]
struct StructuredReply {
    clinical_note: Option<String>,
    icd10_code: Option<String>,
    icd10_description: Option<String>,
}

impl StructuredReply {
    fn into_generated(self) -> ClinicalNoteResult {
        let note = NonEmptyText::optional(self.clinical_note)
            .map(NonEmptyText::into_string)
            .unwrap_or_else(|| GENERATED_NOTE_DEFAULT.to_string());
        let code = NonEmptyText::optional(self.icd10_code)
            .map(|c| c.as_str().to_uppercase())
            .unwrap_or_else(|| DEFAULT_ICD10_CODE.to_string());
        let description = NonEmptyText::optional(self.icd10_description)
            .map(NonEmptyText::into_string)
            .unwrap_or_else(|| GENERATED_DESCRIPTION_DEFAULT.to_string());

        ClinicalNoteResult::new(note, DiagnosticCode::new(code, description))
    }

    // The repaired path keeps the code exactly as the model wrote it.
    fn into_repaired(self) -> ClinicalNoteResult {
        let note = NonEmptyText::optional(self.clinical_note)
            .map(NonEmptyText::into_string)
            .unwrap_or_else(|| REPAIRED_NOTE_DEFAULT.to_string());
        let code = self
            .icd10_code
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ICD10_CODE.to_string());
        let description = NonEmptyText::optional(self.icd10_description)
            .map(NonEmptyText::into_string)
            .unwrap_or_else(|| REPAIRED_DESCRIPTION_DEFAULT.to_string());

        ClinicalNoteResult::new(note, DiagnosticCode::new(code, description))
    }
}

/// Return the content of the first code fence in `raw`, or `raw` itself, trimmed.
///
/// A bare fence may carry a language tag on its opening line (```` ```JSON ````); the tag is
/// dropped. An unterminated fence runs to the end of the text.
pub fn strip_code_fences(raw: &str) -> &str {
    if let Some(start) = raw.find(LABELLED_FENCE) {
        let body = &raw[start + LABELLED_FENCE.len()..];
        let end = body.find(FENCE).unwrap_or(body.len());
        return body[..end].trim();
    }

    if let Some(start) = raw.find(FENCE) {
        let mut body = &raw[start + FENCE.len()..];
        if let Some((tag, rest)) = body.split_once('\n') {
            let tag = tag.trim();
            if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                body = rest;
            }
        }
        let end = body.find(FENCE).unwrap_or(body.len());
        return body[..end].trim();
    }

    raw.trim()
}

/// Balance an odd trailing quote and close an unterminated object.
pub fn repair(text: &str) -> String {
    let mut repaired = text.trim().to_string();
    if repaired.matches('"').count() % 2 != 0 {
        repaired.push('"');
    }
    if !repaired.ends_with('}') {
        repaired.push('}');
    }
    repaired
}

/// Parse `text` as a JSON object into the structured reply. Arrays and scalars are rejected
/// even when their elements would line up with the fields.
fn parse_object(text: &str) -> Result<StructuredReply, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("reply is not a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Parse a raw model reply into a note.
///
/// # Errors
///
/// Returns `ReplyError::Malformed` when the reply does not parse, even after [`repair`].
pub fn parse_reply(raw: &str) -> Result<ParsedReply, ReplyError> {
    let cleaned = strip_code_fences(raw);

    let first = match parse_object(cleaned) {
        Ok(reply) => return Ok(ParsedReply::Clean(reply.into_generated())),
        Err(e) => e,
    };

    let repaired = repair(cleaned);
    match parse_object(&repaired) {
        Ok(reply) => Ok(ParsedReply::Repaired(reply.into_repaired())),
        Err(after_repair) => Err(ReplyError::Malformed {
            first,
            after_repair,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
  "clinical_note": "X",
  "icd10_code": "g44.2",
  "icd10_description": "Y"
}"#;

    fn clean(reply: ParsedReply) -> ClinicalNoteResult {
        match reply {
            ParsedReply::Clean(result) => result,
            other => panic!("expected clean parse, got {other:?}"),
        }
    }

    fn repaired(reply: ParsedReply) -> ClinicalNoteResult {
        match reply {
            ParsedReply::Repaired(result) => result,
            other => panic!("expected repaired parse, got {other:?}"),
        }
    }

    #[test]
    fn well_formed_reply_is_normalised() {
        let result = clean(parse_reply(WELL_FORMED).unwrap());

        assert_eq!(result.note(), "X");
        assert_eq!(result.codes(), &[DiagnosticCode::new("G44.2", "Y")]);
    }

    #[test]
    fn code_is_trimmed_before_upper_casing() {
        let result = clean(
            parse_reply(r#"{"clinical_note": "X", "icd10_code": "  c71.3 ", "icd10_description": "Y"}"#)
                .unwrap(),
        );
        assert_eq!(result.codes()[0].code, "C71.3");
    }

    #[test]
    fn labelled_fence_matches_unfenced_parse() {
        let fenced = format!("Here you go:\n```json\n{WELL_FORMED}\n```\nThanks");

        assert_eq!(
            parse_reply(&fenced).unwrap(),
            parse_reply(WELL_FORMED).unwrap()
        );
    }

    #[test]
    fn bare_fence_matches_unfenced_parse() {
        let fenced = format!("```\n{WELL_FORMED}\n```");

        assert_eq!(
            parse_reply(&fenced).unwrap(),
            parse_reply(WELL_FORMED).unwrap()
        );
    }

    #[test]
    fn bare_fence_with_upper_case_tag_is_stripped() {
        let fenced = format!("```JSON\n{WELL_FORMED}\n```");
        assert_eq!(strip_code_fences(&fenced), WELL_FORMED);
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn missing_fields_take_generated_defaults() {
        let result = clean(parse_reply("{}").unwrap());

        assert_eq!(result.note(), "Note generation failed");
        assert_eq!(result.codes(), &[DiagnosticCode::new("Z03.8", "Unknown")]);
    }

    #[test]
    fn blank_code_takes_default() {
        let result = clean(
            parse_reply(r#"{"clinical_note": "X", "icd10_code": "  ", "icd10_description": ""}"#)
                .unwrap(),
        );
        assert_eq!(result.codes(), &[DiagnosticCode::new("Z03.8", "Unknown")]);
    }

    #[test]
    fn missing_closing_brace_is_repaired() {
        let reply = r#"{"clinical_note": "Tension-type headache, reassured.""#;

        let result = repaired(parse_reply(reply).unwrap());

        assert_eq!(result.note(), "Tension-type headache, reassured.");
        assert_eq!(result.codes(), &[DiagnosticCode::new("Z03.8", "Observation")]);
    }

    #[test]
    fn truncated_string_is_repaired() {
        let reply = r#"{"icd10_code": "g44.2", "clinical_note": "Patient reports band-like"#;

        let result = repaired(parse_reply(reply).unwrap());

        assert_eq!(result.note(), "Patient reports band-like");
        // not normalised on the repaired path
        assert_eq!(result.codes(), &[DiagnosticCode::new("g44.2", "Observation")]);
    }

    #[test]
    fn repaired_reply_without_note_uses_failed() {
        let result = repaired(parse_reply(r#"{"icd10_code": "G44.2""#).unwrap());
        assert_eq!(result.note(), "Failed");
    }

    #[test]
    fn prose_is_malformed() {
        let err = parse_reply("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, ReplyError::Malformed { .. }));
    }

    #[test]
    fn array_reply_is_malformed() {
        let err = parse_reply(r#"["X", "g44.2", "Y"]"#).unwrap_err();
        assert!(matches!(err, ReplyError::Malformed { .. }));
    }

    #[test]
    fn scalar_reply_is_malformed() {
        assert!(parse_reply(r#""just a string""#).is_err());
        assert!(parse_reply("42").is_err());
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        let err = parse_reply(r#"{"clinical_note": 12, "icd10_code": "G44.2"}"#).unwrap_err();
        assert!(matches!(err, ReplyError::Malformed { .. }));
    }

    #[test]
    fn repair_balances_quote_then_closes_object() {
        assert_eq!(repair(r#"{"a": "b"#), r#"{"a": "b"}"#);
        assert_eq!(repair(r#"{"a": "b"}"#), r#"{"a": "b"}"#);
        assert_eq!(repair("  {\"a\": 1 "), "{\"a\": 1}");
    }
}
