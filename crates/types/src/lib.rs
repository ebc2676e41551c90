//! Validated text types shared across the EHR workspace.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Like [`NonEmptyText::new`], but treats blank input as absent.
    ///
    /// Request fields and model replies routinely carry empty strings where a value is
    /// missing; this folds both cases into `None`.
    pub fn optional(input: Option<impl AsRef<str>>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_surrounding_whitespace() {
        let text = NonEmptyText::new("  Severe headache \n").unwrap();
        assert_eq!(text.as_str(), "Severe headache");
    }

    #[test]
    fn new_rejects_blank_input() {
        assert!(matches!(NonEmptyText::new("   "), Err(TextError::Empty)));
        assert!(matches!(NonEmptyText::new(""), Err(TextError::Empty)));
    }

    #[test]
    fn optional_folds_blank_into_none() {
        assert_eq!(NonEmptyText::optional(None::<&str>), None);
        assert_eq!(NonEmptyText::optional(Some("  ")), None);
        assert_eq!(
            NonEmptyText::optional(Some("Male")).map(NonEmptyText::into_string),
            Some("Male".to_string())
        );
    }

    #[test]
    fn deserialize_rejects_empty_string() {
        let err = serde_json::from_str::<NonEmptyText>("\"\"");
        assert!(err.is_err());

        let ok: NonEmptyText = serde_json::from_str("\" G44.2 \"").unwrap();
        assert_eq!(ok.as_str(), "G44.2");
    }
}
