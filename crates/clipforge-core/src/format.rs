//! Validated encoding-identifier value type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A requested encoding/format identifier, e.g. `"137+140"` or `"bestaudio"`.
///
/// Construction validates that the identifier is non-empty once trimmed and
/// contains no whitespace, matching the original's format-id value object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatId(String);

#[derive(Debug, thiserror::Error)]
#[error("invalid format id: {0:?}")]
pub struct InvalidFormatId(String);

impl FormatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for FormatId {
    type Error = InvalidFormatId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(InvalidFormatId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for FormatId {
    type Error = InvalidFormatId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_ids() {
        assert!(FormatId::try_from("137+140").is_ok());
        assert!(FormatId::try_from("best").is_ok());
    }

    #[test]
    fn rejects_empty_or_whitespace() {
        assert!(FormatId::try_from("").is_err());
        assert!(FormatId::try_from("   ").is_err());
        assert!(FormatId::try_from("137 140").is_err());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = FormatId::try_from("  best  ").unwrap();
        assert_eq!(id.as_str(), "best");
    }
}
