use serde::{Deserialize, Serialize};

/// Placeholder for a field the completion service could not determine.
pub const UNKNOWN: &str = "Unknown";

/// One manufacturer/model pair extracted from the input.
///
/// Both fields are always present; unresolved values hold [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Manufacturer name
    #[serde(rename = "OEM")]
    pub oem: String,

    /// Model number or name
    #[serde(rename = "Model")]
    pub model: String,
}

impl ExtractionRecord {
    /// Creates a record from its two fields.
    #[must_use]
    pub fn new(oem: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            oem: oem.into(),
            model: model.into(),
        }
    }

    /// Creates a record with both fields set to the sentinel.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    /// Returns true if either field fell back to the sentinel.
    #[must_use]
    pub fn has_unknown(&self) -> bool {
        self.oem == UNKNOWN || self.model == UNKNOWN
    }
}
