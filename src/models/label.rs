use serde::{Deserialize, Serialize};

/// Value used when a field was not found on the label.
pub const NONE_VALUE: &str = "NONE";

/// Value recorded in both fields when every extraction attempt failed.
pub const FAIL_VALUE: &str = "FAIL";

/// The two fields read off a shipping label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFields {
    pub tracking_number: String,
    pub phone_number: String,
}

impl LabelFields {
    /// Build from optional raw values: trims whitespace, absent values become `NONE`.
    pub fn from_raw(tracking_number: Option<&str>, phone_number: Option<&str>) -> Self {
        Self {
            tracking_number: tracking_number.unwrap_or(NONE_VALUE).trim().to_string(),
            phone_number: phone_number.unwrap_or(NONE_VALUE).trim().to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            tracking_number: FAIL_VALUE.to_string(),
            phone_number: FAIL_VALUE.to_string(),
        }
    }
}

impl Default for LabelFields {
    fn default() -> Self {
        Self::from_raw(None, None)
    }
}

/// Terminal outcome for one task. Exactly one exists per submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelResult {
    pub identifier: String,
    pub fields: LabelFields,
    pub error: Option<String>,
}

impl LabelResult {
    pub fn success(identifier: impl Into<String>, fields: LabelFields) -> Self {
        Self {
            identifier: identifier.into(),
            fields,
            error: None,
        }
    }

    /// All attempts exhausted: FAIL sentinels plus the last error message.
    pub fn failed(identifier: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            fields: LabelFields::failed(),
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
