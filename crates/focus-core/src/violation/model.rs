//! Violation domain model.

use super::classifier::{ViolationCategory, classify};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Tag used when the presence monitor reports a plain app switch.
pub const DEFAULT_VIOLATION_TYPE: &str = "app-switch";

/// One detected distraction event, appended to a session and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Participant who left the app
    pub user_id: String,
    /// Wall-clock detection time (ISO 8601)
    pub timestamp: String,
    /// Free-form tag, e.g. "app-switch"
    #[serde(rename = "type")]
    pub kind: String,
    /// Absence length in whole seconds
    pub duration_seconds: u64,
    /// Derived from `duration_seconds`
    pub category: ViolationCategory,
}

impl Violation {
    /// Builds a fully-populated record, deriving the category.
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        duration_seconds: u64,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: detected_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: kind.into(),
            duration_seconds,
            category: classify(duration_seconds),
        }
    }
}

/// Result of recording a violation, returned so the caller can decide whether
/// to alert the user and/or terminate the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub category: ViolationCategory,
    pub is_catastrophic: bool,
}

impl ViolationReport {
    pub fn for_category(category: ViolationCategory) -> Self {
        Self {
            category,
            is_catastrophic: category == ViolationCategory::Catastrophic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_derives_category() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let violation = Violation::new("alice", DEFAULT_VIOLATION_TYPE, 45, at);

        assert_eq!(violation.category, ViolationCategory::Medium);
        assert_eq!(violation.timestamp, "2024-05-01T09:30:00.000Z");
    }

    #[test]
    fn test_wire_field_names() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let value = serde_json::to_value(Violation::new("alice", "app-switch", 5, at)).unwrap();

        assert_eq!(value["userId"], "alice");
        assert_eq!(value["type"], "app-switch");
        assert_eq!(value["durationSeconds"], 5);
        assert_eq!(value["category"], "minor");
    }
}
