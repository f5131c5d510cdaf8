//! Violation severity classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absences from this many seconds up are `Medium`.
pub const MEDIUM_THRESHOLD_SECS: u64 = 30;
/// Absences from this many seconds up are `Large`.
pub const LARGE_THRESHOLD_SECS: u64 = 120;
/// A single absence this long terminates the session. The same ceiling
/// applies to each participant's cumulative total.
pub const CATASTROPHIC_THRESHOLD_SECS: u64 = 300;

/// Severity of a single absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationCategory {
    Minor,
    Medium,
    Large,
    Catastrophic,
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ViolationCategory::Minor => "minor",
            ViolationCategory::Medium => "medium",
            ViolationCategory::Large => "large",
            ViolationCategory::Catastrophic => "catastrophic",
        };
        f.write_str(label)
    }
}

/// Maps an absence duration to its category.
///
/// Thresholds are half-open: `[0, 30)` minor, `[30, 120)` medium,
/// `[120, 300)` large, `[300, ∞)` catastrophic.
pub fn classify(duration_seconds: u64) -> ViolationCategory {
    match duration_seconds {
        d if d < MEDIUM_THRESHOLD_SECS => ViolationCategory::Minor,
        d if d < LARGE_THRESHOLD_SECS => ViolationCategory::Medium,
        d if d < CATASTROPHIC_THRESHOLD_SECS => ViolationCategory::Large,
        _ => ViolationCategory::Catastrophic,
    }
}

/// Whether a single absence of this length ends the session on the spot.
pub fn is_catastrophic(duration_seconds: u64) -> bool {
    classify(duration_seconds) == ViolationCategory::Catastrophic
}
