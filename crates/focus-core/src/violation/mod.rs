//! Violation domain module.
//!
//! # Module Structure
//!
//! - `classifier`: Absence duration to severity mapping
//! - `model`: Recorded violation entity (`Violation`)

mod classifier;
mod model;

pub use classifier::{
    CATASTROPHIC_THRESHOLD_SECS, LARGE_THRESHOLD_SECS, MEDIUM_THRESHOLD_SECS, ViolationCategory,
    classify, is_catastrophic,
};
pub use model::{DEFAULT_VIOLATION_TYPE, Violation, ViolationReport};
