//! Outcome evaluation.
//!
//! Pure functions that turn a session's violation log into per-user totals
//! and a pass/fail decision.

use crate::session::{Session, SessionOutcome};
use crate::violation::{CATASTROPHIC_THRESHOLD_SECS, Violation};
use serde::{Deserialize, Serialize};

/// Cumulative per-participant ceiling, in seconds.
pub const TOTAL_VIOLATION_LIMIT_SECS: u64 = CATASTROPHIC_THRESHOLD_SECS;

/// Reason recorded when a completed session breaches the cumulative limit.
pub const REASON_LIMIT_EXCEEDED: &str = "Total violations exceeded 5 minute limit";
/// Reason recorded when a timed session is stopped before its target.
pub const REASON_ENDED_EARLY: &str = "Session ended early";

/// Sum of `duration_seconds` over the user's violations.
pub fn total_violation_seconds(violations: &[Violation], user_id: &str) -> u64 {
    violations
        .iter()
        .filter(|v| v.user_id == user_id)
        .map(|v| v.duration_seconds)
        .sum()
}

/// True when every participant stayed under the cumulative limit.
///
/// Vacuously true for an empty participant list.
pub fn is_successful<S: AsRef<str>>(violations: &[Violation], participants: &[S]) -> bool {
    participants
        .iter()
        .all(|id| total_violation_seconds(violations, id.as_ref()) < TOTAL_VIOLATION_LIMIT_SECS)
}

/// Final outcome plus the reason stored alongside a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDecision {
    pub outcome: SessionOutcome,
    pub fail_reason: Option<String>,
}

impl OutcomeDecision {
    pub fn successful() -> Self {
        Self {
            outcome: SessionOutcome::Successful,
            fail_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            outcome: SessionOutcome::Failed,
            fail_reason: Some(reason.into()),
        }
    }
}

/// Decides how a deliberately ended or completed session finishes.
///
/// - marathon: always successful
/// - timed, target reached: successful unless someone exceeded the limit
/// - timed, target not reached: failed as ended early
///
/// Catastrophic terminations bypass this and go through
/// [`catastrophic_fail_reason`].
pub fn decide_outcome(session: &Session, elapsed_seconds: u64) -> OutcomeDecision {
    let Some(target) = session.target_seconds() else {
        return OutcomeDecision::successful();
    };

    if elapsed_seconds < target {
        return OutcomeDecision::failed(REASON_ENDED_EARLY);
    }

    if is_successful(&session.violations, &session.participants) {
        OutcomeDecision::successful()
    } else {
        OutcomeDecision::failed(REASON_LIMIT_EXCEEDED)
    }
}

/// Failure reason naming the offending user and whole minutes away.
pub fn catastrophic_fail_reason(user_label: &str, duration_seconds: u64) -> String {
    let minutes = duration_seconds / 60;
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!("{} left the app for {} {}", user_label, minutes, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use chrono::{TimeZone, Utc};

    fn violation(user: &str, secs: u64) -> Violation {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Violation::new(user, "app-switch", secs, at)
    }

    fn session(duration: u32, is_marathon: bool, violations: Vec<Violation>) -> Session {
        Session {
            id: "s1".into(),
            host_id: "alice".into(),
            participants: vec!["alice".into(), "bob".into()],
            status: SessionStatus::Active,
            duration,
            is_marathon,
            violations,
            created_at: None,
            start_time: None,
            end_time: None,
            room_code: "123456".into(),
            outcome: None,
            fail_reason: None,
            stats_updated_for: Vec::new(),
        }
    }

    #[test]
    fn test_total_violation_seconds() {
        let log = vec![violation("alice", 20), violation("bob", 40), violation("alice", 15)];

        assert_eq!(total_violation_seconds(&log, "alice"), 35);
        assert_eq!(total_violation_seconds(&log, "bob"), 40);
        assert_eq!(total_violation_seconds(&log, "carol"), 0);
        assert_eq!(total_violation_seconds(&[], "alice"), 0);
    }

    #[test]
    fn test_total_is_order_independent_and_additive() {
        let first = vec![violation("alice", 20), violation("alice", 100)];
        let second = vec![violation("alice", 7), violation("bob", 50)];

        let mut combined = first.clone();
        combined.extend(second.clone());
        let mut reversed = combined.clone();
        reversed.reverse();

        assert_eq!(
            total_violation_seconds(&combined, "alice"),
            total_violation_seconds(&first, "alice") + total_violation_seconds(&second, "alice")
        );
        assert_eq!(
            total_violation_seconds(&combined, "alice"),
            total_violation_seconds(&reversed, "alice")
        );
    }

    #[test]
    fn test_is_successful_vacuous_cases() {
        let participants = vec!["alice".to_string()];
        assert!(is_successful(&[], &participants));

        let log = vec![violation("alice", 400)];
        let nobody: [&str; 0] = [];
        assert!(is_successful(&log, &nobody));
    }

    #[test]
    fn test_cumulative_sub_catastrophic_violations_fail() {
        let log = vec![violation("alice", 100), violation("alice", 100), violation("alice", 100)];

        assert!(log.iter().all(|v| v.duration_seconds < CATASTROPHIC_THRESHOLD_SECS));
        assert!(!is_successful(&log, &["alice"]));
        assert!(is_successful(&log[..2], &["alice"]));
    }

    #[test]
    fn test_decide_outcome_marathon_always_succeeds() {
        let s = session(0, true, vec![violation("alice", 299), violation("alice", 299)]);
        assert_eq!(decide_outcome(&s, 60), OutcomeDecision::successful());
    }

    #[test]
    fn test_decide_outcome_ended_early() {
        let s = session(25, false, Vec::new());
        assert_eq!(decide_outcome(&s, 1499), OutcomeDecision::failed(REASON_ENDED_EARLY));
    }

    #[test]
    fn test_decide_outcome_completed() {
        let clean = session(25, false, vec![violation("alice", 15)]);
        assert_eq!(decide_outcome(&clean, 1500), OutcomeDecision::successful());

        let noisy = session(25, false, vec![violation("bob", 200), violation("bob", 150)]);
        assert_eq!(decide_outcome(&noisy, 1500), OutcomeDecision::failed(REASON_LIMIT_EXCEEDED));
    }

    #[test]
    fn test_catastrophic_fail_reason() {
        assert_eq!(catastrophic_fail_reason("alice", 310), "alice left the app for 5 minutes");
        assert_eq!(catastrophic_fail_reason("bob", 60), "bob left the app for 1 minute");
    }
}
