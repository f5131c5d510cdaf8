use chrono::{TimeZone, Utc};
use focus_core::clock::{Clock, ManualClock};
use focus_core::error::FocusError;
use focus_core::outcome::{
    REASON_ENDED_EARLY, REASON_LIMIT_EXCEEDED, catastrophic_fail_reason, decide_outcome,
    is_successful, total_violation_seconds,
};
use focus_core::room_code::{RoomCodeGenerator, is_valid_code};
use focus_core::session::{
    RelinquishAction, SESSIONS_COLLECTION, SessionEvent, SessionLifecycle, SessionOutcome,
    SessionStatus,
};
use focus_core::store::{DocumentStore, FieldValue, Fields};
use focus_core::violation::{Violation, ViolationCategory};
use focus_infrastructure::MemoryDocumentStore;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<MemoryDocumentStore>,
    lifecycle: SessionLifecycle,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryDocumentStore::with_clock(clock.clone()));
    let lifecycle =
        SessionLifecycle::with_room_codes(store.clone(), RoomCodeGenerator::with_seed(10, 42));
    Harness {
        clock,
        store,
        lifecycle,
    }
}

impl Harness {
    async fn session(&self, id: &str) -> focus_core::session::Session {
        self.lifecycle.get_session(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_create_puts_host_first_and_dedups() {
    let h = harness();
    let id = h
        .lifecycle
        .create(
            "alice",
            &["bob".to_string(), "alice".to_string(), "bob".to_string()],
            25,
            false,
        )
        .await
        .unwrap();

    let session = h.session(&id).await;
    assert_eq!(session.participants, vec!["alice", "bob"]);
    assert_eq!(session.host_id, "alice");
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.duration, 25);
    assert!(is_valid_code(&session.room_code));
    assert_eq!(session.created_at, Some(h.clock.now()));
    assert_eq!(session.start_time, None);
    assert_eq!(session.outcome, None);
}

#[tokio::test]
async fn test_marathon_forces_zero_duration() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 90, true).await.unwrap();

    let session = h.session(&id).await;
    assert!(session.is_marathon);
    assert_eq!(session.duration, 0);
}

#[tokio::test]
async fn test_start_stamps_store_time_and_rejects_restart() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();

    h.clock.advance_secs(30);
    h.lifecycle.start(&id).await.unwrap();
    let session = h.session(&id).await;
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.start_time, Some(h.clock.now()));

    let err = h.lifecycle.start(&id).await.unwrap_err();
    assert_eq!(
        err,
        FocusError::invalid_transition(id.clone(), SessionStatus::Active, "start")
    );
}

#[tokio::test]
async fn test_end_requires_active() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();

    let err = h
        .lifecycle
        .end(&id, SessionOutcome::Successful, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FocusError::InvalidTransition { status: SessionStatus::Pending, .. }));

    h.lifecycle.start(&id).await.unwrap();
    h.lifecycle
        .end(&id, SessionOutcome::Failed, Some(REASON_ENDED_EARLY.into()))
        .await
        .unwrap();

    let err = h.lifecycle.terminate(&id, "late").await.unwrap_err();
    assert!(err.is_ended());
    let session = h.session(&id).await;
    assert_eq!(session.fail_reason.as_deref(), Some(REASON_ENDED_EARLY));
}

#[tokio::test]
async fn test_successful_end_drops_reason() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 0, true).await.unwrap();
    h.lifecycle.start(&id).await.unwrap();

    h.lifecycle
        .end(&id, SessionOutcome::Successful, Some("ignored".into()))
        .await
        .unwrap();

    let session = h.session(&id).await;
    assert_eq!(session.outcome, Some(SessionOutcome::Successful));
    assert_eq!(session.fail_reason, None);
    assert_eq!(session.end_time, Some(h.clock.now()));
}

#[tokio::test]
async fn test_cancel_only_while_pending() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    let mut sub = h.lifecycle.subscribe_to_session(&id).await.unwrap();
    assert!(matches!(sub.next().await, Some(Ok(SessionEvent::Updated(_)))));

    h.lifecycle.cancel(&id).await.unwrap();
    assert!(h.lifecycle.get_session(&id).await.unwrap().is_none());
    assert!(matches!(sub.next().await, Some(Ok(SessionEvent::Removed))));

    let err = h.lifecycle.cancel(&id).await.unwrap_err();
    assert!(err.is_not_found());

    let active = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.lifecycle.start(&active).await.unwrap();
    let err = h.lifecycle.cancel(&active).await.unwrap_err();
    assert!(matches!(err, FocusError::InvalidTransition { operation: "cancel", .. }));
}

#[tokio::test]
async fn test_join_by_code_errors_by_status() {
    let h = harness();

    let err = h.lifecycle.join_by_code("000000", "bob").await.unwrap_err();
    assert!(err.is_not_found());

    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    let code = h.session(&id).await.room_code;
    h.lifecycle.start(&id).await.unwrap();

    let err = h.lifecycle.join_by_code(&code, "bob").await.unwrap_err();
    assert_eq!(err, FocusError::AlreadyStarted { session_id: id.clone() });

    h.lifecycle
        .end(&id, SessionOutcome::Failed, Some(REASON_ENDED_EARLY.into()))
        .await
        .unwrap();
    let err = h.lifecycle.join_by_code(&code, "bob").await.unwrap_err();
    assert_eq!(err, FocusError::Ended { session_id: id });
}

#[tokio::test]
async fn test_join_prefers_pending_session_reusing_a_code() {
    let h = harness();
    let old = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    let code = h.session(&old).await.room_code;
    h.lifecycle.start(&old).await.unwrap();
    h.lifecycle
        .end(&old, SessionOutcome::Failed, Some(REASON_ENDED_EARLY.into()))
        .await
        .unwrap();

    let new = h.lifecycle.create("carol", &[], 25, false).await.unwrap();
    let mut fields = Fields::new();
    fields.insert("roomCode".into(), FieldValue::Value(json!(code.clone())));
    h.store
        .update_document(SESSIONS_COLLECTION, &new, fields)
        .await
        .unwrap();

    assert_eq!(h.lifecycle.join_by_code(&code, "bob").await.unwrap(), new);
}

#[tokio::test]
async fn test_scenario_d_join_twice_is_idempotent() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    let code = h.session(&id).await.room_code;

    assert_eq!(h.lifecycle.join_by_code(&code, "bob").await.unwrap(), id);
    let writes = h.store.write_count();
    assert_eq!(h.lifecycle.join_by_code(&code, "bob").await.unwrap(), id);

    assert_eq!(h.store.write_count(), writes);
    assert_eq!(h.session(&id).await.participants, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_concurrent_joins_all_survive() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    let code = h.session(&id).await.room_code;

    let (a, b, c) = tokio::join!(
        h.lifecycle.join_by_code(&code, "bob"),
        h.lifecycle.join_by_code(&code, "carol"),
        h.lifecycle.join_by_code(&code, "dave"),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let mut participants = h.session(&id).await.participants;
    participants.sort();
    assert_eq!(participants, vec!["alice", "bob", "carol", "dave"]);
}

#[tokio::test]
async fn test_leave_is_unconditional_and_tolerates_missing_session() {
    let h = harness();
    let id = h
        .lifecycle
        .create("alice", &["bob".to_string()], 25, false)
        .await
        .unwrap();
    h.lifecycle.start(&id).await.unwrap();

    h.lifecycle.leave(&id, "bob").await.unwrap();
    h.lifecycle.leave(&id, "alice").await.unwrap();

    let session = h.session(&id).await;
    assert!(session.participants.is_empty());
    assert_eq!(session.status, SessionStatus::Active);

    h.lifecycle.leave("missing", "bob").await.unwrap();
}

#[tokio::test]
async fn test_active_session_lookup_and_relinquish() {
    let h = harness();
    assert!(h.lifecycle.get_user_active_session("bob").await.unwrap().is_none());

    let hosted = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    let code = h.session(&hosted).await.room_code;
    h.lifecycle.join_by_code(&code, "bob").await.unwrap();

    let live = h.lifecycle.get_user_active_session("bob").await.unwrap().unwrap();
    assert_eq!(live.id, hosted);

    assert_eq!(
        h.lifecycle.relinquish(&hosted, "bob").await.unwrap(),
        RelinquishAction::Left
    );
    assert!(h.lifecycle.get_user_active_session("bob").await.unwrap().is_none());

    assert_eq!(
        h.lifecycle.relinquish(&hosted, "alice").await.unwrap(),
        RelinquishAction::Cancelled
    );
    assert!(h.lifecycle.get_session(&hosted).await.unwrap().is_none());
}

#[tokio::test]
async fn test_user_sessions_listed_newest_first() {
    let h = harness();
    let first = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.clock.advance_secs(60);
    let second = h.lifecycle.create("alice", &[], 50, false).await.unwrap();
    h.lifecycle.create("zoe", &[], 25, false).await.unwrap();

    let ids: Vec<String> = h
        .lifecycle
        .get_user_sessions("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn test_store_failures_surface() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.store.set_available(false);

    assert!(h.lifecycle.start(&id).await.unwrap_err().is_store_unavailable());
    assert!(
        h.lifecycle
            .add_violation(&id, "alice", "app-switch", 10)
            .await
            .unwrap_err()
            .is_store_unavailable()
    );
    assert!(h.lifecycle.leave(&id, "alice").await.unwrap_err().is_store_unavailable());
}

#[tokio::test]
async fn test_violation_on_deleted_session_is_not_found() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.lifecycle.cancel(&id).await.unwrap();

    let err = h
        .lifecycle
        .add_violation(&id, "alice", "app-switch", 10)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_concurrent_violations_all_survive() {
    let h = harness();
    let id = h
        .lifecycle
        .create("alice", &["bob".to_string()], 25, false)
        .await
        .unwrap();
    h.lifecycle.start(&id).await.unwrap();

    let (a, b) = tokio::join!(
        h.lifecycle.add_violation(&id, "alice", "app-switch", 40),
        h.lifecycle.add_violation(&id, "bob", "app-switch", 130),
    );
    assert_eq!(a.unwrap().category, ViolationCategory::Medium);
    assert_eq!(b.unwrap().category, ViolationCategory::Large);

    let session = h.session(&id).await;
    assert_eq!(session.violations.len(), 2);
    assert_eq!(total_violation_seconds(&session.violations, "bob"), 130);
}

#[tokio::test]
async fn test_recorded_category_follows_duration() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.lifecycle.start(&id).await.unwrap();

    let mut violation = Violation::new("alice", "app-switch", 320, h.clock.now());
    violation.category = ViolationCategory::Minor;
    let report = h.lifecycle.record_violation(&id, violation).await.unwrap();

    assert_eq!(report.category, ViolationCategory::Catastrophic);
    assert!(report.is_catastrophic);
    let session = h.session(&id).await;
    assert_eq!(session.violations[0].category, ViolationCategory::Catastrophic);
}

#[tokio::test]
async fn test_scenario_a_clean_session_succeeds() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.lifecycle.start(&id).await.unwrap();

    let report = h
        .lifecycle
        .add_violation(&id, "alice", "app-switch", 15)
        .await
        .unwrap();
    assert_eq!(report.category, ViolationCategory::Minor);
    assert!(!report.is_catastrophic);

    h.clock.advance_secs(1500);
    let session = h.session(&id).await;
    let elapsed = session.elapsed_seconds(h.clock.now());
    assert_eq!(elapsed, 1500);
    assert!(is_successful(&session.violations, &session.participants));

    let decision = decide_outcome(&session, elapsed);
    h.lifecycle
        .end(&id, decision.outcome, decision.fail_reason)
        .await
        .unwrap();

    let ended = h.session(&id).await;
    assert_eq!(ended.status, SessionStatus::Ended);
    assert_eq!(ended.outcome, Some(SessionOutcome::Successful));
    assert_eq!(ended.fail_reason, None);
}

#[tokio::test]
async fn test_scenario_b_catastrophic_violation_terminates() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.lifecycle.start(&id).await.unwrap();

    let report = h
        .lifecycle
        .add_violation(&id, "alice", "app-switch", 310)
        .await
        .unwrap();
    assert_eq!(report.category, ViolationCategory::Catastrophic);
    assert!(report.is_catastrophic);

    h.lifecycle
        .terminate(&id, &catastrophic_fail_reason("alice", 310))
        .await
        .unwrap();

    let session = h.session(&id).await;
    assert_eq!(session.status, SessionStatus::Ended);
    assert_eq!(session.outcome, Some(SessionOutcome::Failed));
    let reason = session.fail_reason.unwrap();
    assert!(reason.contains("alice"));
    assert!(reason.contains("5 minutes"));
}

#[tokio::test]
async fn test_scenario_c_cumulative_violations_fail() {
    let h = harness();
    let id = h.lifecycle.create("alice", &[], 25, false).await.unwrap();
    h.lifecycle.start(&id).await.unwrap();

    for secs in [200, 150] {
        let report = h
            .lifecycle
            .add_violation(&id, "alice", "app-switch", secs)
            .await
            .unwrap();
        assert!(!report.is_catastrophic);
    }

    h.clock.advance_secs(1500);
    let session = h.session(&id).await;
    assert_eq!(total_violation_seconds(&session.violations, "alice"), 350);
    assert!(!is_successful(&session.violations, &session.participants));

    let decision = decide_outcome(&session, session.elapsed_seconds(h.clock.now()));
    h.lifecycle
        .end(&id, decision.outcome, decision.fail_reason)
        .await
        .unwrap();

    let ended = h.session(&id).await;
    assert_eq!(ended.outcome, Some(SessionOutcome::Failed));
    assert_eq!(ended.fail_reason.as_deref(), Some(REASON_LIMIT_EXCEEDED));
}

#[tokio::test]
async fn test_room_codes_unique_among_live_sessions() {
    let h = harness();
    let mut codes = std::collections::HashSet::new();
    for i in 0..50 {
        let id = h
            .lifecycle
            .create(&format!("host-{i}"), &[], 25, false)
            .await
            .unwrap();
        assert!(codes.insert(h.session(&id).await.room_code));
    }
}

#[tokio::test]
async fn test_create_fails_when_no_room_code_is_free() {
    let h = harness();
    // Same seed, zero retries: the first draw matches the reserved session.
    let reserving = SessionLifecycle::with_room_codes(h.store.clone(), RoomCodeGenerator::with_seed(0, 9));
    reserving.create("alice", &[], 25, false).await.unwrap();

    let colliding = SessionLifecycle::with_room_codes(h.store.clone(), RoomCodeGenerator::with_seed(0, 9));
    let err = colliding.create("bob", &[], 25, false).await.unwrap_err();
    assert_eq!(err, FocusError::ExhaustedRetries { attempts: 1 });
}
