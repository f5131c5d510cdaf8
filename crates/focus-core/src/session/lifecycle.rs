use super::event::SessionSubscription;
use super::model::{SESSIONS_COLLECTION, Session, SessionOutcome, SessionStatus, field};
use crate::error::{FocusError, Result};
use crate::room_code::{RoomCodeGenerator, RoomCodeRegistry};
use crate::store::{DocumentStore, FieldValue, Fields, Filter};
use crate::violation::{Violation, ViolationReport, classify};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

/// What `relinquish` did to free the user for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelinquishAction {
    /// The user hosted a pending session, which was deleted.
    Cancelled,
    /// The user was removed from the participant list.
    Left,
}

/// Drives session state transitions against the document store.
///
/// `SessionLifecycle` is responsible for:
/// - Creating sessions with a unique room code
/// - Starting, ending, terminating and cancelling sessions
/// - Joining by room code and leaving
/// - Appending classified violations
/// - Listing a user's sessions and finding their live one
///
/// None of the check-then-write sequences here are transactional. The
/// single-live-session rule is cooperative: callers consult
/// [`SessionLifecycle::get_user_active_session`] before `create` or
/// `join_by_code`.
pub struct SessionLifecycle {
    store: Arc<dyn DocumentStore>,
    room_codes: RoomCodeGenerator,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_room_codes(store, RoomCodeGenerator::default())
    }

    pub fn with_room_codes(store: Arc<dyn DocumentStore>, room_codes: RoomCodeGenerator) -> Self {
        Self { store, room_codes }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Creates a pending session and returns its id.
    ///
    /// The host is always the first participant; other ids are deduplicated.
    /// Marathon sessions are stored with `duration = 0`.
    ///
    /// # Errors
    ///
    /// - `FocusError::ExhaustedRetries` if no free room code was found
    /// - `FocusError::StoreUnavailable` on store failure
    pub async fn create(
        &self,
        host_id: &str,
        participant_ids: &[String],
        duration_minutes: u32,
        is_marathon: bool,
    ) -> Result<String> {
        let mut participants = vec![host_id.to_string()];
        for id in participant_ids {
            if !participants.contains(id) {
                participants.push(id.clone());
            }
        }

        let duration = if is_marathon { 0 } else { duration_minutes };
        let room_code = self.room_codes.generate(self).await?;

        let mut fields = Fields::new();
        fields.insert(field::HOST_ID.into(), json!(host_id).into());
        fields.insert(field::PARTICIPANTS.into(), json!(participants).into());
        fields.insert(field::STATUS.into(), json!(SessionStatus::Pending).into());
        fields.insert(field::DURATION.into(), json!(duration).into());
        fields.insert(field::IS_MARATHON.into(), json!(is_marathon).into());
        fields.insert(field::VIOLATIONS.into(), json!([]).into());
        fields.insert(field::CREATED_AT.into(), FieldValue::ServerTimestamp);
        fields.insert(field::START_TIME.into(), Value::Null.into());
        fields.insert(field::END_TIME.into(), Value::Null.into());
        fields.insert(field::ROOM_CODE.into(), json!(room_code).into());
        fields.insert(field::OUTCOME.into(), Value::Null.into());
        fields.insert(field::FAIL_REASON.into(), Value::Null.into());
        fields.insert(field::STATS_UPDATED_FOR.into(), json!([]).into());

        let session_id = self.store.create_document(SESSIONS_COLLECTION, fields).await?;

        tracing::info!(
            "[SessionLifecycle] Created session {} (host={}, participants={}, duration={}m, marathon={}, code={})",
            session_id,
            host_id,
            participants.len(),
            duration,
            is_marathon,
            room_code
        );

        Ok(session_id)
    }

    /// Moves a pending session to active and stamps `startTime` with the
    /// store's clock.
    ///
    /// # Errors
    ///
    /// - `FocusError::NotFound` if the session does not exist
    /// - `FocusError::InvalidTransition` unless the session is pending
    pub async fn start(&self, session_id: &str) -> Result<()> {
        let session = self.load(session_id).await?;
        if session.status != SessionStatus::Pending {
            return Err(FocusError::invalid_transition(
                session_id,
                session.status,
                "start",
            ));
        }

        let mut fields = Fields::new();
        fields.insert(field::STATUS.into(), json!(SessionStatus::Active).into());
        fields.insert(field::START_TIME.into(), FieldValue::ServerTimestamp);
        self.store
            .update_document(SESSIONS_COLLECTION, session_id, fields)
            .await?;

        tracing::info!("[SessionLifecycle] Started session {}", session_id);
        Ok(())
    }

    /// Joins the pending session holding `room_code` and returns its id.
    ///
    /// Codes are released when a session ends, so several sessions may share
    /// one. A pending match wins; otherwise an active match reports
    /// `AlreadyStarted` and an ended match reports `Ended`.
    ///
    /// Joining twice is idempotent.
    pub async fn join_by_code(&self, room_code: &str, user_id: &str) -> Result<String> {
        let matches = self
            .store
            .query(SESSIONS_COLLECTION, &[Filter::eq(field::ROOM_CODE, room_code)])
            .await?
            .iter()
            .map(Session::from_document)
            .collect::<Result<Vec<_>>>()?;

        let find = |status: SessionStatus| matches.iter().find(|s| s.status == status);

        let session = match find(SessionStatus::Pending) {
            Some(session) => session,
            None => {
                if let Some(active) = find(SessionStatus::Active) {
                    return Err(FocusError::AlreadyStarted {
                        session_id: active.id.clone(),
                    });
                }
                if let Some(ended) = find(SessionStatus::Ended) {
                    return Err(FocusError::Ended {
                        session_id: ended.id.clone(),
                    });
                }
                return Err(FocusError::not_found("RoomCode", room_code));
            }
        };

        if session.is_participant(user_id) {
            tracing::debug!(
                "[SessionLifecycle] {} already in session {}, join is a no-op",
                user_id,
                session.id
            );
            return Ok(session.id.clone());
        }

        self.store
            .append_to_array_field(
                SESSIONS_COLLECTION,
                &session.id,
                field::PARTICIPANTS,
                json!(user_id),
            )
            .await?;

        tracing::info!(
            "[SessionLifecycle] {} joined session {} via code {}",
            user_id,
            session.id,
            room_code
        );
        Ok(session.id.clone())
    }

    /// Removes `user_id` from the participant list, whatever the status.
    ///
    /// A session that no longer exists counts as already left. Sessions left
    /// without participants are kept as they are.
    pub async fn leave(&self, session_id: &str, user_id: &str) -> Result<()> {
        let Some(session) = self.get_session(session_id).await? else {
            tracing::debug!(
                "[SessionLifecycle] Session {} already gone, nothing to leave",
                session_id
            );
            return Ok(());
        };

        let remaining: Vec<String> = session
            .participants
            .into_iter()
            .filter(|id| id != user_id)
            .collect();

        let mut fields = Fields::new();
        fields.insert(field::PARTICIPANTS.into(), json!(remaining).into());
        match self
            .store
            .update_document(SESSIONS_COLLECTION, session_id, fields)
            .await
        {
            Ok(()) => {}
            // Deleted between the read and the write
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }

        if remaining.is_empty() {
            tracing::warn!(
                "[SessionLifecycle] Session {} has no participants left (status={})",
                session_id,
                session.status
            );
        } else {
            tracing::info!("[SessionLifecycle] {} left session {}", user_id, session_id);
        }
        Ok(())
    }

    /// Deletes a pending session. Subscribers observe `SessionEvent::Removed`.
    ///
    /// # Errors
    ///
    /// - `FocusError::NotFound` if the session does not exist
    /// - `FocusError::InvalidTransition` unless the session is pending
    pub async fn cancel(&self, session_id: &str) -> Result<()> {
        let session = self.load(session_id).await?;
        if session.status != SessionStatus::Pending {
            return Err(FocusError::invalid_transition(
                session_id,
                session.status,
                "cancel",
            ));
        }

        self.store
            .delete_document(SESSIONS_COLLECTION, session_id)
            .await?;

        tracing::info!("[SessionLifecycle] Cancelled session {}", session_id);
        Ok(())
    }

    /// Ends an active session, writing status, end time, outcome and reason in
    /// one update. A reason passed with a successful outcome is dropped.
    ///
    /// # Errors
    ///
    /// - `FocusError::NotFound` if the session does not exist
    /// - `FocusError::Ended` if another participant already ended it
    /// - `FocusError::InvalidTransition` if it never started
    pub async fn end(
        &self,
        session_id: &str,
        outcome: SessionOutcome,
        fail_reason: Option<String>,
    ) -> Result<()> {
        let session = self.load(session_id).await?;
        match session.status {
            SessionStatus::Active => {}
            SessionStatus::Ended => {
                return Err(FocusError::Ended {
                    session_id: session_id.to_string(),
                });
            }
            SessionStatus::Pending => {
                return Err(FocusError::invalid_transition(
                    session_id,
                    session.status,
                    "end",
                ));
            }
        }

        let fail_reason = match outcome {
            SessionOutcome::Successful => None,
            SessionOutcome::Failed => fail_reason,
        };

        let mut fields = Fields::new();
        fields.insert(field::STATUS.into(), json!(SessionStatus::Ended).into());
        fields.insert(field::END_TIME.into(), FieldValue::ServerTimestamp);
        fields.insert(field::OUTCOME.into(), json!(outcome).into());
        fields.insert(field::FAIL_REASON.into(), json!(fail_reason).into());
        self.store
            .update_document(SESSIONS_COLLECTION, session_id, fields)
            .await?;

        tracing::info!(
            "[SessionLifecycle] Ended session {} as {}{}",
            session_id,
            outcome,
            fail_reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
        Ok(())
    }

    /// Fails an active session immediately after a catastrophic violation.
    pub async fn terminate(&self, session_id: &str, reason: &str) -> Result<()> {
        tracing::warn!(
            "[SessionLifecycle] Terminating session {}: {}",
            session_id,
            reason
        );
        self.end(session_id, SessionOutcome::Failed, Some(reason.to_string()))
            .await
    }

    /// Classifies and appends a violation detected now.
    pub async fn add_violation(
        &self,
        session_id: &str,
        user_id: &str,
        kind: &str,
        duration_seconds: u64,
    ) -> Result<ViolationReport> {
        let violation = Violation::new(user_id, kind, duration_seconds, Utc::now());
        self.record_violation(session_id, violation).await
    }

    /// Appends an already-built violation with array-union semantics, so
    /// concurrent reports from different participants all survive.
    ///
    /// # Errors
    ///
    /// `FocusError::NotFound` if the session was deleted.
    pub async fn record_violation(
        &self,
        session_id: &str,
        mut violation: Violation,
    ) -> Result<ViolationReport> {
        // Stored category always follows the duration
        violation.category = classify(violation.duration_seconds);
        let report = ViolationReport::for_category(violation.category);
        let element = serde_json::to_value(&violation)?;

        self.store
            .append_to_array_field(SESSIONS_COLLECTION, session_id, field::VIOLATIONS, element)
            .await?;

        if report.is_catastrophic {
            tracing::warn!(
                "[SessionLifecycle] Catastrophic violation in {}: {} away {}s",
                session_id,
                violation.user_id,
                violation.duration_seconds
            );
        } else {
            tracing::info!(
                "[SessionLifecycle] Recorded {} violation in {}: {} away {}s",
                report.category,
                session_id,
                violation.user_id,
                violation.duration_seconds
            );
        }
        Ok(report)
    }

    /// Reads a session.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.store
            .get_document(SESSIONS_COLLECTION, session_id)
            .await?
            .map(|doc| Session::from_document(&doc))
            .transpose()
    }

    /// Returns the user's pending or active session, newest first if the
    /// cooperative invariant was broken by a race.
    pub async fn get_user_active_session(&self, user_id: &str) -> Result<Option<Session>> {
        let filters = [
            Filter::array_contains(field::PARTICIPANTS, user_id),
            Filter::is_in(
                field::STATUS,
                vec![json!(SessionStatus::Pending), json!(SessionStatus::Active)],
            ),
        ];
        let sessions = self.query_sessions(&filters).await?;
        if sessions.len() > 1 {
            tracing::warn!(
                "[SessionLifecycle] {} is in {} live sessions",
                user_id,
                sessions.len()
            );
        }
        Ok(sessions.into_iter().next())
    }

    /// Lists every session the user currently participates in, newest first.
    pub async fn get_user_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        self.query_sessions(&[Filter::array_contains(field::PARTICIPANTS, user_id)])
            .await
    }

    /// Frees the user from a live session: hosts of pending sessions cancel
    /// them, everyone else leaves.
    pub async fn relinquish(&self, session_id: &str, user_id: &str) -> Result<RelinquishAction> {
        match self.get_session(session_id).await? {
            Some(session)
                if session.is_host(user_id) && session.status == SessionStatus::Pending =>
            {
                self.cancel(session_id).await?;
                Ok(RelinquishAction::Cancelled)
            }
            _ => {
                self.leave(session_id, user_id).await?;
                Ok(RelinquishAction::Left)
            }
        }
    }

    /// Subscribes to live updates. The current state is delivered first.
    pub async fn subscribe_to_session(&self, session_id: &str) -> Result<SessionSubscription> {
        let inner = self.store.subscribe(SESSIONS_COLLECTION, session_id).await?;
        Ok(SessionSubscription::new(session_id, inner))
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.get_session(session_id)
            .await?
            .ok_or_else(|| FocusError::not_found("Session", session_id))
    }

    async fn query_sessions(&self, filters: &[Filter]) -> Result<Vec<Session>> {
        let mut sessions = self
            .store
            .query(SESSIONS_COLLECTION, filters)
            .await?
            .iter()
            .map(Session::from_document)
            .collect::<Result<Vec<_>>>()?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}

#[async_trait]
impl RoomCodeRegistry for SessionLifecycle {
    async fn is_code_in_use(&self, code: &str) -> Result<bool> {
        let filters = [
            Filter::eq(field::ROOM_CODE, code),
            Filter::is_in(
                field::STATUS,
                vec![json!(SessionStatus::Pending), json!(SessionStatus::Active)],
            ),
        ];
        let live = self.store.query(SESSIONS_COLLECTION, &filters).await?;
        Ok(!live.is_empty())
    }
}
