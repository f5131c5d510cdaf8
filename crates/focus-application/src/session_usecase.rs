//! Session entry use cases.

use crate::session_runner::SessionRunner;
use focus_core::clock::Clock;
use focus_core::config::FocusConfig;
use focus_core::error::Result;
use focus_core::room_code::RoomCodeGenerator;
use focus_core::session::{RelinquishAction, Session, SessionLifecycle};
use focus_core::stats::StatsReconciler;
use focus_core::store::DocumentStore;
use focus_core::user::UserProfiles;
use std::sync::Arc;

/// Result of trying to enter a session.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Entered the session with this id.
    Entered(String),
    /// The user already has a live session. The caller offers to resume it
    /// or to relinquish it via [`SessionUseCase::relinquish`] and retry.
    Blocked(Session),
}

/// Entry point wiring the core services for one application instance.
///
/// Enforces the single-live-session rule cooperatively: every entry path
/// checks `get_user_active_session` first. Two devices acting at the same
/// moment can still both succeed.
pub struct SessionUseCase {
    lifecycle: Arc<SessionLifecycle>,
    reconciler: Arc<StatsReconciler>,
    profiles: Arc<UserProfiles>,
    clock: Arc<dyn Clock>,
    config: FocusConfig,
}

impl SessionUseCase {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: FocusConfig) -> Self {
        let room_codes = RoomCodeGenerator::new(config.room_code.max_retries);
        Self::with_lifecycle(
            Arc::new(SessionLifecycle::with_room_codes(store, room_codes)),
            clock,
            config,
        )
    }

    pub fn with_lifecycle(
        lifecycle: Arc<SessionLifecycle>,
        clock: Arc<dyn Clock>,
        config: FocusConfig,
    ) -> Self {
        let store = lifecycle.store().clone();
        Self {
            reconciler: Arc::new(StatsReconciler::new(store.clone())),
            profiles: Arc::new(UserProfiles::new(store)),
            lifecycle,
            clock,
            config,
        }
    }

    pub fn lifecycle(&self) -> &Arc<SessionLifecycle> {
        &self.lifecycle
    }

    pub fn reconciler(&self) -> &Arc<StatsReconciler> {
        &self.reconciler
    }

    pub fn profiles(&self) -> &Arc<UserProfiles> {
        &self.profiles
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Creates a session unless the host already has a live one.
    pub async fn create_session(
        &self,
        host_id: &str,
        participant_ids: &[String],
        duration_minutes: u32,
        is_marathon: bool,
    ) -> Result<EntryOutcome> {
        if let Some(existing) = self.lifecycle.get_user_active_session(host_id).await? {
            tracing::info!(
                "[SessionUseCase] {} already in live session {}, create blocked",
                host_id,
                existing.id
            );
            return Ok(EntryOutcome::Blocked(existing));
        }

        let id = self
            .lifecycle
            .create(host_id, participant_ids, duration_minutes, is_marathon)
            .await?;
        Ok(EntryOutcome::Entered(id))
    }

    /// Joins by room code unless the user already has a different live
    /// session. Re-joining the session the user is already in succeeds.
    pub async fn join_session(&self, room_code: &str, user_id: &str) -> Result<EntryOutcome> {
        if let Some(existing) = self.lifecycle.get_user_active_session(user_id).await? {
            if existing.room_code != room_code {
                tracing::info!(
                    "[SessionUseCase] {} already in live session {}, join blocked",
                    user_id,
                    existing.id
                );
                return Ok(EntryOutcome::Blocked(existing));
            }
        }

        let id = self.lifecycle.join_by_code(room_code, user_id).await?;
        Ok(EntryOutcome::Entered(id))
    }

    /// Gives up a live session so the user can start or join another.
    pub async fn relinquish(&self, session_id: &str, user_id: &str) -> Result<RelinquishAction> {
        self.lifecycle.relinquish(session_id, user_id).await
    }

    /// Binds a runner for `user_id` to an existing session.
    pub async fn attach_runner(&self, session_id: &str, user_id: &str) -> Result<SessionRunner> {
        SessionRunner::attach(
            self.lifecycle.clone(),
            self.reconciler.clone(),
            self.profiles.clone(),
            self.clock.clone(),
            &self.config,
            session_id,
            user_id,
        )
        .await
    }
}
