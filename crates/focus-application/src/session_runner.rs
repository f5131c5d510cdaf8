//! Per-session runner for one local participant.
//!
//! Glues host presence events, the auto-complete ticker and remote session
//! updates to the lifecycle. Every path that ends the session goes through a
//! single completion latch, so at most one end write leaves this device.

use chrono::{DateTime, Utc};
use focus_core::clock::Clock;
use focus_core::config::FocusConfig;
use focus_core::error::{FocusError, Result};
use focus_core::outcome::{catastrophic_fail_reason, decide_outcome};
use focus_core::presence::{Absence, AppState, PresenceMonitor};
use focus_core::session::{Session, SessionEvent, SessionLifecycle, SessionStatus};
use focus_core::stats::{ReconcileOutcome, StatsReconciler};
use focus_core::user::UserProfiles;
use focus_core::violation::{DEFAULT_VIOLATION_TYPE, Violation, ViolationReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A completed absence and what recording it did.
#[derive(Debug, Clone, PartialEq)]
pub struct HandledAbsence {
    pub absence: Absence,
    pub report: ViolationReport,
    /// Whether this runner ended the session because of it.
    pub terminated: bool,
}

enum EndRequest {
    /// Outcome from the session's target and violations.
    Decide,
    /// Catastrophic failure with this reason.
    Fail(String),
}

#[derive(Clone)]
pub struct SessionRunner {
    session_id: String,
    user_id: String,
    is_marathon: bool,
    lifecycle: Arc<SessionLifecycle>,
    reconciler: Arc<StatsReconciler>,
    profiles: Arc<UserProfiles>,
    clock: Arc<dyn Clock>,
    monitor: Arc<Mutex<PresenceMonitor>>,
    completing: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl SessionRunner {
    /// Binds a runner to `session_id` for `user_id`.
    ///
    /// A session that has already ended starts latched: nothing this runner
    /// does will write to it again.
    ///
    /// # Errors
    ///
    /// `FocusError::NotFound` if the session does not exist.
    pub async fn attach(
        lifecycle: Arc<SessionLifecycle>,
        reconciler: Arc<StatsReconciler>,
        profiles: Arc<UserProfiles>,
        clock: Arc<dyn Clock>,
        config: &FocusConfig,
        session_id: &str,
        user_id: &str,
    ) -> Result<Self> {
        let session = lifecycle
            .get_session(session_id)
            .await?
            .ok_or_else(|| FocusError::not_found("Session", session_id))?;

        if !session.is_participant(user_id) {
            tracing::warn!(
                "[SessionRunner] {} is not a participant of session {}",
                user_id,
                session_id
            );
        }

        tracing::debug!(
            "[SessionRunner] Attached {} to session {} ({})",
            user_id,
            session_id,
            session.status
        );

        Ok(Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            is_marathon: session.is_marathon,
            lifecycle,
            reconciler,
            profiles,
            clock,
            monitor: Arc::new(Mutex::new(PresenceMonitor::new(
                config.presence.min_reportable_seconds,
            ))),
            completing: Arc::new(AtomicBool::new(session.status == SessionStatus::Ended)),
            cancel_token: CancellationToken::new(),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_millis(config.runner.tick_interval_ms),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Whether an end has been written or observed.
    pub fn is_completing(&self) -> bool {
        self.completing.load(Ordering::SeqCst)
    }

    /// Feeds one host app-state transition.
    ///
    /// A completed absence is recorded as a violation. A catastrophic one
    /// also terminates the session, unless another path already ended it.
    /// Transitions after the session ended are ignored.
    pub async fn handle_app_state_change(
        &self,
        previous: AppState,
        next: AppState,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<HandledAbsence>> {
        if self.is_completing() {
            return Ok(None);
        }

        let absence = self
            .monitor
            .lock()
            .await
            .on_app_state_change(previous, next, timestamp);
        let Some(absence) = absence else {
            return Ok(None);
        };

        let violation = Violation::new(
            self.user_id.as_str(),
            DEFAULT_VIOLATION_TYPE,
            absence.duration_seconds,
            absence.returned_at,
        );
        let report = self
            .lifecycle
            .record_violation(&self.session_id, violation)
            .await?;

        let mut terminated = false;
        if report.is_catastrophic {
            let label = match self.profiles.display_name(&self.user_id).await {
                Ok(name) => name,
                Err(err) => {
                    tracing::warn!(
                        "[SessionRunner] No display name for {}: {}",
                        self.user_id,
                        err
                    );
                    self.user_id.clone()
                }
            };
            let reason = catastrophic_fail_reason(&label, absence.duration_seconds);
            terminated = self.finish(EndRequest::Fail(reason)).await?.is_some();
        }

        Ok(Some(HandledAbsence {
            absence,
            report,
            terminated,
        }))
    }

    /// Ends the session on the user's request.
    ///
    /// Timed sessions ended before their target fail as ended early.
    /// Returns the final session, or `None` if another path got there first.
    ///
    /// # Errors
    ///
    /// A failed end write releases the latch. A failed stats write after the
    /// end landed is returned as well, but the runner stays latched; use
    /// [`Self::retry_reconcile`] to apply the stats later.
    pub async fn end_manually(&self) -> Result<Option<Session>> {
        self.finish(EndRequest::Decide).await
    }

    /// Ends a timed session once its target has elapsed.
    ///
    /// Returns the final session if this call ended it.
    pub async fn check_auto_complete(&self) -> Result<Option<Session>> {
        if self.is_completing() || self.is_marathon {
            return Ok(None);
        }

        let session = self.load().await?;
        match session.status {
            SessionStatus::Active => {}
            SessionStatus::Ended => {
                self.observe_end().await?;
                return Ok(None);
            }
            SessionStatus::Pending => return Ok(None),
        }

        let Some(target) = session.target_seconds() else {
            return Ok(None);
        };
        if session.elapsed_seconds(self.clock.now()) < target {
            return Ok(None);
        }

        tracing::info!(
            "[SessionRunner] Session {} reached its {}s target",
            self.session_id,
            target
        );
        self.finish(EndRequest::Decide).await
    }

    /// Starts polling [`Self::check_auto_complete`] in the background.
    ///
    /// Returns `false` for marathon sessions, which never auto-complete.
    pub async fn spawn_auto_complete(&self) -> bool {
        if self.is_marathon {
            return false;
        }

        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let runner = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(runner.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = runner.cancel_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                match runner.check_auto_complete().await {
                    Ok(Some(session)) => {
                        tracing::info!(
                            "[SessionRunner] Auto-completed session {} as {:?}",
                            session.id,
                            session.outcome
                        );
                        break;
                    }
                    Ok(None) if runner.is_completing() => break,
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(
                            "[SessionRunner] Auto-complete check for {} failed: {}",
                            runner.session_id,
                            err
                        );
                    }
                }
            }

            tracing::debug!("[SessionRunner] Ticker for {} stopped", runner.session_id);
        });

        *ticker_guard = Some(handle);
        true
    }

    /// Applies a session update from the subscription.
    ///
    /// An end written by another participant latches this runner, stops the
    /// ticker and reconciles the local user. Returns `true` if this call
    /// observed the end.
    pub async fn handle_session_event(&self, event: &SessionEvent) -> Result<bool> {
        match event {
            SessionEvent::Updated(session) if session.status == SessionStatus::Ended => {
                self.observe_end().await
            }
            SessionEvent::Updated(_) => Ok(false),
            SessionEvent::Removed => {
                if self.completing.swap(true, Ordering::SeqCst) {
                    return Ok(false);
                }
                tracing::info!("[SessionRunner] Session {} was removed", self.session_id);
                self.stop().await;
                Ok(true)
            }
        }
    }

    /// Applies the session's outcome to the local user's stats again.
    ///
    /// For use after an end whose stats write failed; an already applied
    /// update is not repeated.
    pub async fn retry_reconcile(&self) -> Result<ReconcileOutcome> {
        let session = self.load().await?;
        self.reconciler.reconcile(&self.user_id, &session).await
    }

    /// Stops the ticker and waits for it to exit.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let handle = self.ticker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::warn!("[SessionRunner] Ticker task failed: {}", err);
                }
            }
        }
    }

    async fn finish(&self, request: EndRequest) -> Result<Option<Session>> {
        if self.completing.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                "[SessionRunner] Session {} already completing, skipping end",
                self.session_id
            );
            return Ok(None);
        }

        if let Err(err) = self.write_end(request).await {
            // Nothing was written; a later attempt may still end it.
            self.completing.store(false, Ordering::SeqCst);
            return Err(err);
        }

        self.stop().await;
        self.reconcile_local().await.map(Some)
    }

    async fn write_end(&self, request: EndRequest) -> Result<()> {
        let result = match request {
            EndRequest::Decide => {
                let session = self.load().await?;
                let decision =
                    decide_outcome(&session, session.elapsed_seconds(self.clock.now()));
                self.lifecycle
                    .end(&self.session_id, decision.outcome, decision.fail_reason)
                    .await
            }
            EndRequest::Fail(reason) => self.lifecycle.terminate(&self.session_id, &reason).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_ended() => {
                tracing::info!(
                    "[SessionRunner] Session {} was ended by another participant",
                    self.session_id
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Latches on an end written elsewhere.
    async fn observe_end(&self) -> Result<bool> {
        if self.completing.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.stop().await;
        self.reconcile_local().await?;
        Ok(true)
    }

    async fn reconcile_local(&self) -> Result<Session> {
        let session = self.load().await?;
        let outcome = self.reconciler.reconcile(&self.user_id, &session).await?;
        if let ReconcileOutcome::Applied { hours, .. } = outcome {
            tracing::info!(
                "[SessionRunner] Credited {} with {:.2}h from session {}",
                self.user_id,
                hours,
                self.session_id
            );
        }
        self.load().await
    }

    async fn stop(&self) {
        self.cancel_token.cancel();
        self.monitor.lock().await.reset();
    }

    async fn load(&self) -> Result<Session> {
        self.lifecycle
            .get_session(&self.session_id)
            .await?
            .ok_or_else(|| FocusError::not_found("Session", self.session_id.as_str()))
    }
}
