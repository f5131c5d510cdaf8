//! Stats reconciliation.
//!
//! Applies a finished session's outcome to each participant's cumulative
//! profile, at most once per (session, user) pair.

use crate::error::{FocusError, Result};
use crate::outcome::total_violation_seconds;
use crate::session::{SESSIONS_COLLECTION, Session, SessionOutcome, field};
use crate::store::{DocumentStore, FieldValue, Fields};
use crate::user::{USERS_COLLECTION, profile_field};
use serde_json::json;
use std::sync::Arc;

/// What a `reconcile` call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// Profile updated with the given deltas.
    Applied {
        violation_seconds: u64,
        hours: f64,
        completed: bool,
    },
    /// The user was already counted for this session.
    AlreadyReconciled,
    /// The session has no outcome yet.
    NotEnded,
}

/// Folds session outcomes into user profiles.
///
/// The read of `statsUpdatedFor` and the two writes that follow are not
/// atomic; two devices reconciling the same user at once can both apply.
/// Different users of one session reconcile independently.
pub struct StatsReconciler {
    store: Arc<dyn DocumentStore>,
}

impl StatsReconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Applies the session's outcome to `user_id`'s profile.
    ///
    /// The session is re-read from the store so a stale snapshot cannot
    /// double count.
    ///
    /// # Errors
    ///
    /// - `FocusError::NotFound` if the session or the profile is missing
    /// - `FocusError::StoreUnavailable` on store failure
    pub async fn reconcile(&self, user_id: &str, session: &Session) -> Result<ReconcileOutcome> {
        let current = self
            .store
            .get_document(SESSIONS_COLLECTION, &session.id)
            .await?
            .ok_or_else(|| FocusError::not_found("Session", session.id.clone()))?;
        let current = Session::from_document(&current)?;

        if current.has_reconciled(user_id) {
            tracing::debug!(
                "[StatsReconciler] {} already reconciled for session {}",
                user_id,
                current.id
            );
            return Ok(ReconcileOutcome::AlreadyReconciled);
        }

        let Some(outcome) = current.outcome else {
            tracing::debug!(
                "[StatsReconciler] Session {} has not ended, skipping {}",
                current.id,
                user_id
            );
            return Ok(ReconcileOutcome::NotEnded);
        };

        // Nothing is marked for a user who cannot be credited yet
        if self
            .store
            .get_document(USERS_COLLECTION, user_id)
            .await?
            .is_none()
        {
            return Err(FocusError::not_found("UserProfile", user_id));
        }

        let violation_seconds = total_violation_seconds(&current.violations, user_id);
        let completed = outcome == SessionOutcome::Successful;
        let hours = if completed {
            f64::from(current.duration) / 60.0
        } else {
            0.0
        };

        // Marked before the profile write; a retry never applies twice.
        // A failure between the two writes drops this user's increment.
        self.store
            .append_to_array_field(
                SESSIONS_COLLECTION,
                &current.id,
                field::STATS_UPDATED_FOR,
                json!(user_id),
            )
            .await?;

        let mut fields = Fields::new();
        fields.insert(
            profile_field::VIOLATIONS.into(),
            FieldValue::increment_u64(violation_seconds),
        );
        if completed {
            fields.insert(profile_field::TOTAL_HOURS.into(), FieldValue::increment_f64(hours));
            fields.insert(
                profile_field::SESSIONS_COMPLETED.into(),
                FieldValue::increment_u64(1),
            );
        }
        self.store
            .update_document(USERS_COLLECTION, user_id, fields)
            .await?;

        tracing::info!(
            "[StatsReconciler] Applied {} session {} to {}: +{}s violations, +{:.2}h",
            outcome,
            current.id,
            user_id,
            violation_seconds,
            hours
        );

        Ok(ReconcileOutcome::Applied {
            violation_seconds,
            hours,
            completed,
        })
    }

    /// Reconciles every participant, stopping at the first failure.
    pub async fn reconcile_all(&self, session: &Session) -> Result<Vec<(String, ReconcileOutcome)>> {
        let mut results = Vec::with_capacity(session.participants.len());
        for user_id in &session.participants {
            let outcome = self.reconcile(user_id, session).await?;
            results.push((user_id.clone(), outcome));
        }
        Ok(results)
    }
}
