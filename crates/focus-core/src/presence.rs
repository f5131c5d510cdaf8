//! Presence monitoring.
//!
//! Turns the host's foreground/background notifications into measured,
//! classified absences. The host calls [`PresenceMonitor::on_app_state_change`]
//! with `(previous, next, timestamp)`; no OS lifecycle API is involved.

use crate::violation::{ViolationCategory, classify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    /// In the foreground and focused
    Active,
    /// Transitioning or obscured (e.g. system overlay)
    Inactive,
    /// Not visible
    Background,
}

impl AppState {
    pub fn is_active(&self) -> bool {
        matches!(self, AppState::Active)
    }
}

/// A completed absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Absence {
    pub left_at: DateTime<Utc>,
    pub returned_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub category: ViolationCategory,
}

/// Measures how long the user stays away from the app.
#[derive(Debug, Clone)]
pub struct PresenceMonitor {
    left_at: Option<DateTime<Utc>>,
    min_reportable_seconds: u64,
}

impl PresenceMonitor {
    pub fn new(min_reportable_seconds: u64) -> Self {
        Self {
            left_at: None,
            min_reportable_seconds,
        }
    }

    /// Whether the user is currently away.
    pub fn is_away(&self) -> bool {
        self.left_at.is_some()
    }

    pub fn left_at(&self) -> Option<DateTime<Utc>> {
        self.left_at
    }

    /// Feeds one host transition.
    ///
    /// Leaving `Active` starts an absence; returning to `Active` completes it.
    /// Durations are floored to whole seconds and clamped at zero when the
    /// host's timestamps go backwards. Absences shorter than the configured
    /// minimum are dropped.
    pub fn on_app_state_change(
        &mut self,
        previous: AppState,
        next: AppState,
        timestamp: DateTime<Utc>,
    ) -> Option<Absence> {
        match (previous.is_active(), next.is_active()) {
            (true, false) => {
                self.left_at = Some(timestamp);
                None
            }
            (false, true) => {
                let left_at = self.left_at.take()?;
                let duration_seconds = (timestamp - left_at).num_seconds().max(0) as u64;
                if duration_seconds < self.min_reportable_seconds {
                    tracing::debug!(
                        "[PresenceMonitor] Ignoring {}s absence below {}s minimum",
                        duration_seconds,
                        self.min_reportable_seconds
                    );
                    return None;
                }
                Some(Absence {
                    left_at,
                    returned_at: timestamp,
                    duration_seconds,
                    category: classify(duration_seconds),
                })
            }
            // inactive <-> background keeps the first departure time
            _ => None,
        }
    }

    /// Forgets an absence in progress (session over, monitor torn down).
    pub fn reset(&mut self) {
        self.left_at = None;
    }
}

impl Default for PresenceMonitor {
    fn default() -> Self {
        Self::new(1)
    }
}
