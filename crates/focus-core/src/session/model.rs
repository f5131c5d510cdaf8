//! Session domain model.

use crate::error::Result;
use crate::store::Document;
use crate::violation::Violation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store collection holding session documents.
pub const SESSIONS_COLLECTION: &str = "sessions";

/// Stored field names of a session document.
pub mod field {
    pub const HOST_ID: &str = "hostId";
    pub const PARTICIPANTS: &str = "participants";
    pub const STATUS: &str = "status";
    pub const DURATION: &str = "duration";
    pub const IS_MARATHON: &str = "isMarathon";
    pub const VIOLATIONS: &str = "violations";
    pub const CREATED_AT: &str = "createdAt";
    pub const START_TIME: &str = "startTime";
    pub const END_TIME: &str = "endTime";
    pub const ROOM_CODE: &str = "roomCode";
    pub const OUTCOME: &str = "outcome";
    pub const FAIL_REASON: &str = "failReason";
    pub const STATS_UPDATED_FOR: &str = "statsUpdatedFor";
}

/// Lifecycle state. Moves only forward: pending -> active -> ended.
/// A pending session may instead be deleted outright (cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }

    /// Pending and active sessions hold their room code and count towards a
    /// user's single live session.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result, set together with `status = ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    Successful,
    Failed,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Successful => "successful",
            SessionOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One coordinated study period with one or more participants.
///
/// Timestamps are assigned by the store at the matching transition and never
/// rewritten. `violations` and `stats_updated_for` only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Store-allocated document id (not part of the stored fields)
    #[serde(skip)]
    pub id: String,
    /// Creator; holds start/cancel authority
    pub host_id: String,
    /// Member user ids, host included
    #[serde(default)]
    pub participants: Vec<String>,
    pub status: SessionStatus,
    /// Planned length in minutes; 0 for marathon sessions
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub is_marathon: bool,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// 6-digit join code
    pub room_code: String,
    #[serde(default)]
    pub outcome: Option<SessionOutcome>,
    #[serde(default)]
    pub fail_reason: Option<String>,
    /// Users whose profile already absorbed this session's outcome
    #[serde(default)]
    pub stats_updated_for: Vec<String>,
}

impl Session {
    /// Decodes a stored session document.
    pub fn from_document(document: &Document) -> Result<Self> {
        let mut session: Session = document.decode()?;
        session.id = document.id.clone();
        Ok(session)
    }

    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|id| id == user_id)
    }

    /// Target length in seconds, `None` for marathon sessions.
    pub fn target_seconds(&self) -> Option<u64> {
        if self.is_marathon {
            None
        } else {
            Some(u64::from(self.duration) * 60)
        }
    }

    /// Seconds since `start_time`, 0 before the session started.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.start_time
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn has_reconciled(&self, user_id: &str) -> bool {
        self.stats_updated_for.iter().any(|id| id == user_id)
    }
}
