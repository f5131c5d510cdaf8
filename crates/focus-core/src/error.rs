//! Error types for the Focus engine.

use crate::session::SessionStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the session engine.
///
/// Every public operation fails with one of these variants so callers can
/// render a message per kind (e.g. "already started" vs "not found" on join).
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FocusError {
    /// Referenced session or user does not exist
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Join attempted against a session that is already running
    #[error("Session '{session_id}' has already started")]
    AlreadyStarted { session_id: String },

    /// Operation attempted against a session that has ended
    #[error("Session '{session_id}' has already ended")]
    Ended { session_id: String },

    /// Room code generation did not find a free code
    #[error("No free room code found after {attempts} attempts")]
    ExhaustedRetries { attempts: u32 },

    /// The backing store failed (network, permission, offline)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A lifecycle operation was called from a state that does not allow it
    #[error("Cannot {operation} session '{session_id}' while it is {status}")]
    InvalidTransition {
        session_id: String,
        status: SessionStatus,
        operation: &'static str,
    },

    /// Document <-> model mapping failed
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FocusError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a StoreUnavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Creates an InvalidTransition error
    pub fn invalid_transition(
        session_id: impl Into<String>,
        status: SessionStatus,
        operation: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            session_id: session_id.into(),
            status,
            operation,
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an Ended error
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }

    /// Check if this is an AlreadyStarted error
    pub fn is_already_started(&self) -> bool {
        matches!(self, Self::AlreadyStarted { .. })
    }

    /// Check if this is a StoreUnavailable error
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for FocusError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<serde_json::Error> for FocusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for FocusError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for FocusError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, FocusError>`.
pub type Result<T> = std::result::Result<T, FocusError>;
