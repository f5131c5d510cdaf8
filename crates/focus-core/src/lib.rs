//! Session lifecycle and violation-scoring engine for group study sessions.
//!
//! The engine talks to its backing store only through [`store::DocumentStore`];
//! presence events arrive as explicit calls from the host environment.

pub mod clock;
pub mod config;
pub mod error;
pub mod outcome;
pub mod presence;
pub mod room_code;
pub mod session;
pub mod stats;
pub mod store;
pub mod user;
pub mod violation;

// Re-export common error type
pub use error::FocusError;
