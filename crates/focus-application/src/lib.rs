//! Application layer for Focus.
//!
//! This crate provides use case implementations that coordinate the core
//! engine for one local user: cooperative session creation and joining, and
//! the per-session runner that turns presence events and elapsed time into
//! lifecycle transitions.

pub mod session_runner;
pub mod session_usecase;

pub use session_runner::{HandledAbsence, SessionRunner};
pub use session_usecase::{EntryOutcome, SessionUseCase};
