//! Session domain module.
//!
//! This module contains the session entity, its live-update events and the
//! lifecycle manager that drives state transitions against the store.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `SessionStatus`, `SessionOutcome`)
//! - `event`: Live subscription wrapper (`SessionSubscription`, `SessionEvent`)
//! - `lifecycle`: State transitions and queries (`SessionLifecycle`)
//!
//! # Usage
//!
//! ```ignore
//! use focus_core::session::{Session, SessionLifecycle, SessionStatus};
//! ```

mod event;
mod lifecycle;
mod model;

pub use event::{SessionEvent, SessionSubscription};
pub use lifecycle::{RelinquishAction, SessionLifecycle};
pub use model::{SESSIONS_COLLECTION, Session, SessionOutcome, SessionStatus, field};
