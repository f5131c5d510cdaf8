//! Infrastructure layer for Focus.
//!
//! Concrete implementations of the core's abstractions: an in-memory
//! document store and the file-backed configuration service.

pub mod config_service;
pub mod memory_store;
pub mod paths;

pub use crate::config_service::ConfigService;
pub use crate::memory_store::MemoryDocumentStore;
pub use crate::paths::FocusPaths;
