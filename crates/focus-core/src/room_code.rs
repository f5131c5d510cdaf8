//! Room code generation.
//!
//! Codes are 6-digit numeric strings drawn uniformly from `000000..=999999`
//! and must not collide with any pending or active session.

use crate::error::{FocusError, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Number of distinct codes.
pub const CODE_SPACE: u32 = 1_000_000;
/// Digits per code; leading zeros are kept.
pub const CODE_LENGTH: usize = 6;
/// Default number of retries after the first collision.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Answers whether a code is currently held by a live session.
#[async_trait]
pub trait RoomCodeRegistry: Send + Sync {
    async fn is_code_in_use(&self, code: &str) -> Result<bool>;
}

/// Draws collision-checked room codes.
#[derive(Debug)]
pub struct RoomCodeGenerator {
    max_retries: u32,
    rng: Mutex<StdRng>,
}

impl RoomCodeGenerator {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic generator for tests and simulations.
    pub fn with_seed(max_retries: u32, seed: u64) -> Self {
        Self {
            max_retries,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns a code not held by any live session.
    ///
    /// Makes one attempt plus up to `max_retries` retries.
    ///
    /// # Errors
    ///
    /// - `FocusError::ExhaustedRetries` if every drawn code was taken
    /// - any registry error, unchanged
    pub async fn generate(&self, registry: &dyn RoomCodeRegistry) -> Result<String> {
        let attempts = self.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let code = self.draw();
            if !registry.is_code_in_use(&code).await? {
                return Ok(code);
            }
            tracing::debug!(
                "[RoomCode] Collision on attempt {}/{} for code {}",
                attempt,
                attempts,
                code
            );
        }

        tracing::warn!("[RoomCode] No free code after {} attempts", attempts);
        Err(FocusError::ExhaustedRetries { attempts })
    }

    fn draw(&self) -> String {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        format_code(rng.gen_range(0..CODE_SPACE))
    }
}

impl Default for RoomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Zero-pads a number into a room code.
pub fn format_code(value: u32) -> String {
    format!("{:0width$}", value, width = CODE_LENGTH)
}

/// Whether a string has the shape of a room code.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
