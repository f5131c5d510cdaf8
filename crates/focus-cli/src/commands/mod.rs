pub mod classify;
pub mod simulate;
