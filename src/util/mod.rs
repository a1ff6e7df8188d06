//! Utility modules: retry and cancellable sleep.

pub mod retry;
pub mod sleep;
