//! Fatal error types for the orchestration core.
//!
//! Only setup and whole-job failures surface here. Per-item and per-key
//! failures are recovered locally, logged to the [`ErrorLog`], and counted
//! in run summaries instead of propagating.
//!
//! [`ErrorLog`]: crate::error_log::ErrorLog

use thiserror::Error;

use crate::batch::JobState;

#[derive(Debug, Error)]
pub enum CasenoteError {
    /// Invalid or missing configuration, detected at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The batch job reached a terminal state other than succeeded.
    #[error("batch job ended unsuccessfully: {state}")]
    JobFailed { state: JobState },

    /// Two batch requests were built with the same key.
    #[error("duplicate batch key: {key}")]
    DuplicateKey { key: String },

    /// Backend or I/O failure during submit, poll, or fetch. No retry.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
