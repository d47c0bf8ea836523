//! Backend contract for asynchronous bulk inference.

use anyhow::Result;
use async_trait::async_trait;

use super::types::JobState;

/// The three backend calls driving the job state machine, plus the file
/// upload that precedes submission. Network and auth errors propagate
/// immediately; there is no retry and no way to cancel a submitted job.
#[async_trait]
pub trait BatchBackend: Send + Sync {
    /// Upload the request JSONL; returns the backend's file handle.
    async fn upload(&self, jsonl: &str, display_name: &str) -> Result<String>;

    /// Create the batch job from an uploaded file; returns the job handle.
    async fn create_job(&self, file: &str, display_name: &str) -> Result<String>;

    /// Current job state.
    async fn poll(&self, job: &str) -> Result<JobState>;

    /// Download the full result JSONL for a succeeded job.
    async fn fetch(&self, job: &str) -> Result<String>;
}
