//! Keyed batch-job orchestration.
//!
//! Converts a keyed set of source documents into a keyed set of derived
//! outputs via one asynchronous bulk inference call:
//!
//! ```text
//! BUILD → UPLOAD → SUBMIT → POLL* → SUCCEEDED → FETCH → DEMUX
//!                              └──→ FAILED | CANCELLED | EXPIRED (fatal)
//! ```
//!
//! The whole request collection travels as one job; per-key failures inside
//! a succeeded job are logged and skipped, never fatal. Every submitted key
//! is accounted for in the demux report as written, failed, or missing.

mod backend;
mod gemini;
mod types;

pub use backend::BatchBackend;
pub use gemini::GeminiBatchBackend;
pub use types::{BatchRequest, JobState, KeyedBatch, Outcome, ResultRecord};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::artifact::{ArtifactSpec, ItemKey};
use crate::error::CasenoteError;
use crate::error_log::ErrorLog;

/// One batch stage: where inputs come from, where outputs go, and how a
/// source document becomes a prompt.
pub struct BatchPlan {
    /// Keyed input artifacts (e.g. `transcript_raw_KEY.json`).
    pub input: ArtifactSpec,
    /// Keyed output artifacts (e.g. `narrative_KEY.txt`).
    pub output: ArtifactSpec,
    /// Key namespace for this batch; request keys are `prefix_KEY` and
    /// result records outside the namespace are ignored.
    pub key_prefix: String,
    /// Display name reported to the backend.
    pub display_name: String,
    /// Items 1..=total are considered for submission.
    pub total_items: usize,
    /// Audit copy of the request JSONL.
    pub requests_path: PathBuf,
    /// Raw result JSONL, persisted before demux.
    pub results_path: PathBuf,
    /// Fixed interval between status polls. No backoff, no timeout: an
    /// unresponsive backend blocks the run.
    pub poll_interval: Duration,
    /// Builds the prompt from one input document.
    pub prompt: fn(&str) -> String,
}

/// Accounting from one demux pass. The union of the three sets covers
/// every key that was submitted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DemuxReport {
    /// Keys whose output artifact was written.
    pub written: Vec<String>,
    /// Keys whose record carried a per-key error (logged, no artifact).
    pub failed: Vec<String>,
    /// Submitted keys absent from the results. The backend may silently
    /// drop a record; the gap is reported, never fabricated as success.
    pub missing: Vec<String>,
}

/// Drives one bulk inference job end to end.
///
/// A job handle lives only for the duration of `run`; it is not persisted,
/// so a crashed run resubmits rather than resuming (single long-lived run
/// assumption).
pub struct BatchJobOrchestrator {
    backend: Arc<dyn BatchBackend>,
    error_log: Arc<ErrorLog>,
}

impl BatchJobOrchestrator {
    pub fn new(backend: Arc<dyn BatchBackend>, error_log: Arc<ErrorLog>) -> Self {
        Self { backend, error_log }
    }

    /// Build, submit, poll to completion, fetch, and demux one batch.
    pub async fn run(&self, plan: &BatchPlan) -> Result<DemuxReport, CasenoteError> {
        let batch = self.build(plan).await?;
        if batch.is_empty() {
            tracing::warn!(prefix = %plan.key_prefix, "no inputs found, nothing to submit");
            return Ok(DemuxReport::default());
        }

        let jsonl = batch.to_jsonl();
        tokio::fs::write(&plan.requests_path, &jsonl)
            .await
            .with_context(|| format!("writing {}", plan.requests_path.display()))?;
        tracing::info!(
            requests = batch.len(),
            path = %plan.requests_path.display(),
            "wrote batch requests"
        );

        let file = self.backend.upload(&jsonl, &plan.display_name).await?;
        let job = self.backend.create_job(&file, &plan.display_name).await?;

        loop {
            let state = self.backend.poll(&job).await?;
            tracing::info!(job = %job, state = %state, "batch state");

            if state == JobState::Succeeded {
                break;
            }
            if state.is_terminal() {
                return Err(CasenoteError::JobFailed { state });
            }
            tokio::time::sleep(plan.poll_interval).await;
        }

        let raw = self.backend.fetch(&job).await?;
        tokio::fs::write(&plan.results_path, &raw)
            .await
            .with_context(|| format!("writing {}", plan.results_path.display()))?;

        self.demux(plan, &raw, &batch).await
    }

    /// BUILD: one request per existing input document. Missing inputs are
    /// logged and skipped; duplicate keys are rejected before submission.
    async fn build(&self, plan: &BatchPlan) -> Result<KeyedBatch, CasenoteError> {
        let mut requests = Vec::new();

        for index in 1..=plan.total_items {
            let item_key = ItemKey::from_index(index);
            let path = plan.input.path(&item_key);

            if !path.exists() {
                tracing::warn!(path = %path.display(), "missing input, skipping");
                continue;
            }

            let document = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;

            requests.push(BatchRequest {
                key: format!("{}_{}", plan.key_prefix, item_key),
                prompt: (plan.prompt)(&document),
            });
        }

        KeyedBatch::new(requests)
    }

    /// DEMUX: map the flat result collection back to per-key artifacts.
    async fn demux(
        &self,
        plan: &BatchPlan,
        raw: &str,
        batch: &KeyedBatch,
    ) -> Result<DemuxReport, CasenoteError> {
        let mut report = DemuxReport::default();
        let namespace = format!("{}_", plan.key_prefix);

        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let record: ResultRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable result line, skipping");
                    continue;
                }
            };

            // Defends against a mixed result file.
            let Some(suffix) = record.key.strip_prefix(&namespace) else {
                tracing::debug!(key = %record.key, "result outside batch namespace, ignoring");
                continue;
            };

            match record.outcome() {
                Outcome::Success { text } => {
                    let path = plan.output.path(&ItemKey::from_raw(suffix));
                    tokio::fs::write(&path, &text)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(key = %record.key, path = %path.display(), "wrote output");
                    report.written.push(record.key);
                }
                Outcome::Failure { detail } => {
                    tracing::error!(key = %record.key, error = %detail, "per-key failure");
                    self.error_log
                        .append(&record.key, &plan.display_name, &detail)
                        .await?;
                    report.failed.push(record.key);
                }
            }
        }

        for key in batch.keys() {
            let accounted = report.written.iter().any(|k| k == key)
                || report.failed.iter().any(|k| k == key);
            if !accounted {
                tracing::warn!(key = %key, "no result record for submitted key");
                report.missing.push(key.to_string());
            }
        }

        tracing::info!(
            written = report.written.len(),
            failed = report.failed.len(),
            missing = report.missing.len(),
            "demux finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct MockBackend {
        states: Mutex<VecDeque<JobState>>,
        results: String,
        uploads: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn new(states: Vec<JobState>, results: &str) -> Self {
            Self {
                states: Mutex::new(states.into()),
                results: results.to_string(),
                uploads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl BatchBackend for MockBackend {
        async fn upload(&self, jsonl: &str, _display_name: &str) -> anyhow::Result<String> {
            self.uploads.lock().await.push(jsonl.to_string());
            Ok("files/mock".to_string())
        }

        async fn create_job(&self, _file: &str, _display_name: &str) -> anyhow::Result<String> {
            Ok("batches/mock".to_string())
        }

        async fn poll(&self, _job: &str) -> anyhow::Result<JobState> {
            let mut states = self.states.lock().await;
            Ok(states.pop_front().unwrap_or(JobState::Succeeded))
        }

        async fn fetch(&self, _job: &str) -> anyhow::Result<String> {
            Ok(self.results.clone())
        }
    }

    fn test_prompt(document: &str) -> String {
        format!("PROMPT:{document}")
    }

    fn plan_in(dir: &std::path::Path) -> BatchPlan {
        BatchPlan {
            input: ArtifactSpec::new(dir, "transcript_raw", "json"),
            output: ArtifactSpec::new(dir, "narrative", "txt"),
            key_prefix: "transcript_raw".to_string(),
            display_name: "narratives".to_string(),
            total_items: 4,
            requests_path: dir.join("batch_requests.jsonl"),
            results_path: dir.join("batch_results.jsonl"),
            poll_interval: Duration::from_millis(5),
            prompt: test_prompt,
        }
    }

    fn success_line(key: &str, text: &str) -> String {
        serde_json::json!({
            "key": key,
            "response": {"candidates": [{"content": {"parts": [{"text": text}]}}]}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_demux_accounts_for_every_submitted_key() {
        let dir = tempfile::tempdir().unwrap();
        // Inputs 01, 02, 04 exist; 03 is a missing input (skipped at build).
        for i in [1usize, 2, 4] {
            std::fs::write(
                dir.path().join(format!("transcript_raw_{:02}.json", i)),
                format!("[\"doc {i}\"]"),
            )
            .unwrap();
        }

        let results = [
            success_line("transcript_raw_01", "  Narrative: one.  "),
            // Per-key error: logged, no artifact.
            serde_json::json!({
                "key": "transcript_raw_02",
                "error": {"message": "safety block"}
            })
            .to_string(),
            // Foreign namespace: ignored entirely.
            success_line("narrative_09", "not ours"),
            // Malformed line: skipped.
            "{not json".to_string(),
            // transcript_raw_04 silently dropped by the backend.
        ]
        .join("\n");

        let backend = Arc::new(MockBackend::new(
            vec![JobState::Pending, JobState::Running, JobState::Succeeded],
            &results,
        ));
        let log_path = dir.path().join("errors.log");
        let orchestrator =
            BatchJobOrchestrator::new(backend.clone(), Arc::new(ErrorLog::new(&log_path)));

        let plan = plan_in(dir.path());
        let report = orchestrator.run(&plan).await.unwrap();

        assert_eq!(report.written, vec!["transcript_raw_01"]);
        assert_eq!(report.failed, vec!["transcript_raw_02"]);
        assert_eq!(report.missing, vec!["transcript_raw_04"]);

        // Trimmed payload written for the successful key only.
        let narrative = std::fs::read_to_string(dir.path().join("narrative_01.txt")).unwrap();
        assert_eq!(narrative, "Narrative: one.");
        assert!(!dir.path().join("narrative_02.txt").exists());
        assert!(!dir.path().join("narrative_04.txt").exists());
        assert!(!dir.path().join("narrative_09.txt").exists());

        // One logged per-key failure; request and result JSONL persisted.
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log.matches("--- ERROR").count(), 1);
        assert!(log.contains("transcript_raw_02"));
        assert!(plan.requests_path.exists());
        assert!(plan.results_path.exists());

        // The uploaded JSONL held one request per existing input, with the
        // prompt built from the document.
        let uploads = backend.uploads.lock().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].lines().count(), 3);
        assert!(uploads[0].contains("PROMPT:[\"doc 1\"]"));
    }

    #[tokio::test]
    async fn test_terminal_failure_aborts_with_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("transcript_raw_01.json"), "[]").unwrap();

        let backend = Arc::new(MockBackend::new(
            vec![JobState::Running, JobState::Failed],
            "",
        ));
        let orchestrator = BatchJobOrchestrator::new(
            backend,
            Arc::new(ErrorLog::new(dir.path().join("errors.log"))),
        );

        let result = orchestrator.run(&plan_in(dir.path())).await;
        match result {
            Err(CasenoteError::JobFailed { state }) => assert_eq!(state, JobState::Failed),
            other => panic!("expected JobFailed, got {other:?}"),
        }
        // Nothing demuxed.
        assert!(!dir.path().join("narrative_01.txt").exists());
    }

    #[tokio::test]
    async fn test_empty_batch_submits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new(vec![], ""));
        let orchestrator = BatchJobOrchestrator::new(
            backend.clone(),
            Arc::new(ErrorLog::new(dir.path().join("errors.log"))),
        );

        let report = orchestrator.run(&plan_in(dir.path())).await.unwrap();
        assert_eq!(report, DemuxReport::default());
        assert!(backend.uploads.lock().await.is_empty());
    }
}
