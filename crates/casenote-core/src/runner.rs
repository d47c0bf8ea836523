//! Per-item, multi-stage pipeline driver.
//!
//! Drives a fixed ordered list of work items through a fixed ordered list
//! of stages. A stage is skipped when its declared output artifact already
//! exists; a failure anywhere in one item's stage sequence stops that item,
//! is appended to the error log, and never aborts the rest of the batch.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::artifact::{ArtifactSpec, ItemKey};
use crate::error_log::ErrorLog;

/// One unit of work: 1-based index plus a source descriptor (a URL).
/// The item list is fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub index: usize,
    pub source: String,
}

impl WorkItem {
    pub fn new(index: usize, source: impl Into<String>) -> Self {
        Self {
            index,
            source: source.into(),
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::from_index(self.index)
    }
}

/// An ordered pipeline step.
///
/// Each stage declares its output artifact; existence of that artifact is
/// the completion predicate. `run` reads earlier stages' artifacts for the
/// same key and writes its own declared artifact on success.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Declared output artifact for this stage.
    fn output(&self) -> &ArtifactSpec;

    async fn run(&self, item: &WorkItem) -> Result<()>;
}

/// Counts from one runner invocation. A non-zero `failed` after an
/// otherwise-successful run means the error log holds the items to re-drive.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Items that made it through every stage.
    pub completed: usize,
    /// Items stopped by a stage failure.
    pub failed: usize,
    /// Stage executions performed.
    pub stages_ran: usize,
    /// Stage executions skipped because the artifact already existed.
    pub stages_skipped: usize,
}

/// Sequential driver with per-item failure isolation.
///
/// Items run strictly in order; within an item, stages run in declared
/// order. Each key's artifact namespace is disjoint, so items could run
/// concurrently, but the external services downstream are the cost center
/// and sequential blocking keeps the failure story simple.
pub struct StageRunner {
    stages: Vec<Box<dyn Stage>>,
    error_log: Arc<ErrorLog>,
}

impl StageRunner {
    pub fn new(stages: Vec<Box<dyn Stage>>, error_log: Arc<ErrorLog>) -> Self {
        Self { stages, error_log }
    }

    /// Process every item through all stages, resuming from existing
    /// artifacts. Never returns an error: per-item failures are logged and
    /// counted instead.
    pub async fn run(&self, items: &[WorkItem]) -> RunSummary {
        let mut summary = RunSummary::default();

        for item in items {
            let key = item.key();
            tracing::info!(key = %key, source = %item.source, "processing item");

            match self.run_item(item, &key, &mut summary).await {
                Ok(()) => {
                    summary.completed += 1;
                    tracing::info!(key = %key, "item done");
                }
                Err((stage, e)) => {
                    summary.failed += 1;
                    tracing::error!(key = %key, stage = %stage, error = %e, "item failed");
                    if let Err(log_err) = self
                        .error_log
                        .append(key.as_str(), &stage, &format!("source: {}\n{e:?}", item.source))
                        .await
                    {
                        tracing::warn!(key = %key, error = %log_err, "failed to write error log");
                    }
                }
            }
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            ran = summary.stages_ran,
            skipped = summary.stages_skipped,
            "run finished"
        );
        summary
    }

    /// Run all stages for one item. On failure, returns the failing stage
    /// name with the error; remaining stages for this item do not run.
    async fn run_item(
        &self,
        item: &WorkItem,
        key: &ItemKey,
        summary: &mut RunSummary,
    ) -> std::result::Result<(), (String, anyhow::Error)> {
        for stage in &self.stages {
            if stage.output().is_complete(key) {
                tracing::info!(key = %key, stage = stage.name(), "artifact exists, skipping");
                summary.stages_skipped += 1;
                continue;
            }

            stage
                .run(item)
                .await
                .with_context(|| format!("stage {} failed for item {}", stage.name(), key))
                .map_err(|e| (stage.name().to_string(), e))?;
            summary.stages_ran += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stage that writes its artifact, optionally failing for one key.
    struct FakeStage {
        name: String,
        output: ArtifactSpec,
        fail_for: Option<ItemKey>,
        runs: AtomicUsize,
    }

    impl FakeStage {
        fn new(dir: &Path, name: &str, prefix: &str) -> Self {
            Self {
                name: name.to_string(),
                output: ArtifactSpec::new(dir, prefix, "txt"),
                fail_for: None,
                runs: AtomicUsize::new(0),
            }
        }

        fn failing_for(mut self, key: ItemKey) -> Self {
            self.fail_for = Some(key);
            self
        }
    }

    #[async_trait]
    impl Stage for &'static FakeStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn output(&self) -> &ArtifactSpec {
            &self.output
        }

        async fn run(&self, item: &WorkItem) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let key = item.key();
            if self.fail_for.as_ref() == Some(&key) {
                anyhow::bail!("induced failure");
            }
            std::fs::write(self.output.path(&key), self.name.as_bytes())?;
            Ok(())
        }
    }

    fn leak(stage: FakeStage) -> &'static FakeStage {
        Box::leak(Box::new(stage))
    }

    fn items(n: usize) -> Vec<WorkItem> {
        (1..=n)
            .map(|i| WorkItem::new(i, format!("https://example.com/v{i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_second_run_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = leak(FakeStage::new(dir.path(), "fetch", "audio"));
        let s2 = leak(FakeStage::new(dir.path(), "transcribe", "transcript_raw"));
        let log = Arc::new(ErrorLog::new(dir.path().join("errors.log")));

        let runner = StageRunner::new(vec![Box::new(s1), Box::new(s2)], log);
        let items = items(3);

        let first = runner.run(&items).await;
        assert_eq!(first.completed, 3);
        assert_eq!(first.stages_ran, 6);
        assert_eq!(first.stages_skipped, 0);

        let second = runner.run(&items).await;
        assert_eq!(second.completed, 3);
        assert_eq!(second.stages_ran, 0);
        assert_eq!(second.stages_skipped, 6);
        // No action was invoked again.
        assert_eq!(s1.runs.load(Ordering::SeqCst), 3);
        assert_eq!(s2.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_one_item() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = leak(FakeStage::new(dir.path(), "fetch", "audio"));
        let s2 = leak(
            FakeStage::new(dir.path(), "transcribe", "transcript_raw")
                .failing_for(ItemKey::from_index(2)),
        );
        let s3 = leak(FakeStage::new(dir.path(), "project", "transcript"));
        let log_path = dir.path().join("errors.log");
        let log = Arc::new(ErrorLog::new(&log_path));

        let runner = StageRunner::new(vec![Box::new(s1), Box::new(s2), Box::new(s3)], log);
        let summary = runner.run(&items(3)).await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);

        let key2 = ItemKey::from_index(2);
        // Stage 1's artifact for the failed item persists.
        assert!(s1.output().is_complete(&key2));
        // Stage 3 never ran for it.
        assert!(!s3.output().is_complete(&key2));
        assert_eq!(s3.runs.load(Ordering::SeqCst), 2);

        // Exactly one error entry was appended.
        let log_text = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log_text.matches("--- ERROR").count(), 1);
        assert!(log_text.contains("--- ERROR 02 [transcribe]"));

        // All other items completed fully.
        for i in [1, 3] {
            assert!(s3.output().is_complete(&ItemKey::from_index(i)));
        }
    }

    #[tokio::test]
    async fn test_rerun_after_failure_retries_only_missing_work() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = leak(FakeStage::new(dir.path(), "fetch", "audio"));
        let s2 = leak(
            FakeStage::new(dir.path(), "transcribe", "transcript_raw")
                .failing_for(ItemKey::from_index(1)),
        );
        let log = Arc::new(ErrorLog::new(dir.path().join("errors.log")));

        let runner = StageRunner::new(vec![Box::new(s1), Box::new(s2)], log.clone());
        let first = runner.run(&items(1)).await;
        assert_eq!(first.failed, 1);

        // The fixed stage set succeeds on re-run, reusing stage 1's artifact.
        let s2_fixed = leak(FakeStage::new(dir.path(), "transcribe", "transcript_raw"));
        let runner = StageRunner::new(vec![Box::new(s1), Box::new(s2_fixed)], log);
        let second = runner.run(&items(1)).await;

        assert_eq!(second.completed, 1);
        assert_eq!(second.stages_skipped, 1);
        assert_eq!(second.stages_ran, 1);
        assert_eq!(s1.runs.load(Ordering::SeqCst), 1);
    }
}
