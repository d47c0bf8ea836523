//! Transcription stage: speech-to-text with alignment and diarization.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::artifact::ArtifactSpec;
use crate::runner::{Stage, WorkItem};

use super::run_tool;

/// Speech-to-text collaborator. Produces a JSON list of diarized segments,
/// each with at least `start`, `end`, `text`, and `speaker`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path, output: &Path) -> Result<()>;
}

/// Shells out to the whisperx CLI for transcription, alignment, and
/// diarization in one pass.
pub struct WhisperxCli {
    pub model: String,
    pub language: String,
    pub hf_token: Option<String>,
}

impl Default for WhisperxCli {
    fn default() -> Self {
        Self {
            model: "large-v3".to_string(),
            language: "en".to_string(),
            hf_token: None,
        }
    }
}

impl WhisperxCli {
    /// whisperx writes `<stem>.json` wrapping the segment list; keep only
    /// the segments, matching the declared artifact shape.
    async fn collect_segments(&self, audio: &Path, scratch: &Path, output: &Path) -> Result<()> {
        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .context("audio path has no file stem")?;
        let produced = scratch.join(format!("{stem}.json"));
        let raw = tokio::fs::read_to_string(&produced)
            .await
            .with_context(|| format!("reading whisperx output {}", produced.display()))?;

        let wrapped: Value = serde_json::from_str(&raw).context("parsing whisperx output")?;
        let segments = wrapped
            .get("segments")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));

        tokio::fs::write(output, serde_json::to_string_pretty(&segments)?)
            .await
            .with_context(|| format!("writing {}", output.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Transcriber for WhisperxCli {
    async fn transcribe(&self, audio: &Path, output: &Path) -> Result<()> {
        let scratch = std::env::temp_dir().join(format!("whisperx_{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&scratch)
            .await
            .context("creating whisperx scratch dir")?;

        let mut cmd = Command::new("whisperx");
        cmd.arg(audio)
            .arg("--model")
            .arg(&self.model)
            .arg("--language")
            .arg(&self.language)
            .arg("--diarize")
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(&scratch);
        if let Some(token) = &self.hf_token {
            cmd.arg("--hf_token").arg(token);
        }
        let ran = run_tool(cmd, "whisperx").await;

        let result = match ran {
            Ok(()) => self.collect_segments(audio, &scratch, output).await,
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            tracing::warn!(path = %scratch.display(), error = %e, "failed to remove scratch dir");
        }
        result
    }
}

/// Runs the configured transcriber over the fetched audio artifact.
pub struct TranscribeStage {
    input: ArtifactSpec,
    output: ArtifactSpec,
    transcriber: Arc<dyn Transcriber>,
}

impl TranscribeStage {
    pub fn new(input: ArtifactSpec, output: ArtifactSpec, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            input,
            output,
            transcriber,
        }
    }
}

#[async_trait]
impl Stage for TranscribeStage {
    fn name(&self) -> &str {
        "transcribe"
    }

    fn output(&self) -> &ArtifactSpec {
        &self.output
    }

    async fn run(&self, item: &WorkItem) -> Result<()> {
        let key = item.key();
        let audio = self.input.path(&key);
        let transcript = self.output.path(&key);

        self.transcriber.transcribe(&audio, &transcript).await?;
        tracing::info!(key = %key, path = %transcript.display(), "saved raw transcript");
        Ok(())
    }
}
