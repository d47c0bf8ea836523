//! Concrete pipeline stages: fetch audio, transcribe, project fields.

mod fetch;
mod project;
mod transcribe;

pub use fetch::FetchAudioStage;
pub use project::ProjectStage;
pub use transcribe::{TranscribeStage, Transcriber, WhisperxCli};

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;

/// Run an external tool to completion, failing on a non-zero exit.
pub(crate) async fn run_tool(mut cmd: Command, tool: &str) -> Result<()> {
    let status = cmd
        .stdout(Stdio::null())
        .status()
        .await
        .with_context(|| format!("spawning {tool}"))?;
    anyhow::ensure!(status.success(), "{tool} exited with {status}");
    Ok(())
}
