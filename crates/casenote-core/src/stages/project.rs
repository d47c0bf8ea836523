//! Field projection stage: raw diarized transcript to cleaned transcript.

use anyhow::Result;
use async_trait::async_trait;

use crate::artifact::ArtifactSpec;
use crate::runner::{Stage, WorkItem};
use crate::transcript;

/// Projects `transcript_raw_KEY.json` down to the four kept fields and
/// writes `transcript_KEY.json`.
pub struct ProjectStage {
    input: ArtifactSpec,
    output: ArtifactSpec,
}

impl ProjectStage {
    pub fn new(input: ArtifactSpec, output: ArtifactSpec) -> Self {
        Self { input, output }
    }
}

#[async_trait]
impl Stage for ProjectStage {
    fn name(&self) -> &str {
        "project"
    }

    fn output(&self) -> &ArtifactSpec {
        &self.output
    }

    async fn run(&self, item: &WorkItem) -> Result<()> {
        let key = item.key();
        let input = self.input.path(&key);
        let output = self.output.path(&key);

        transcript::project_fields(&input, &output).await?;
        tracing::info!(key = %key, path = %output.display(), "saved cleaned transcript");
        Ok(())
    }
}
