//! Source fetch stage: yt-dlp download plus ffmpeg audio extraction.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use crate::artifact::ArtifactSpec;
use crate::runner::{Stage, WorkItem};

use super::run_tool;

/// AVC video + AAC audio where available, with fallbacks.
const FORMAT_SELECTOR: &str =
    "bv*[vcodec^=avc1][ext=mp4]+ba[acodec^=mp4a][ext=m4a]/bv*[vcodec^=avc1]+ba/b[ext=mp4]";

/// Downloads the source video to a temp file and extracts `audio_KEY.mp3`.
pub struct FetchAudioStage {
    output: ArtifactSpec,
    work_dir: PathBuf,
    cookies_file: Option<PathBuf>,
}

impl FetchAudioStage {
    pub fn new(output: ArtifactSpec, cookies_file: Option<PathBuf>) -> Self {
        Self {
            work_dir: output.dir().to_path_buf(),
            output,
            cookies_file,
        }
    }
}

#[async_trait]
impl Stage for FetchAudioStage {
    fn name(&self) -> &str {
        "fetch"
    }

    fn output(&self) -> &ArtifactSpec {
        &self.output
    }

    async fn run(&self, item: &WorkItem) -> Result<()> {
        let temp_video = self
            .work_dir
            .join(format!("temp_{}.mp4", Uuid::new_v4().simple()));

        let mut download = Command::new("yt-dlp");
        if let Some(cookies) = &self.cookies_file {
            download.arg("--cookies").arg(cookies);
        }
        download
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg(&item.source)
            .arg("--extractor-args")
            .arg("youtube:player_js_version=actual")
            .arg("-o")
            .arg(&temp_video);
        run_tool(download, "yt-dlp").await?;

        let audio_path = self.output.path(&item.key());
        let mut extract = Command::new("ffmpeg");
        extract
            .arg("-y")
            .arg("-i")
            .arg(&temp_video)
            .arg("-vn")
            .arg("-acodec")
            .arg("mp3")
            .arg(&audio_path);
        let extracted = run_tool(extract, "ffmpeg").await;

        // Temp video is not an artifact; remove it even on failure.
        if let Err(e) = tokio::fs::remove_file(&temp_video).await {
            tracing::warn!(path = %temp_video.display(), error = %e, "failed to remove temp video");
        }
        extracted?;

        tracing::info!(key = %item.key(), path = %audio_path.display(), "saved audio");
        Ok(())
    }
}
