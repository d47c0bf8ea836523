//! Runtime configuration, built once at startup and never mutated.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CasenoteError;

/// Seconds between batch job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Pipeline configuration.
///
/// Credentials and paths come from the environment and the chosen data
/// directory; commands that talk to the generative backend call
/// [`Config::require_api_key`] so a missing key fails before any work.
#[derive(Debug, Clone)]
pub struct Config {
    /// Run directory holding audio, transcripts, and the error log.
    pub data_dir: PathBuf,
    /// Generated narratives directory.
    pub narratives_dir: PathBuf,
    /// Extracted atomic facts directory.
    pub facts_dir: PathBuf,
    /// Scoring output directory.
    pub scores_dir: PathBuf,
    /// Generative backend API key (`GEMINI_API_KEY`).
    pub api_key: Option<String>,
    /// Generation model for batch jobs.
    pub model: String,
    /// Embedding model for semantic scoring.
    pub embedding_model: String,
    /// Interval between batch status polls.
    pub poll_interval: Duration,
    /// Browser cookies file passed to yt-dlp (`CASENOTE_COOKIES`).
    pub cookies_file: Option<PathBuf>,
    /// Hugging Face token for the diarization model (`HF_TOKEN`).
    pub hf_token: Option<String>,
}

impl Config {
    /// Build configuration rooted at `data_dir`, reading credentials from
    /// the environment. Falls back to the platform data dir when no run
    /// directory is given.
    pub fn load(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("casenote")
        });

        Self {
            narratives_dir: data_dir.join("narratives"),
            facts_dir: data_dir.join("atomic_facts"),
            scores_dir: data_dir.join("scores"),
            data_dir,
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: "models/gemini-2.5-pro".to_string(),
            embedding_model: "models/text-embedding-004".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cookies_file: std::env::var("CASENOTE_COOKIES").ok().map(PathBuf::from),
            hf_token: std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    /// Ensure all output directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.narratives_dir)?;
        std::fs::create_dir_all(&self.facts_dir)?;
        std::fs::create_dir_all(&self.scores_dir)?;
        Ok(())
    }

    /// API key, or a configuration error before any backend call is made.
    pub fn require_api_key(&self) -> Result<&str, CasenoteError> {
        self.api_key.as_deref().ok_or_else(|| {
            CasenoteError::Config("GEMINI_API_KEY is not set".to_string())
        })
    }

    /// Path of the append-only error log for this run.
    pub fn error_log_path(&self) -> PathBuf {
        self.data_dir.join("errors.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_derive_from_data_dir() {
        let config = Config::load(Some(PathBuf::from("outputs")));
        assert_eq!(config.data_dir, PathBuf::from("outputs"));
        assert_eq!(config.narratives_dir, PathBuf::from("outputs/narratives"));
        assert_eq!(config.error_log_path(), PathBuf::from("outputs/errors.log"));
    }

    #[test]
    fn test_require_api_key_fails_when_unset() {
        let mut config = Config::load(Some(PathBuf::from("outputs")));
        config.api_key = None;
        assert!(config.require_api_key().is_err());

        config.api_key = Some("k".to_string());
        assert_eq!(config.require_api_key().unwrap(), "k");
    }
}
