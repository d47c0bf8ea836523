//! Casenote Core - resumable media-to-report pipeline orchestration
//!
//! This crate contains the orchestration logic for Casenote:
//! - Artifact naming and idempotency predicates (`prefix_KEY.ext`)
//! - Stage runner with per-item failure isolation and resume-from-artifacts
//! - Keyed batch-job protocol (build, upload, submit, poll, fetch, demux)
//! - Concrete stages (fetch audio, transcribe/diarize, project fields)
//! - Transcript scoring (WER, semantic similarity, speaker accuracy)
//!
//! External services (yt-dlp, ffmpeg, whisperx, the Gemini API) sit behind
//! traits or subprocess boundaries; everything durable is a file artifact
//! keyed by item index, so a re-run resumes from partial progress.

pub mod artifact;
pub mod batch;
pub mod config;
pub mod error;
pub mod error_log;
pub mod prompts;
pub mod runner;
pub mod score;
pub mod stages;
pub mod transcript;

pub use artifact::{ArtifactSpec, ItemKey};
pub use batch::{BatchJobOrchestrator, BatchPlan, DemuxReport};
pub use config::Config;
pub use error::CasenoteError;
pub use error_log::ErrorLog;
pub use runner::{RunSummary, Stage, StageRunner, WorkItem};
