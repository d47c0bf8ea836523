//! Casenote command line interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use casenote_core::batch::GeminiBatchBackend;
use casenote_core::prompts;
use casenote_core::score::{score_transcripts, GeminiEmbedder};
use casenote_core::stages::{FetchAudioStage, ProjectStage, TranscribeStage, WhisperxCli};
use casenote_core::{
    ArtifactSpec, BatchJobOrchestrator, BatchPlan, Config, ErrorLog, StageRunner, WorkItem,
};

#[derive(Parser)]
#[command(name = "casenote", about = "Resumable bodycam transcript-to-report pipeline")]
struct Cli {
    /// Run directory for artifacts and the error log.
    #[arg(long, default_value = "outputs")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the fetch/transcribe/project stages over a source list.
    Run {
        /// File with one source URL per line; `#` starts a comment.
        urls: PathBuf,
    },
    /// Batch-generate report narratives from raw transcripts.
    Narratives {
        /// Highest item index to submit; defaults to the highest raw
        /// transcript on disk.
        #[arg(long)]
        total: Option<usize>,
    },
    /// Batch-extract atomic facts from generated narratives.
    Facts {
        #[arg(long)]
        total: Option<usize>,
    },
    /// Score a hypothesis transcript against ground truth.
    Score {
        ground_truth: PathBuf,
        hypothesis: PathBuf,
        /// Output prefix for the per-segment CSV and summary JSON.
        #[arg(long)]
        out_prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("casenote=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(Some(cli.data_dir));
    config.ensure_dirs().context("creating data directories")?;

    let error_log = Arc::new(ErrorLog::new(config.error_log_path()));

    match cli.command {
        Command::Run { urls } => run_pipeline(&config, error_log, &urls).await,
        Command::Narratives { total } => run_narratives(&config, error_log, total).await,
        Command::Facts { total } => run_facts(&config, error_log, total).await,
        Command::Score {
            ground_truth,
            hypothesis,
            out_prefix,
        } => run_score(&config, &ground_truth, &hypothesis, out_prefix).await,
    }
}

async fn run_pipeline(config: &Config, error_log: Arc<ErrorLog>, urls: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(urls)
        .await
        .with_context(|| format!("reading source list {}", urls.display()))?;
    let items: Vec<WorkItem> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(i, url)| WorkItem::new(i + 1, url))
        .collect();
    anyhow::ensure!(!items.is_empty(), "no source URLs in {}", urls.display());

    let audio = ArtifactSpec::new(&config.data_dir, "audio", "mp3");
    let raw_transcript = ArtifactSpec::new(&config.data_dir, "transcript_raw", "json");
    let clean_transcript = ArtifactSpec::new(&config.data_dir, "transcript", "json");

    let transcriber = Arc::new(WhisperxCli {
        hf_token: config.hf_token.clone(),
        ..Default::default()
    });
    let runner = StageRunner::new(
        vec![
            Box::new(FetchAudioStage::new(
                audio.clone(),
                config.cookies_file.clone(),
            )),
            Box::new(TranscribeStage::new(
                audio,
                raw_transcript.clone(),
                transcriber,
            )),
            Box::new(ProjectStage::new(raw_transcript, clean_transcript)),
        ],
        error_log,
    );

    let summary = runner.run(&items).await;
    if summary.failed > 0 {
        tracing::warn!(
            failed = summary.failed,
            log = %config.error_log_path().display(),
            "some items failed; the error log lists what to re-drive"
        );
    }
    Ok(())
}

async fn run_narratives(
    config: &Config,
    error_log: Arc<ErrorLog>,
    total: Option<usize>,
) -> Result<()> {
    let api_key = config.require_api_key()?;
    let total = match total {
        Some(total) => total,
        None => highest_index(&config.data_dir, "transcript_raw")?,
    };

    let plan = BatchPlan {
        input: ArtifactSpec::new(&config.data_dir, "transcript_raw", "json"),
        output: ArtifactSpec::new(&config.narratives_dir, "narrative", "txt"),
        key_prefix: "transcript_raw".to_string(),
        display_name: "police-narratives".to_string(),
        total_items: total,
        requests_path: config.data_dir.join("batch_requests.jsonl"),
        results_path: config.data_dir.join("batch_results.jsonl"),
        poll_interval: config.poll_interval,
        prompt: prompts::narrative_prompt,
    };

    let backend = Arc::new(GeminiBatchBackend::new(api_key, &config.model));
    let report = BatchJobOrchestrator::new(backend, error_log).run(&plan).await?;
    tracing::info!(
        written = report.written.len(),
        failed = report.failed.len(),
        missing = report.missing.len(),
        "narrative batch finished"
    );
    Ok(())
}

async fn run_facts(config: &Config, error_log: Arc<ErrorLog>, total: Option<usize>) -> Result<()> {
    let api_key = config.require_api_key()?;
    let total = match total {
        Some(total) => total,
        None => highest_index(&config.narratives_dir, "narrative")?,
    };

    let plan = BatchPlan {
        input: ArtifactSpec::new(&config.narratives_dir, "narrative", "txt"),
        output: ArtifactSpec::new(&config.facts_dir, "atomic_facts", "txt"),
        key_prefix: "narrative".to_string(),
        display_name: "atomic-facts".to_string(),
        total_items: total,
        requests_path: config.data_dir.join("atomic_facts_requests.jsonl"),
        results_path: config.data_dir.join("atomic_facts_results.jsonl"),
        poll_interval: config.poll_interval,
        prompt: prompts::atomic_facts_prompt,
    };

    let backend = Arc::new(GeminiBatchBackend::new(api_key, &config.model));
    let report = BatchJobOrchestrator::new(backend, error_log).run(&plan).await?;
    tracing::info!(
        written = report.written.len(),
        failed = report.failed.len(),
        missing = report.missing.len(),
        "atomic facts batch finished"
    );
    Ok(())
}

async fn run_score(
    config: &Config,
    ground_truth: &Path,
    hypothesis: &Path,
    out_prefix: Option<String>,
) -> Result<()> {
    let api_key = config.require_api_key()?;
    let out_prefix = out_prefix
        .unwrap_or_else(|| config.scores_dir.join("score").to_string_lossy().to_string());

    let embedder = GeminiEmbedder::new(api_key, &config.embedding_model);
    let summary = score_transcripts(&embedder, ground_truth, hypothesis, &out_prefix).await?;

    println!("Segments compared:        {}", summary.segments_compared);
    println!("Avg semantic similarity:  {:.4}", summary.average_semantic_similarity);
    println!("Avg WER:                  {:.4}", summary.average_wer);
    println!("Speaker accuracy:         {:.4}", summary.speaker_accuracy);
    Ok(())
}

/// Highest index among `prefix_NN.*` files in `dir`.
fn highest_index(dir: &Path, prefix: &str) -> Result<usize> {
    let pattern = format!("{prefix}_");
    let mut max = 0;

    let entries =
        std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(rest) = name.strip_prefix(&pattern) else {
            continue;
        };
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(index) = digits.parse::<usize>() {
            max = max.max(index);
        }
    }

    anyhow::ensure!(max > 0, "no {prefix}_* inputs in {}", dir.display());
    Ok(max)
}
