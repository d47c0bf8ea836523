//! Transcript scoring: WER, semantic similarity, speaker accuracy.
//!
//! Ground truth and hypothesis segment lists are padded to equal length
//! before comparison, so extra or hallucinated hypothesis segments are
//! penalized instead of ignored.

mod embedder;
pub mod wer;

pub use embedder::GeminiEmbedder;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::transcript::{load_segments, Segment};

/// Sentence embedding collaborator for semantic similarity.
#[async_trait]
pub trait SentenceEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Cosine similarity of two embedding vectors; 0.0 when either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        f64::from(dot / (norm_a * norm_b))
    }
}

/// Pad the shorter list with empty segments so both have equal length.
pub fn pad_to_equal(
    mut ground_truth: Vec<Segment>,
    mut hypothesis: Vec<Segment>,
) -> (Vec<Segment>, Vec<Segment>) {
    let target = ground_truth.len().max(hypothesis.len());
    ground_truth.resize_with(target, Segment::padding);
    hypothesis.resize_with(target, Segment::padding);
    (ground_truth, hypothesis)
}

/// One aligned segment pair's scores.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentScore {
    pub index: usize,
    pub gt_speaker: String,
    pub asr_speaker: String,
    pub speaker_correct: u8,
    pub semantic_similarity: f64,
    pub wer: f64,
    pub gt_text: String,
    pub asr_text: String,
}

/// Whole-file averages.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    pub segments_compared: usize,
    pub average_semantic_similarity: f64,
    pub average_wer: f64,
    pub speaker_accuracy: f64,
    pub notes: String,
}

/// Score a hypothesis transcript against ground truth. Writes
/// `{out_prefix}_per_segment.csv` and `{out_prefix}_summary.json`.
pub async fn score_transcripts(
    embedder: &dyn SentenceEmbedder,
    gt_path: &Path,
    asr_path: &Path,
    out_prefix: &str,
) -> Result<ScoreSummary> {
    let ground_truth = load_segments(gt_path).await?;
    let hypothesis = load_segments(asr_path).await?;

    let (orig_gt, orig_asr) = (ground_truth.len(), hypothesis.len());
    let (ground_truth, hypothesis) = pad_to_equal(ground_truth, hypothesis);
    tracing::info!(
        gt = orig_gt,
        asr = orig_asr,
        aligned = ground_truth.len(),
        "aligned segment lists"
    );

    let mut rows = Vec::with_capacity(ground_truth.len());
    let (mut total_sem, mut total_wer, mut speaker_ok) = (0.0f64, 0.0f64, 0usize);

    for (i, (gt, asr)) in ground_truth.iter().zip(&hypothesis).enumerate() {
        let gt_vec = embedder.embed(&gt.text).await?;
        let asr_vec = embedder.embed(&asr.text).await?;
        let sem = cosine_similarity(&gt_vec, &asr_vec);
        let word_err = wer::wer(&gt.text, &asr.text);
        let speaker_correct = u8::from(gt.speaker.trim() == asr.speaker.trim());

        total_sem += sem;
        total_wer += word_err;
        speaker_ok += usize::from(speaker_correct);

        rows.push(SegmentScore {
            index: i + 1,
            gt_speaker: gt.speaker.clone(),
            asr_speaker: asr.speaker.clone(),
            speaker_correct,
            semantic_similarity: round6(sem),
            wer: round6(word_err),
            gt_text: gt.text.clone(),
            asr_text: asr.text.clone(),
        });
    }

    let n = rows.len().max(1) as f64;
    let summary = ScoreSummary {
        segments_compared: rows.len(),
        average_semantic_similarity: round6(total_sem / n),
        average_wer: round6(total_wer / n),
        speaker_accuracy: round6(speaker_ok as f64 / n),
        notes: "Empty segments preserved. Shorter file padded with empty rows \
                so extra/hallucinated content is penalized."
            .to_string(),
    };

    let csv_path = format!("{out_prefix}_per_segment.csv");
    tokio::fs::write(&csv_path, render_csv(&rows))
        .await
        .with_context(|| format!("writing {csv_path}"))?;

    let summary_path = format!("{out_prefix}_summary.json");
    tokio::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
        .await
        .with_context(|| format!("writing {summary_path}"))?;

    tracing::info!(
        segments = summary.segments_compared,
        avg_semantic = summary.average_semantic_similarity,
        avg_wer = summary.average_wer,
        speaker_accuracy = summary.speaker_accuracy,
        "scoring finished"
    );
    Ok(summary)
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

fn render_csv(rows: &[SegmentScore]) -> String {
    let mut out = String::from(
        "index,gt_speaker,asr_speaker,speaker_correct,semantic_similarity,wer,gt_text,asr_text\n",
    );
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            row.index,
            csv_field(&row.gt_speaker),
            csv_field(&row.asr_speaker),
            row.speaker_correct,
            row.semantic_similarity,
            row.wer,
            csv_field(&row.gt_text),
            csv_field(&row.asr_text),
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
