//! Diarized transcript segments and field projection.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One diarized segment. Timing fields are optional; text and speaker
/// default to empty so padded segments compare cleanly during scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub speaker: String,
}

impl Segment {
    /// Empty padding segment used to equalize list lengths before scoring.
    pub fn padding() -> Self {
        Self::default()
    }
}

/// Load a JSON array of segments.
pub async fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing segments in {}", path.display()))
}

/// Keys kept by [`project_fields`].
const KEPT_FIELDS: [&str; 4] = ["start", "end", "text", "speaker"];

/// Project a raw diarized transcript down to the four kept fields per
/// segment, preserving only keys actually present in the input.
///
/// Pure filter: fails only on unreadable or malformed input.
pub async fn project_fields(input: &Path, output: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let segments: Vec<Value> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;

    let filtered: Vec<Value> = segments
        .into_iter()
        .map(|segment| {
            let mut kept = serde_json::Map::new();
            if let Value::Object(fields) = segment {
                for key in KEPT_FIELDS {
                    if let Some(value) = fields.get(key) {
                        kept.insert(key.to_string(), value.clone());
                    }
                }
            }
            Value::Object(kept)
        })
        .collect();

    let rendered = serde_json::to_string_pretty(&filtered)?;
    tokio::fs::write(output, rendered)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_project_fields_drops_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        let output = dir.path().join("clean.json");

        let raw = serde_json::json!([
            {
                "start": 0.5,
                "end": 2.0,
                "text": "step out of the vehicle",
                "speaker": "SPEAKER_00",
                "words": [{"word": "step", "score": 0.99}],
                "avg_logprob": -0.2
            },
            {"text": "okay", "speaker": "SPEAKER_01"}
        ]);
        std::fs::write(&input, raw.to_string()).unwrap();

        project_fields(&input, &output).await.unwrap();

        let filtered: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered[0].get("words").is_none());
        assert!(filtered[0].get("avg_logprob").is_none());
        assert_eq!(filtered[0]["speaker"], "SPEAKER_00");
        // Keys absent from the input stay absent.
        assert!(filtered[1].get("start").is_none());
        assert_eq!(filtered[1]["text"], "okay");
    }

    #[tokio::test]
    async fn test_project_fields_rejects_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        std::fs::write(&input, "not json").unwrap();

        let result = project_fields(&input, &dir.path().join("clean.json")).await;
        assert!(result.is_err());
    }
}
