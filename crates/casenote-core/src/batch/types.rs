//! Wire types for keyed batch jobs.
//!
//! Requests and results travel as JSONL: one `{key, request}` line per
//! submitted prompt, one `{key, response|error}` line per result. Results
//! are decoded defensively so a malformed record degrades to a per-key
//! failure instead of a structural error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CasenoteError;

/// One keyed prompt awaiting submission. Keys are unique within a batch
/// and round-trip through the backend unchanged.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub key: String,
    pub prompt: String,
}

/// A validated request collection: construction rejects duplicate keys
/// before anything is submitted.
#[derive(Debug)]
pub struct KeyedBatch {
    requests: Vec<BatchRequest>,
}

impl KeyedBatch {
    pub fn new(requests: Vec<BatchRequest>) -> Result<Self, CasenoteError> {
        let mut seen = std::collections::HashSet::new();
        for request in &requests {
            if !seen.insert(request.key.clone()) {
                return Err(CasenoteError::DuplicateKey {
                    key: request.key.clone(),
                });
            }
        }
        Ok(Self { requests })
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn requests(&self) -> &[BatchRequest] {
        &self.requests
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(|r| r.key.as_str())
    }

    /// Render the batch as request JSONL, one record per line.
    pub fn to_jsonl(&self) -> String {
        let mut out = String::new();
        for request in &self.requests {
            let record = RequestRecord {
                key: &request.key,
                request: GenerateRequest {
                    contents: vec![Content {
                        parts: vec![Part {
                            text: &request.prompt,
                        }],
                    }],
                },
            };
            // Serialization of these fixed shapes cannot fail.
            out.push_str(&serde_json::to_string(&record).unwrap_or_default());
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Serialize)]
struct RequestRecord<'a> {
    key: &'a str,
    request: GenerateRequest<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Batch job lifecycle state as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Expired,
}

impl JobState {
    /// Map a wire state name. Unknown states are treated as still running
    /// so polling continues rather than misreading a new intermediate state
    /// as terminal.
    pub fn from_wire(state: &str) -> Self {
        match state {
            "JOB_STATE_PENDING" => Self::Pending,
            "JOB_STATE_RUNNING" => Self::Running,
            "JOB_STATE_SUCCEEDED" => Self::Succeeded,
            "JOB_STATE_FAILED" => Self::Failed,
            "JOB_STATE_CANCELLED" => Self::Cancelled,
            "JOB_STATE_EXPIRED" => Self::Expired,
            _ => Self::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// One result line keyed back to its request.
#[derive(Debug, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Per-key outcome after defensive decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { text: String },
    Failure { detail: String },
}

impl ResultRecord {
    /// Decode the record. Anything other than a well-formed success
    /// payload, including an unexpected response shape, is a `Failure`.
    pub fn outcome(&self) -> Outcome {
        if let Some(error) = &self.error {
            return Outcome::Failure {
                detail: error.to_string(),
            };
        }
        let Some(response) = &self.response else {
            return Outcome::Failure {
                detail: "record has neither response nor error".to_string(),
            };
        };
        match extract_text(response) {
            Some(text) if !text.is_empty() => Outcome::Success { text },
            _ => Outcome::Failure {
                detail: "response has no text parts".to_string(),
            },
        }
    }
}

/// Concatenate `candidates[0].content.parts[*].text`, trimmed of leading
/// and trailing whitespace.
fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    Some(text.trim().to_string())
}
