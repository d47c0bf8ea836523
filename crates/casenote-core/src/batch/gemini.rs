//! Gemini batch API backend.
//!
//! Uses reqwest against the Generative Language API: multipart file upload,
//! `batchGenerateContent` job creation, job polling, and result download.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::backend::BatchBackend;
use super::types::JobState;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Batch backend over the hosted Gemini API.
pub struct GeminiBatchBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiBatchBackend {
    /// Create a backend for the given API key and model
    /// (e.g. `models/gemini-2.5-pro`).
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).context("Invalid API key format")?,
        );
        Ok(headers)
    }

    /// Fetch the job resource and decode it.
    async fn get_job(&self, job: &str) -> Result<BatchJobResource> {
        let response = self
            .client
            .get(format!("{GEMINI_BASE_URL}/v1beta/{job}"))
            .headers(self.headers()?)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ApiError = response.json().await?;
            return Err(anyhow!("Failed to get batch job: {}", error.error.message));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl BatchBackend for GeminiBatchBackend {
    async fn upload(&self, jsonl: &str, display_name: &str) -> Result<String> {
        let metadata = serde_json::to_string(&UploadMetadata {
            file: UploadFileMetadata { display_name },
        })?;

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata).mime_str("application/json")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::text(jsonl.to_string())
                    .file_name(format!("{display_name}.jsonl"))
                    .mime_str("application/jsonl")?,
            );

        let response = self
            .client
            .post(format!("{GEMINI_BASE_URL}/upload/v1beta/files"))
            .headers(self.headers()?)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ApiError = response.json().await?;
            return Err(anyhow!("Failed to upload requests: {}", error.error.message));
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::info!(file = %uploaded.file.name, "uploaded request file");
        Ok(uploaded.file.name)
    }

    async fn create_job(&self, file: &str, display_name: &str) -> Result<String> {
        let request = CreateBatchRequest {
            batch: BatchSpec {
                display_name,
                input_config: InputConfig { file_name: file },
            },
        };

        let mut headers = self.headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .post(format!(
                "{GEMINI_BASE_URL}/v1beta/{}:batchGenerateContent",
                self.model
            ))
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ApiError = response.json().await?;
            return Err(anyhow!("Failed to create batch job: {}", error.error.message));
        }

        let job: BatchJobResource = response.json().await?;
        tracing::info!(job = %job.name, "batch job started");
        Ok(job.name)
    }

    async fn poll(&self, job: &str) -> Result<JobState> {
        let resource = self.get_job(job).await?;
        Ok(JobState::from_wire(resource.state()))
    }

    async fn fetch(&self, job: &str) -> Result<String> {
        let resource = self.get_job(job).await?;
        let file = resource
            .results_file()
            .ok_or_else(|| anyhow!("job {} reports no results file", job))?;

        let response = self
            .client
            .get(format!(
                "{GEMINI_BASE_URL}/download/v1beta/{file}:download?alt=media"
            ))
            .headers(self.headers()?)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ApiError = response.json().await?;
            return Err(anyhow!("Failed to download results: {}", error.error.message));
        }

        Ok(response.text().await?)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    file: UploadFileMetadata<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadFileMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateBatchRequest<'a> {
    batch: BatchSpec<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchSpec<'a> {
    display_name: &'a str,
    input_config: InputConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig<'a> {
    file_name: &'a str,
}

/// Batch job resource. The state and result file location have moved
/// between API revisions, so both spellings are accepted.
#[derive(Debug, Deserialize)]
struct BatchJobResource {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    metadata: Option<BatchJobMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchJobMetadata {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    output: Option<BatchOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchOutput {
    #[serde(default)]
    responses_file: Option<String>,
}

impl BatchJobResource {
    fn state(&self) -> &str {
        self.state
            .as_deref()
            .or_else(|| self.metadata.as_ref().and_then(|m| m.state.as_deref()))
            .unwrap_or("")
    }

    fn results_file(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .output
            .as_ref()?
            .responses_file
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
