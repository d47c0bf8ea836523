//! Gemini embedding backend for semantic similarity.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::SentenceEmbedder;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Embeds sentences via the hosted `embedContent` endpoint.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    /// Create an embedder for the given API key and model
    /// (e.g. `models/text-embedding-004`).
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl SentenceEmbedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).context("Invalid API key format")?,
        );

        let request = EmbedRequest {
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
        };

        let response = self
            .client
            .post(format!(
                "{GEMINI_BASE_URL}/v1beta/{}:embedContent",
                self.model
            ))
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ApiError = response.json().await?;
            return Err(anyhow!("Embedding request failed: {}", error.error.message));
        }

        let embedded: EmbedResponse = response.json().await?;
        Ok(embedded.embedding.values)
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    content: EmbedContent<'a>,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
