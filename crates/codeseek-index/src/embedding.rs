//! Embedding gateway: text in, fixed-dimension vector out.
//!
//! [`Embedder`] is the seam the index depends on. [`OllamaEmbedder`] is the
//! production implementation and talks to an Ollama-compatible
//! `/api/embeddings` endpoint.

use std::future::Future;
use std::time::Duration;

use codeseek_core::{CodeseekError, EmbeddingConfig};
use serde::{Deserialize, Serialize};

/// Converts text into an embedding vector.
///
/// Every vector returned by one embedder is expected to have the same
/// dimension; the index relies on that but does not enforce it.
pub trait Embedder: Send + Sync {
    /// Embed `text`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Embedding`] if the service call fails or the
    /// response carries no vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, CodeseekError>> + Send;
}

/// Client for an Ollama-compatible embeddings endpoint.
///
/// # Examples
///
/// ```
/// use codeseek_index::embedding::OllamaEmbedder;
///
/// let client = OllamaEmbedder::new("http://localhost:11434", "nomic-embed-text").unwrap();
/// assert_eq!(client.model(), "nomic-embed-text");
/// ```
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OllamaEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Older Ollama builds answer with `embedding`, newer ones with `embeddings`.
#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl EmbedResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        if !self.embedding.is_empty() {
            return Some(self.embedding);
        }
        self.embeddings.into_iter().next().filter(|v| !v.is_empty())
    }
}

impl OllamaEmbedder {
    /// Create a client for `base_url` using `model`, with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Embedding`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str) -> Result<Self, CodeseekError> {
        Self::build(base_url, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Config`] if the base URL is empty, or
    /// [`CodeseekError::Embedding`] if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use codeseek_core::EmbeddingConfig;
    /// use codeseek_index::embedding::OllamaEmbedder;
    ///
    /// let client = OllamaEmbedder::with_config(&EmbeddingConfig::default()).unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:11434");
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, CodeseekError> {
        if config.base_url.trim().is_empty() {
            return Err(CodeseekError::Config("embedding.base_url is empty".into()));
        }
        Self::build(
            &config.base_url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn build(base_url: &str, model: &str, timeout: Duration) -> Result<Self, CodeseekError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CodeseekError::Embedding(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL (without a trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.base_url)
    }
}

impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CodeseekError> {
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CodeseekError::Embedding(format!("request to {} timed out", self.base_url))
                } else {
                    CodeseekError::Embedding(format!("HTTP request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(CodeseekError::Embedding(format!(
                "embedding service returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CodeseekError::Embedding(format!("failed to parse response: {e}")))?;

        embed_response
            .into_vector()
            .ok_or_else(|| CodeseekError::Embedding("empty embedding in response".into()))
    }
}
