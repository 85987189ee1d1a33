//! Embedding provider contract and the Ollama HTTP adapter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(60);

/// Maps text to fixed-dimension vectors.
///
/// Implementations must fail observably on provider errors; returning a zero
/// or cached vector in place of a failed call is not allowed.
pub trait Embedder {
    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving input order.
    ///
    /// The default calls [`Embedder::embed`] once per text and names the
    /// failing item in the error.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                self.embed(text).map_err(|e| match provider_error(e) {
                    Error::EmbeddingUnavailable(msg) => {
                        Error::EmbeddingUnavailable(format!("item {i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Identifier of the underlying model, recorded alongside built stores.
    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_many(texts)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Fold any failure reported by an [`Embedder`] into
/// [`Error::EmbeddingUnavailable`].
pub fn provider_error(e: Error) -> Error {
    match e {
        Error::EmbeddingUnavailable(_) => e,
        other => Error::EmbeddingUnavailable(other.to_string()),
    }
}

/// Connection settings for [`OllamaEmbedder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderConfig {
    /// Server root, e.g. `http://localhost:11434`.
    pub base_url: String,
    pub model: String,
    /// Per-request timeout covering connect, send and read.
    pub timeout: Duration,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_EMBED_MODEL.to_string(),
            timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// Blocking client for Ollama's `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    config: EmbedderConfig,
    client: reqwest::blocking::Client,
}

impl OllamaEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                Error::EmbeddingUnavailable(format!(
                    "failed to build HTTP client: {e}"
                ))
            })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EmbedderConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/embeddings",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request timed out after {:?}", self.config.timeout)
                } else {
                    format!("request failed: {e}")
                };
                Error::EmbeddingUnavailable(reason)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(Error::EmbeddingUnavailable(format!(
                "server returned {status}: {body}"
            )));
        }

        let body: EmbeddingsResponse = response.json().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("response timed out after {:?}", self.config.timeout)
            } else {
                format!("malformed response: {e}")
            };
            Error::EmbeddingUnavailable(reason)
        })?;
        if body.embedding.is_empty() {
            return Err(Error::EmbeddingUnavailable(format!(
                "model {} returned an empty embedding",
                self.config.model
            )));
        }

        debug!(
            model = %self.config.model,
            dimension = body.embedding.len(),
            "embedded text"
        );
        Ok(body.embedding)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
