//! Concrete embedding providers.
//!
//! - **[`HashProvider`]**: deterministic FNV-1a feature hashing over
//!   character unigrams and bigrams. Works offline and handles text without
//!   word boundaries (e.g. Japanese); the default.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **[`DisabledProvider`]**: every call fails.
//!
//! Use [`create_provider`] to pick one from configuration:
//!
//! ```rust
//! # use acl_rag::config::EmbeddingConfig;
//! # use acl_rag::embedding::create_provider;
//! let provider = create_provider(&EmbeddingConfig::default()).unwrap();
//! assert_eq!(provider.model_name(), "hash-ngram");
//! ```
//!
//! # Retry Strategy
//!
//! The OpenAI provider fails fast by default (`max_retries = 0`). With
//! retries configured:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use acl_rag_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

/// Dimensionality of [`HashProvider`] vectors when none is configured.
pub const DEFAULT_HASH_DIMS: usize = 256;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

// ============ Disabled Provider ============

/// A provider that always fails. Used when `embedding.provider = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Hash Provider ============

/// Feature-hashing embedder.
///
/// Lowercases the text, drops whitespace, and adds one count per
/// character and per adjacent character pair into `FNV-1a(gram) % dims`.
/// The result is L2-normalized; empty text maps to the zero vector.
pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn bucket(&self, gram: &str) -> usize {
        (fnv1a(gram.as_bytes()) % self.dims as u64) as usize
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let chars: Vec<char> = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let mut vector = vec![0.0f32; self.dims];
        let mut buf = [0u8; 8];
        for c in &chars {
            vector[self.bucket(c.encode_utf8(&mut buf))] += 1.0;
        }
        for pair in chars.windows(2) {
            let gram: String = pair.iter().collect();
            vector[self.bucket(&gram)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash-ngram"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config, or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(attempt, delay_secs = delay.as_secs(), "retrying OpenAI embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        debug!(model = %self.model, "OpenAI embedding received");
                        return parse_openai_response(&json)?
                            .into_iter()
                            .next()
                            .ok_or_else(|| anyhow!("Empty embedding response"));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

/// Extract the `data[].embedding` arrays, ordered by their `index` field.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow!("Invalid OpenAI response: non-numeric embedding value"))
            })
            .collect::<Result<Vec<f32>>>()?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Create the [`EmbeddingProvider`] named by the configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"hash"` | [`HashProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"disabled"` | [`DisabledProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashProvider::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledProvider)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acl_rag_core::embedding::cosine_similarity;

    #[test]
    fn test_hash_is_deterministic_and_normalized() {
        let p = HashProvider::new(DEFAULT_HASH_DIMS);
        let a = p.embed_sync("API仕様書");
        let b = p.embed_sync("API仕様書");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASH_DIMS);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_ignores_case_and_whitespace() {
        let p = HashProvider::new(64);
        assert_eq!(p.embed_sync("Api Spec"), p.embed_sync("apispec"));
    }

    #[test]
    fn test_hash_empty_text_is_zero_vector() {
        let p = HashProvider::new(16);
        assert!(p.embed_sync("  ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hash_related_text_scores_higher() {
        let p = HashProvider::new(DEFAULT_HASH_DIMS);
        let query = p.embed_sync("API");
        let api = p.embed_sync("API仕様書\nAPIの認証・エラー・レート制限");
        let remote = p.embed_sync("リモートワークガイド\n全社員向けポリシー");
        assert!(cosine_similarity(&query, &api) > cosine_similarity(&query, &remote));
    }

    #[tokio::test]
    async fn test_disabled_provider_fails() {
        assert!(DisabledProvider.embed("anything").await.is_err());
    }

    #[test]
    fn test_create_provider() {
        let config = EmbeddingConfig {
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        assert_eq!(create_provider(&config).unwrap().dims(), 32);

        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        };
        assert_eq!(create_provider(&config).unwrap().model_name(), "disabled");

        let config = EmbeddingConfig {
            provider: "cohere".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.5, 0.5] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.5, 0.5]]);
    }

    #[test]
    fn test_parse_openai_response_rejects_malformed() {
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
        assert!(parse_openai_response(&serde_json::json!({ "data": [{}] })).is_err());
        assert!(
            parse_openai_response(&serde_json::json!({ "data": [{ "embedding": ["x"] }] })).is_err()
        );
    }
}
