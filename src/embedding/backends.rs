//! Concrete embedding backends.

use super::{EmbeddingError, EmbeddingModel};
use async_trait::async_trait;
use serde_json::{Value, json};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Client for any OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbeddingModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    batch_size: usize,
}

impl HttpEmbeddingModel {
    /// Construct a client for the given endpoint and model.
    pub fn new(
        base_url: Option<String>,
        api_key: Option<String>,
        model: String,
        batch_size: usize,
    ) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            batch_size: batch_size.max(1),
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| EmbeddingError::Generation(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Generation(format!(
                "embedding endpoint returned {status}: {detail}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| EmbeddingError::Generation(err.to_string()))?;
        parse_embeddings_response(&payload, texts.len())
    }
}

#[async_trait]
impl EmbeddingModel for HttpEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.request_embeddings(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Generation("endpoint returned no vectors".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.request_embeddings(batch).await?);
        }
        Ok(vectors)
    }
}

/// Parse an OpenAI-style embeddings response, restoring request order via the
/// per-item `index` field.
fn parse_embeddings_response(
    payload: &Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| EmbeddingError::Generation("response is missing 'data'".to_string()))?;

    if data.len() != expected {
        return Err(EmbeddingError::Generation(format!(
            "endpoint returned {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        let vector = item["embedding"]
            .as_array()
            .ok_or_else(|| {
                EmbeddingError::Generation("response item is missing 'embedding'".to_string())
            })?
            .iter()
            .map(|value| value.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

/// Deterministic byte-fold encoder for offline and development use.
///
/// Hashes text content into vector slots and normalizes the result; identical
/// inputs always produce identical vectors.
pub struct BuiltinEmbeddingModel {
    dimension: usize,
}

impl BuiltinEmbeddingModel {
    /// Construct a deterministic encoder with the given output dimension.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        if text.is_empty() || self.dimension == 0 {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % self.dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        super::l2_normalize(embedding)
    }
}

#[async_trait]
impl EmbeddingModel for BuiltinEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Generation(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(self.encode(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Generation(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }
}
