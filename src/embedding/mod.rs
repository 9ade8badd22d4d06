//! Embedding model abstraction, caching, and similarity helpers.
//!
//! The underlying model is a pluggable black box behind [`EmbeddingModel`]:
//! text in, fixed-dimension vector out. [`Embedder`] wraps a model with the
//! policy pieces — L2 normalization, dimension enforcement, and a bounded LRU
//! cache on the single-text path. The batch path bypasses the cache by design:
//! it serves bulk ingestion, not repeated lookups.

mod backends;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use thiserror::Error;

pub use backends::{BuiltinEmbeddingModel, HttpEmbeddingModel};

/// Errors raised by embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    Generation(String),
    /// Produced vector length does not match the configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by configuration.
        expected: usize,
        /// Dimension actually produced by the model.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
///
/// Batch calls are all-or-nothing: implementations never return partial
/// results for a failed request.
#[async_trait]
pub trait EmbeddingModel {
    /// Produce an embedding vector for one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Produce an embedding vector for each supplied text, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Build the embedding backend selected by configuration.
pub fn build_model(config: &Config) -> Box<dyn EmbeddingModel + Send + Sync> {
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => Box::new(HttpEmbeddingModel::new(
            config.embedding_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_batch_size,
        )),
        EmbeddingProvider::Builtin => {
            Box::new(BuiltinEmbeddingModel::new(config.embedding_dimension))
        }
    }
}

/// Caching wrapper around an [`EmbeddingModel`].
pub struct Embedder {
    model: Box<dyn EmbeddingModel + Send + Sync>,
    dimension: usize,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl Embedder {
    /// Wrap a model with the given fixed dimension and cache capacity.
    pub fn new(
        model: Box<dyn EmbeddingModel + Send + Sync>,
        dimension: usize,
        cache_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1))
            .expect("cache capacity is clamped to at least 1");
        Self {
            model,
            dimension,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Build an embedder (model, dimension, cache) from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            build_model(config),
            config.embedding_dimension,
            config.embedding_cache_capacity,
        )
    }

    /// Embed a single text, memoized by exact text match.
    ///
    /// Cache hits return the previously computed vector without invoking the
    /// model; least-recently-used entries are evicted once capacity is
    /// reached.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if let Some(vector) = self
            .cache
            .lock()
            .expect("embedding cache lock poisoned")
            .get(text)
        {
            return Ok(vector.clone());
        }

        let vector = self.check_dimension(l2_normalize(self.model.embed(text).await?))?;
        self.cache
            .lock()
            .expect("embedding cache lock poisoned")
            .put(text.to_string(), vector.clone());
        Ok(vector)
    }

    /// Embed a batch of texts, bypassing the cache entirely.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.model.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Generation(format!(
                "model returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        vectors
            .into_iter()
            .map(|vector| self.check_dimension(l2_normalize(vector)))
            .collect()
    }

    /// Drop every cached vector.
    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .expect("embedding cache lock poisoned")
            .clear();
    }

    /// Number of vectors currently held by the cache.
    pub fn cached_entries(&self) -> usize {
        self.cache
            .lock()
            .expect("embedding cache lock poisoned")
            .len()
    }

    /// Dimension every produced vector must match.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

/// Scale a vector to unit L2 norm; zero vectors are returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

/// Cosine similarity between two vectors.
///
/// Tolerates un-normalized inputs; either vector having zero norm yields 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
