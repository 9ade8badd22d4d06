//! Core data types and error definitions for the processing pipeline.

use crate::embedding::EmbeddingError;
use crate::extract::ExtractError;
use crate::processing::documents::{DocumentStatus, StatusCounts};
use crate::qdrant::QdrantError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible word budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors rejected synchronously when an upload is accepted.
///
/// This is the only error class that reaches the caller directly; everything
/// after acceptance is absorbed into the document's status.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Upload is not a PDF by name.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Upload failed extractor preconditions (size, version, structure).
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Errors raised inside the background pipeline and recorded as failure detail.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extraction or OCR failed after acceptance.
    #[error("Failed to extract text: {0}")]
    Extract(#[from] ExtractError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding backend failed to produce vectors.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector index interaction failed during ingestion.
    #[error("Vector index request failed: {0}")]
    Index(#[from] QdrantError),
    /// Extraction succeeded but no chunkable text survived normalization.
    #[error("no text extracted from document")]
    EmptyDocument,
}

/// Errors emitted while orchestrating similarity searches.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding backend failed to return a vector for the query text.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Errors emitted while fetching a document view.
#[derive(Debug, Error)]
pub enum GetDocumentError {
    /// No document with the given id is known.
    #[error("Document {0} not found")]
    NotFound(String),
    /// Vector index interaction failed while loading the chunk set.
    #[error("Vector index request failed: {0}")]
    Index(#[from] QdrantError),
}

/// Immediate response to an accepted upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    /// Identifier assigned to the document.
    pub document_id: String,
    /// Original upload filename.
    pub filename: String,
    /// Initial lifecycle state (always `processing`).
    pub status: DocumentStatus,
}

/// Parameters supplied to the search pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    /// Natural language query text to embed.
    pub query: String,
    /// Maximum number of results to return (defaults applied downstream).
    #[serde(default)]
    pub limit: Option<usize>,
    /// Restrict results to a single document.
    #[serde(default)]
    pub document_id: Option<String>,
    /// Include documents that have not reached the completed state.
    #[serde(default)]
    pub include_processing: bool,
}

/// Single ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Owning document identifier.
    pub document_id: String,
    /// Logical chunk identifier.
    pub chunk_id: String,
    /// Stored chunk text.
    pub text: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Remaining stored metadata for the chunk.
    pub metadata: Map<String, Value>,
}

/// Ranked result set returned by the search entry point.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Ranked hits, best first.
    pub results: Vec<SearchHit>,
    /// Echo of the query text.
    pub query: String,
    /// Number of returned hits.
    pub total_results: usize,
}

impl SearchResponse {
    /// Empty result set for a query, used when the index degrades.
    pub fn empty(query: String) -> Self {
        Self {
            results: Vec::new(),
            query,
            total_results: 0,
        }
    }
}

/// One stored chunk within a document view.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkView {
    /// Logical chunk identifier.
    pub id: String,
    /// Ordinal position within the document.
    pub chunk_index: usize,
    /// Total chunk count at creation time.
    pub total_chunks: usize,
    /// Stored chunk text.
    pub text: String,
    /// Embedding vector, present when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Full document view returned by the retrieval entry point.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    /// Document identifier.
    pub id: String,
    /// Original upload filename.
    pub filename: String,
    /// Current lifecycle state.
    pub status: DocumentStatus,
    /// Failure detail, present only in the failed state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Upload acceptance timestamp (RFC3339).
    pub created_at: String,
    /// Timestamp of the last status transition (RFC3339).
    pub updated_at: String,
    /// Stored chunk set, empty unless chunks were requested.
    pub chunks: Vec<ChunkView>,
}

/// Aggregate collection statistics, derived on demand and never stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollectionStats {
    /// Number of known documents across all states.
    pub total_documents: usize,
    /// Number of stored chunks.
    pub total_chunks: usize,
    /// Per-status document counts.
    pub documents_by_status: StatusCounts,
    /// Mean chunk count over completed documents.
    pub average_chunks_per_document: f64,
}

impl CollectionStats {
    /// All-zero statistics, returned whenever the index cannot be reached.
    pub fn zeroed() -> Self {
        Self {
            total_documents: 0,
            total_chunks: 0,
            documents_by_status: StatusCounts::default(),
            average_chunks_per_document: 0.0,
        }
    }
}

/// Word budgets driving the chunker and search clamping.
#[derive(Debug, Clone, Copy)]
pub struct ServiceLimits {
    /// Word budget for each chunk.
    pub chunk_size: usize,
    /// Word budget for the overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Hard cap on chunks per document.
    pub max_chunks_per_document: usize,
    /// Result count used when a search omits one.
    pub search_default_limit: usize,
    /// Upper bound for caller-supplied result counts.
    pub search_max_limit: usize,
}

impl ServiceLimits {
    /// Build limits from the loaded configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_chunks_per_document: config.max_chunks_per_document,
            search_default_limit: config.search_default_limit,
            search_max_limit: config.search_max_limit,
        }
    }
}
