//! Qdrant vector index integration.

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantIndex;
pub use filters::build_equality_filter;
pub use payload::{build_chunk_payload, chunk_id, compute_chunk_hash, point_uuid};
pub use types::{ChunkPoint, IndexStats, QdrantError, ScoredPoint, StoredPoint};
