//! Document processing pipeline: extraction, chunking, embedding, and status lifecycle.

pub mod chunking;
pub mod documents;
mod service;
pub mod types;

pub use documents::{DocumentRecord, DocumentRegistry, DocumentStatus, StatusCounts};
pub use service::{DocumentApi, IngestService, WorkerMode};
pub use types::{
    ChunkView, ChunkingError, CollectionStats, DocumentView, GetDocumentError, IngestError,
    IngestReceipt, PipelineError, SearchError, SearchHit, SearchRequest, SearchResponse,
    ServiceLimits,
};
