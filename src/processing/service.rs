//! Ingestion service coordinating extraction, chunking, embedding, and index writes.

use crate::{
    embedding::Embedder,
    extract::PdfExtractor,
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        chunking::chunk_text,
        documents::{DocumentRegistry, DocumentStatus},
        types::{
            ChunkView, CollectionStats, DocumentView, GetDocumentError, IngestError,
            IngestReceipt, PipelineError, SearchHit, SearchRequest, SearchResponse, SearchError,
            ServiceLimits,
        },
    },
    qdrant::{
        ChunkPoint, QdrantError, QdrantIndex, build_equality_filter, build_chunk_payload,
        chunk_id, payload::current_timestamp_rfc3339,
    },
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// How accepted uploads are handed to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Fire-and-forget: the pipeline runs on a spawned task and the caller
    /// polls the document status.
    Background,
    /// The pipeline completes before `ingest` returns. Used by tests and
    /// synchronous tooling.
    Inline,
}

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Accept raw PDF bytes, register the document, and submit the pipeline.
    async fn ingest(
        &self,
        bytes: Vec<u8>,
        filename: String,
        metadata: Map<String, Value>,
    ) -> Result<IngestReceipt, IngestError>;

    /// Fetch a document and, optionally, its stored chunk set.
    async fn get(
        &self,
        document_id: &str,
        include_chunks: bool,
    ) -> Result<DocumentView, GetDocumentError>;

    /// Delete a document and cascade-delete its chunks.
    async fn delete(&self, document_id: &str) -> Result<bool, QdrantError>;

    /// Similarity search over stored chunks.
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SearchError>;

    /// Aggregate collection statistics; never fails.
    async fn stats(&self) -> CollectionStats;

    /// Destroy all stored documents and chunks.
    async fn reset(&self) -> bool;

    /// Current ingestion counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the full document pipeline and owns the status lifecycle.
///
/// The service holds long-lived handles to the extractor, embedder, vector
/// index, and document registry. Construct it once near process start and
/// share it through an `Arc`.
pub struct IngestService {
    core: Arc<PipelineCore>,
    mode: WorkerMode,
}

struct PipelineCore {
    extractor: PdfExtractor,
    embedder: Embedder,
    index: QdrantIndex,
    registry: DocumentRegistry,
    metrics: Arc<IngestMetrics>,
    limits: ServiceLimits,
}

impl IngestService {
    /// Assemble a service from explicitly constructed components.
    pub fn new(
        extractor: PdfExtractor,
        embedder: Embedder,
        index: QdrantIndex,
        limits: ServiceLimits,
        mode: WorkerMode,
    ) -> Self {
        Self {
            core: Arc::new(PipelineCore {
                extractor,
                embedder,
                index,
                registry: DocumentRegistry::new(),
                metrics: Arc::new(IngestMetrics::new()),
                limits,
            }),
            mode,
        }
    }

    /// Build every component from the loaded configuration.
    pub fn from_config(
        config: &crate::config::Config,
        mode: WorkerMode,
    ) -> Result<Self, QdrantError> {
        Ok(Self::new(
            PdfExtractor::from_config(config),
            Embedder::from_config(config),
            QdrantIndex::from_config(config)?,
            ServiceLimits::from_config(config),
            mode,
        ))
    }

    /// Ensure the backing collection exists before serving traffic.
    pub async fn bootstrap(&self) -> Result<(), QdrantError> {
        self.core.index.ensure_collection().await
    }

    /// Accept an upload: validate synchronously, register the document, and
    /// submit the pipeline according to the worker mode.
    pub async fn ingest(
        &self,
        bytes: Vec<u8>,
        filename: String,
        metadata: Map<String, Value>,
    ) -> Result<IngestReceipt, IngestError> {
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(IngestError::InvalidDocument(format!(
                "{filename} is not a PDF file"
            )));
        }
        self.core.extractor.validate(&bytes)?;

        let document_id = Uuid::new_v4().to_string();
        self.core
            .registry
            .insert_processing(&document_id, &filename)
            .await;
        tracing::info!(document_id = %document_id, filename = %filename, "Upload accepted");

        let core = self.core.clone();
        let id = document_id.clone();
        let name = filename.clone();
        match self.mode {
            WorkerMode::Background => {
                tokio::spawn(async move {
                    core.run_pipeline(&id, &name, &bytes, &metadata).await;
                });
            }
            WorkerMode::Inline => {
                core.run_pipeline(&id, &name, &bytes, &metadata).await;
            }
        }

        Ok(IngestReceipt {
            document_id,
            filename,
            status: DocumentStatus::Processing,
        })
    }

    /// Fetch a document and, optionally, its stored chunk set.
    pub async fn get(
        &self,
        document_id: &str,
        include_chunks: bool,
    ) -> Result<DocumentView, GetDocumentError> {
        self.core.get(document_id, include_chunks).await
    }

    /// Delete a document and cascade-delete every chunk it owns.
    pub async fn delete(&self, document_id: &str) -> Result<bool, QdrantError> {
        self.core.delete(document_id).await
    }

    /// Similarity search over stored chunks.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SearchError> {
        self.core.search(request).await
    }

    /// Aggregate collection statistics; never fails.
    pub async fn stats(&self) -> CollectionStats {
        self.core.stats().await
    }

    /// Destroy all stored documents and chunks.
    pub async fn reset(&self) -> bool {
        self.core.reset().await
    }

    /// Current ingestion counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }
}

impl PipelineCore {
    /// Run the pipeline for one document and record its terminal status.
    ///
    /// Stage errors never escape: they become the document's failure detail,
    /// and any partially written chunk set is cleaned up so nothing partial
    /// stays queryable.
    async fn run_pipeline(
        &self,
        document_id: &str,
        filename: &str,
        bytes: &[u8],
        metadata: &Map<String, Value>,
    ) {
        tracing::info!(document_id = %document_id, "Processing document");
        match self.execute(document_id, filename, bytes, metadata).await {
            Ok(chunk_count) => {
                self.registry.mark_completed(document_id, chunk_count).await;
                self.metrics.record_success(chunk_count as u64);
                tracing::info!(
                    document_id = %document_id,
                    chunks = chunk_count,
                    "Document ingestion completed"
                );
            }
            Err(error) => {
                tracing::warn!(document_id = %document_id, error = %error, "Document ingestion failed");
                if let Err(cleanup) = self
                    .index
                    .delete_where("document_id", json!(document_id))
                    .await
                {
                    tracing::warn!(
                        document_id = %document_id,
                        error = %cleanup,
                        "Failed to clean up chunks for failed document"
                    );
                }
                self.registry.mark_failed(document_id, error.to_string()).await;
                self.metrics.record_failure();
            }
        }
    }

    /// The pipeline stages, strictly in sequence: extract, chunk, embed,
    /// replace the prior chunk generation, upsert.
    async fn execute(
        &self,
        document_id: &str,
        filename: &str,
        bytes: &[u8],
        metadata: &Map<String, Value>,
    ) -> Result<usize, PipelineError> {
        let text = self.extractor.extract(bytes).await?;
        let chunks = chunk_text(
            &text,
            self.limits.chunk_size,
            self.limits.chunk_overlap,
            self.limits.max_chunks_per_document,
        )?;
        if chunks.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        tracing::debug!(document_id = %document_id, chunks = chunks.len(), "Document chunked");

        let vectors = self.embedder.embed_many(&chunks).await?;
        let now = current_timestamp_rfc3339();
        let total_chunks = chunks.len();
        let mut extra = metadata.clone();
        if let Ok(pages) = self.extractor.page_count(bytes) {
            extra.insert("page_count".to_string(), json!(pages));
        }
        let points: Vec<ChunkPoint> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (text, vector))| ChunkPoint {
                chunk_id: chunk_id(document_id, index),
                vector,
                payload: build_chunk_payload(
                    document_id,
                    filename,
                    index,
                    total_chunks,
                    &text,
                    DocumentStatus::Completed.as_str(),
                    &now,
                    &extra,
                ),
            })
            .collect();

        // Reprocessing replaces the prior generation wholesale.
        self.index
            .delete_where("document_id", json!(document_id))
            .await?;
        let written = self.index.upsert_chunks(points).await?;
        Ok(written)
    }

    async fn get(
        &self,
        document_id: &str,
        include_chunks: bool,
    ) -> Result<DocumentView, GetDocumentError> {
        let record = self
            .registry
            .get(document_id)
            .await
            .ok_or_else(|| GetDocumentError::NotFound(document_id.to_string()))?;

        let chunks = if include_chunks {
            let mut points = self
                .index
                .get_by_field("document_id", json!(document_id), true)
                .await?;
            points.sort_by_key(|point| {
                point
                    .payload
                    .get("chunk_index")
                    .and_then(Value::as_u64)
                    .unwrap_or(u64::MAX)
            });
            points
                .into_iter()
                .map(|point| {
                    let payload = point.payload;
                    ChunkView {
                        id: payload
                            .get("chunk_id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        chunk_index: payload
                            .get("chunk_index")
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as usize,
                        total_chunks: payload
                            .get("total_chunks")
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as usize,
                        text: payload
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        embedding: point.vector,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(DocumentView {
            id: record.id,
            filename: record.filename,
            status: record.status,
            error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
            chunks,
        })
    }

    async fn delete(&self, document_id: &str) -> Result<bool, QdrantError> {
        if self.registry.get(document_id).await.is_none() {
            return Ok(false);
        }
        self.index
            .delete_where("document_id", json!(document_id))
            .await?;
        self.registry.remove(document_id).await;
        tracing::info!(document_id = %document_id, "Document deleted");
        Ok(true)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SearchError> {
        let SearchRequest {
            query,
            limit,
            document_id,
            include_processing,
        } = request;

        let limit = limit
            .unwrap_or(self.limits.search_default_limit)
            .clamp(1, self.limits.search_max_limit);
        let vector = self.embedder.embed_one(&query).await?;

        let mut conditions: BTreeMap<String, Value> = BTreeMap::new();
        if !include_processing {
            conditions.insert(
                "status".to_string(),
                json!(DocumentStatus::Completed.as_str()),
            );
        }
        if let Some(document_id) = document_id {
            conditions.insert("document_id".to_string(), json!(document_id));
        }
        let filter = build_equality_filter(&conditions);

        // Search is a read path: index errors degrade to an empty result set
        // instead of surfacing to the caller.
        let points = match self.index.query(vector, limit, filter).await {
            Ok(points) => points,
            Err(error) => {
                tracing::warn!(error = %error, "Search query failed; returning empty results");
                return Ok(SearchResponse::empty(query));
            }
        };

        let results: Vec<SearchHit> = points
            .into_iter()
            .map(|point| {
                let mut payload = point.payload.unwrap_or_default();
                let text = remove_string(&mut payload, "text");
                let chunk_id = remove_string(&mut payload, "chunk_id");
                let document_id = remove_string(&mut payload, "document_id");
                SearchHit {
                    document_id,
                    chunk_id,
                    text,
                    score: point.score,
                    metadata: payload,
                }
            })
            .collect();

        let total_results = results.len();
        Ok(SearchResponse {
            results,
            query,
            total_results,
        })
    }

    async fn stats(&self) -> CollectionStats {
        let documents_by_status = self.registry.status_counts().await;
        let total_documents = self.registry.len().await;

        match self.index.count().await {
            Ok(total_chunks) => {
                let average_chunks_per_document = if documents_by_status.completed > 0 {
                    total_chunks as f64 / documents_by_status.completed as f64
                } else {
                    0.0
                };
                CollectionStats {
                    total_documents,
                    total_chunks,
                    documents_by_status,
                    average_chunks_per_document,
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Stats query failed; returning zeroed statistics");
                CollectionStats::zeroed()
            }
        }
    }

    async fn reset(&self) -> bool {
        match self.index.reset().await {
            Ok(()) => {
                self.registry.clear().await;
                tracing::info!("Collection reset");
                true
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to reset collection");
                false
            }
        }
    }
}

fn remove_string(payload: &mut Map<String, Value>, key: &str) -> String {
    match payload.remove(key) {
        Some(Value::String(value)) => value,
        _ => String::new(),
    }
}

#[async_trait]
impl DocumentApi for IngestService {
    async fn ingest(
        &self,
        bytes: Vec<u8>,
        filename: String,
        metadata: Map<String, Value>,
    ) -> Result<IngestReceipt, IngestError> {
        IngestService::ingest(self, bytes, filename, metadata).await
    }

    async fn get(
        &self,
        document_id: &str,
        include_chunks: bool,
    ) -> Result<DocumentView, GetDocumentError> {
        IngestService::get(self, document_id, include_chunks).await
    }

    async fn delete(&self, document_id: &str) -> Result<bool, QdrantError> {
        IngestService::delete(self, document_id).await
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SearchError> {
        IngestService::search(self, request).await
    }

    async fn stats(&self) -> CollectionStats {
        IngestService::stats(self).await
    }

    async fn reset(&self) -> bool {
        IngestService::reset(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestService::metrics_snapshot(self)
    }
}
