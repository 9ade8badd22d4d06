//! Document records and the status lifecycle registry.

use crate::qdrant::payload::current_timestamp_rfc3339;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Lifecycle state of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Upload accepted, pipeline still running.
    Processing,
    /// Every chunk was embedded and stored.
    Completed,
    /// A pipeline stage failed; `error` carries the detail.
    Failed,
}

impl DocumentStatus {
    /// Stable lowercase name used in payloads and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping record for one uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    /// Opaque unique identifier.
    pub id: String,
    /// Original upload filename.
    pub filename: String,
    /// Current lifecycle state.
    pub status: DocumentStatus,
    /// Failure detail, present only in the failed state.
    pub error: Option<String>,
    /// Upload acceptance timestamp (RFC3339).
    pub created_at: String,
    /// Timestamp of the last status transition (RFC3339).
    pub updated_at: String,
    /// Number of chunks stored for the document.
    pub chunk_count: usize,
}

/// Per-status document counts derived from the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Documents in the completed state.
    pub completed: usize,
    /// Documents still processing.
    pub processing: usize,
    /// Documents in the failed state.
    pub failed: usize,
}

/// In-process registry owning every document's status lifecycle.
///
/// Records are mutated only by the orchestrator; query paths read. A process
/// crash mid-pipeline leaves a record in `processing` — re-ingestion is the
/// recovery path.
#[derive(Default)]
pub struct DocumentRegistry {
    inner: RwLock<HashMap<String, DocumentRecord>>,
}

impl DocumentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted upload in the `processing` state.
    pub async fn insert_processing(&self, id: &str, filename: &str) -> DocumentRecord {
        let now = current_timestamp_rfc3339();
        let record = DocumentRecord {
            id: id.to_string(),
            filename: filename.to_string(),
            status: DocumentStatus::Processing,
            error: None,
            created_at: now.clone(),
            updated_at: now,
            chunk_count: 0,
        };
        self.inner
            .write()
            .await
            .insert(id.to_string(), record.clone());
        record
    }

    /// Transition a document to `completed` with its final chunk count.
    pub async fn mark_completed(&self, id: &str, chunk_count: usize) {
        if let Some(record) = self.inner.write().await.get_mut(id) {
            record.status = DocumentStatus::Completed;
            record.error = None;
            record.chunk_count = chunk_count;
            record.updated_at = current_timestamp_rfc3339();
        }
    }

    /// Transition a document to `failed`, recording a non-empty error detail.
    pub async fn mark_failed(&self, id: &str, error: String) {
        if let Some(record) = self.inner.write().await.get_mut(id) {
            record.status = DocumentStatus::Failed;
            record.error = Some(if error.trim().is_empty() {
                "ingestion failed".to_string()
            } else {
                error
            });
            record.chunk_count = 0;
            record.updated_at = current_timestamp_rfc3339();
        }
    }

    /// Fetch a document record by id.
    pub async fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.inner.read().await.get(id).cloned()
    }

    /// Remove a document record, reporting whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    /// Drop every record.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Total number of known documents.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the registry holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Per-status counts across all known documents.
    pub async fn status_counts(&self) -> StatusCounts {
        let guard = self.inner.read().await;
        let mut counts = StatusCounts::default();
        for record in guard.values() {
            match record.status {
                DocumentStatus::Completed => counts.completed += 1,
                DocumentStatus::Processing => counts.processing += 1,
                DocumentStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
