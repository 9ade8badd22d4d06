//! HTTP surface for Semdoc.
//!
//! This module exposes a compact Axum router over the document pipeline:
//!
//! - `POST /documents` – Accept a PDF upload (multipart `file` part plus optional
//!   JSON `metadata` part) and return the new document id with its initial status.
//! - `GET /documents/{id}` – Return filename, status, timestamps, and optionally
//!   the stored chunk/embedding set (`?include_chunks=true`).
//! - `DELETE /documents/{id}` – Remove a document and cascade-delete its chunks.
//! - `POST /search` – Embed a free-text query and return ranked chunk matches.
//! - `GET /stats` – Aggregate document/chunk counts; never errors.
//! - `POST /reset` – Destroy all stored documents and chunks.
//! - `GET /metrics` – Observe ingestion counters.
//! - `GET /health` – Liveness probe.
//!
//! Validation failures are the only errors reported synchronously; pipeline
//! failures surface later through the document's status.

use crate::processing::{
    DocumentApi, GetDocumentError, IngestError, IngestReceipt, SearchRequest,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/documents", post(upload_document::<S>))
        .route(
            "/documents/:id",
            get(get_document::<S>).delete(delete_document::<S>),
        )
        .route("/search", post(search_documents::<S>))
        .route("/stats", get(get_stats::<S>))
        .route("/reset", post(reset_collection::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(health_check))
        // The extractor enforces the configured PDF size cap; this only keeps
        // axum's default 2MB multipart limit from rejecting uploads first.
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .with_state(service)
}

/// Accept a PDF upload and submit it to the ingestion pipeline.
///
/// The multipart body must carry a `file` part; an optional `metadata` part
/// holds a JSON object persisted with every chunk. The response returns
/// immediately with the document id in the `processing` state.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<IngestReceipt>, AppError>
where
    S: DocumentApi,
{
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut metadata: Map<String, Value> = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| AppError::BadRequest(err.to_string()))?;
                metadata = serde_json::from_str(&text)
                    .map_err(|err| AppError::BadRequest(format!("invalid metadata: {err}")))?;
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| AppError::BadRequest("missing 'file' part".to_string()))?;
    let receipt = service.ingest(bytes, filename, metadata).await?;
    tracing::info!(
        document_id = %receipt.document_id,
        filename = %receipt.filename,
        "Upload request accepted"
    );
    Ok(Json(receipt))
}

/// Query string accepted by the document retrieval endpoint.
#[derive(Deserialize)]
struct GetDocumentParams {
    #[serde(default)]
    include_chunks: bool,
}

/// Retrieve a document by id, optionally including its chunk set.
async fn get_document<S>(
    State(service): State<Arc<S>>,
    Path(document_id): Path<String>,
    Query(params): Query<GetDocumentParams>,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let view = service.get(&document_id, params.include_chunks).await?;
    Ok(Json(view).into_response())
}

/// Delete a document and all of its stored chunks.
async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, AppError>
where
    S: DocumentApi,
{
    let deleted = service.delete(&document_id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!(
            "Document {document_id} not found"
        )));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Document {document_id} deleted"),
    })))
}

/// Run a similarity search over stored chunks.
async fn search_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let response = service.search(request).await?;
    Ok(Json(response).into_response())
}

/// Aggregate collection statistics.
async fn get_stats<S>(State(service): State<Arc<S>>) -> Response
where
    S: DocumentApi,
{
    Json(service.stats().await).into_response()
}

/// Destroy all stored documents and chunks.
async fn reset_collection<S>(State(service): State<Arc<S>>) -> Result<Json<Value>, AppError>
where
    S: DocumentApi,
{
    if service.reset().await {
        Ok(Json(json!({
            "status": "success",
            "message": "Collection reset successfully",
        })))
    } else {
        Err(AppError::Internal("Failed to reset collection".to_string()))
    }
}

/// Return ingestion counters for observability dashboards.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Liveness probe.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self::BadRequest(inner.to_string())
    }
}

impl From<GetDocumentError> for AppError {
    fn from(inner: GetDocumentError) -> Self {
        match inner {
            GetDocumentError::NotFound(_) => Self::NotFound(inner.to_string()),
            GetDocumentError::Index(_) => Self::Internal(inner.to_string()),
        }
    }
}

impl From<crate::qdrant::QdrantError> for AppError {
    fn from(inner: crate::qdrant::QdrantError) -> Self {
        Self::Internal(inner.to_string())
    }
}

impl From<crate::processing::SearchError> for AppError {
    fn from(inner: crate::processing::SearchError) -> Self {
        Self::Internal(inner.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        ChunkView, CollectionStats, DocumentApi, DocumentStatus, DocumentView, GetDocumentError,
        IngestError, IngestReceipt, SearchError, SearchHit, SearchRequest, SearchResponse,
    };
    use crate::qdrant::QdrantError;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Map, Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "test-boundary";

    fn multipart_upload(filename: &str, bytes: &[u8], metadata: Option<&str>) -> (String, Vec<u8>) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
        if let Some(metadata) = metadata {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{metadata}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={BOUNDARY}"),
            body,
        )
    }

    #[derive(Clone, Debug)]
    struct IngestCall {
        filename: String,
        bytes: Vec<u8>,
        metadata: Map<String, Value>,
    }

    struct StubService {
        calls: Arc<Mutex<Vec<IngestCall>>>,
    }

    impl StubService {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        async fn recorded_calls(&self) -> Vec<IngestCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl DocumentApi for StubService {
        async fn ingest(
            &self,
            bytes: Vec<u8>,
            filename: String,
            metadata: Map<String, Value>,
        ) -> Result<IngestReceipt, IngestError> {
            self.calls.lock().await.push(IngestCall {
                filename: filename.clone(),
                bytes,
                metadata,
            });
            Ok(IngestReceipt {
                document_id: "doc-42".to_string(),
                filename,
                status: DocumentStatus::Processing,
            })
        }

        async fn get(
            &self,
            document_id: &str,
            include_chunks: bool,
        ) -> Result<DocumentView, GetDocumentError> {
            if document_id != "doc-42" {
                return Err(GetDocumentError::NotFound(document_id.to_string()));
            }
            Ok(DocumentView {
                id: document_id.to_string(),
                filename: "report.pdf".to_string(),
                status: DocumentStatus::Completed,
                error: None,
                created_at: "2025-06-01T00:00:00Z".to_string(),
                updated_at: "2025-06-01T00:00:05Z".to_string(),
                chunks: if include_chunks {
                    vec![ChunkView {
                        id: "doc-42_chunk_0".to_string(),
                        chunk_index: 0,
                        total_chunks: 1,
                        text: "chunk body".to_string(),
                        embedding: None,
                    }]
                } else {
                    Vec::new()
                },
            })
        }

        async fn delete(&self, document_id: &str) -> Result<bool, QdrantError> {
            Ok(document_id == "doc-42")
        }

        async fn search(&self, request: SearchRequest) -> Result<SearchResponse, SearchError> {
            Ok(SearchResponse {
                results: vec![SearchHit {
                    document_id: "doc-42".to_string(),
                    chunk_id: "doc-42_chunk_0".to_string(),
                    text: "matching chunk".to_string(),
                    score: 0.9,
                    metadata: Map::new(),
                }],
                query: request.query,
                total_results: 1,
            })
        }

        async fn stats(&self) -> CollectionStats {
            CollectionStats::zeroed()
        }

        async fn reset(&self) -> bool {
            true
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 3,
                documents_failed: 1,
                chunks_indexed: 12,
            }
        }
    }

    #[tokio::test]
    async fn upload_route_accepts_multipart_with_metadata() {
        let service = Arc::new(StubService::new());
        let app = create_router(service.clone());

        let (content_type, body) = multipart_upload(
            "report.pdf",
            b"%PDF-1.4 pretend bytes",
            Some(r#"{"department":"finance"}"#),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/documents")
                    .header("content-type", content_type)
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["document_id"], "doc-42");
        assert_eq!(json["status"], "processing");

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filename, "report.pdf");
        assert_eq!(calls[0].bytes, b"%PDF-1.4 pretend bytes");
        assert_eq!(calls[0].metadata["department"], "finance");
    }

    #[tokio::test]
    async fn upload_without_file_part_is_a_bad_request() {
        let app = create_router(Arc::new(StubService::new()));

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{{}}\r\n--{BOUNDARY}--\r\n"
        );
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_document_is_a_404() {
        let app = create_router(Arc::new(StubService::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents/missing")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn document_view_includes_chunks_on_demand() {
        let app = create_router(Arc::new(StubService::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/documents/doc-42?include_chunks=true")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["chunks"][0]["chunk_index"], 0);
    }

    #[tokio::test]
    async fn search_round_trips_query_and_results() {
        let app = create_router(Arc::new(StubService::new()));
        let payload = json!({ "query": "revenue growth", "limit": 3 });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/search")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["query"], "revenue growth");
        assert_eq!(json["total_results"], 1);
        assert_eq!(json["results"][0]["document_id"], "doc-42");
    }

    #[tokio::test]
    async fn delete_of_unknown_document_is_a_404() {
        let app = create_router(Arc::new(StubService::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/documents/missing")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_route_reports_counters() {
        let app = create_router(Arc::new(StubService::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["documents_ingested"], 3);
        assert_eq!(json["documents_failed"], 1);
        assert_eq!(json["chunks_indexed"], 12);
    }
}
