//! End-to-end pipeline tests against a mocked Qdrant instance.
//!
//! The service runs with the inline worker mode so every pipeline reaches its
//! terminal status before assertions run.

use httpmock::{Method::DELETE, Method::GET, Method::POST, Method::PUT, MockServer};
use semdoc::embedding::{BuiltinEmbeddingModel, Embedder};
use semdoc::extract::PdfExtractor;
use semdoc::processing::{
    DocumentStatus, IngestService, SearchRequest, ServiceLimits, WorkerMode,
};
use semdoc::qdrant::QdrantIndex;
use serde_json::{Map, json};
use std::time::Duration;

const DIMENSION: usize = 8;

/// Minimal one-page PDF carrying `phrase` in its text layer, with a correct
/// xref table so `pdf-extract` can parse it.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    let stream = format!("BT /F1 12 Tf 100 700 Td ({phrase}) Tj ET");
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{stream}\nendstream endobj\n",
            stream.len()
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{xref_start}\n").as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn service_for(server: &MockServer) -> IngestService {
    let extractor = PdfExtractor::new(
        10,
        vec!["1.4".to_string(), "1.7".to_string()],
        "eng".to_string(),
        Duration::from_secs(5),
    );
    let embedder = Embedder::new(
        Box::new(BuiltinEmbeddingModel::new(DIMENSION)),
        DIMENSION,
        64,
    );
    let index = QdrantIndex::new(&server.base_url(), None, "documents".to_string(), DIMENSION)
        .expect("index client");
    let limits = ServiceLimits {
        chunk_size: 40,
        chunk_overlap: 8,
        max_chunks_per_document: 100,
        search_default_limit: 5,
        search_max_limit: 50,
    };
    IngestService::new(extractor, embedder, index, limits, WorkerMode::Inline)
}

async fn mock_write_path(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/documents/points/delete");
            then.status(200).json_body(json!({ "result": {} }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/documents/points");
            then.status(200).json_body(json!({ "result": {} }));
        })
        .await;
}

#[tokio::test]
async fn digital_pdf_completes_and_counts_toward_stats() {
    let server = MockServer::start_async().await;
    mock_write_path(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/documents/points/count");
            then.status(200)
                .json_body(json!({ "result": { "count": 1 } }));
        })
        .await;
    let service = service_for(&server);

    let bytes = minimal_pdf("Costs fell sharply. Revenue grew again. Margins held firm.");
    let mut metadata = Map::new();
    metadata.insert("department".to_string(), json!("finance"));

    let receipt = service
        .ingest(bytes, "report.pdf".to_string(), metadata)
        .await
        .expect("accepted upload");
    assert_eq!(receipt.status, DocumentStatus::Processing);

    let view = service
        .get(&receipt.document_id, false)
        .await
        .expect("document view");
    assert_eq!(view.status, DocumentStatus::Completed);
    assert_eq!(view.filename, "report.pdf");
    assert!(view.error.is_none());

    let stats = service.stats().await;
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.total_chunks, 1);
    assert_eq!(stats.documents_by_status.completed, 1);
    assert!((stats.average_chunks_per_document - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn upsert_payload_carries_document_fields() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/documents/points/delete");
            then.status(200).json_body(json!({ "result": {} }));
        })
        .await;
    let upsert_mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/documents/points")
                .body_contains("chunk_index")
                .body_contains("total_chunks")
                .body_contains("page_count")
                .body_contains("department");
            then.status(200).json_body(json!({ "result": {} }));
        })
        .await;
    let service = service_for(&server);

    let mut metadata = Map::new();
    metadata.insert("department".to_string(), json!("legal"));
    service
        .ingest(
            minimal_pdf("Contract terms were reviewed."),
            "contract.pdf".to_string(),
            metadata,
        )
        .await
        .expect("accepted upload");

    upsert_mock.assert();
}

#[tokio::test]
async fn scanned_document_without_ocr_toolchain_fails_cleanly() {
    let server = MockServer::start_async().await;
    mock_write_path(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/documents/points/count");
            then.status(200)
                .json_body(json!({ "result": { "count": 0 } }));
        })
        .await;
    let service = service_for(&server);

    // Structurally valid PDF with an empty text layer: the pipeline either
    // fails in OCR (toolchain missing, raster failure) or yields zero chunks.
    // Both are terminal failures with a non-empty detail.
    let receipt = service
        .ingest(minimal_pdf(""), "scan.pdf".to_string(), Map::new())
        .await
        .expect("accepted upload");

    let view = service
        .get(&receipt.document_id, false)
        .await
        .expect("document view");
    assert_eq!(view.status, DocumentStatus::Failed);
    assert!(!view.error.expect("failure detail").is_empty());

    // A failed document contributes zero chunks to stats.
    let stats = service.stats().await;
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.total_chunks, 0);
    assert_eq!(stats.documents_by_status.failed, 1);
}

#[tokio::test]
async fn search_filters_to_completed_documents_by_default() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/documents/points/count");
            then.status(200)
                .json_body(json!({ "result": { "count": 3 } }));
        })
        .await;
    let query_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/documents/points/query")
                .body_contains("status")
                .body_contains("completed");
            then.status(200).json_body(json!({
                "result": [
                    {
                        "id": "11111111-2222-3333-4444-555555555555",
                        "score": 0.91,
                        "payload": {
                            "document_id": "doc-7",
                            "chunk_id": "doc-7_chunk_0",
                            "chunk_index": 0,
                            "total_chunks": 2,
                            "text": "margins held firm",
                            "status": "completed"
                        }
                    }
                ]
            }));
        })
        .await;
    let service = service_for(&server);

    let response = service
        .search(SearchRequest {
            query: "how did margins do".to_string(),
            limit: Some(3),
            document_id: None,
            include_processing: false,
        })
        .await
        .expect("search response");

    query_mock.assert();
    assert_eq!(response.total_results, 1);
    let hit = &response.results[0];
    assert_eq!(hit.document_id, "doc-7");
    assert_eq!(hit.chunk_id, "doc-7_chunk_0");
    assert_eq!(hit.text, "margins held firm");
    assert!((hit.score - 0.91).abs() < f32::EPSILON);
    assert_eq!(hit.metadata["chunk_index"], 0);
}

#[tokio::test]
async fn search_on_empty_collection_returns_empty_results() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/documents/points/count");
            then.status(200)
                .json_body(json!({ "result": { "count": 0 } }));
        })
        .await;
    let service = service_for(&server);

    let response = service
        .search(SearchRequest {
            query: "anything at all".to_string(),
            limit: None,
            document_id: None,
            include_processing: false,
        })
        .await
        .expect("search response");
    assert!(response.results.is_empty());
    assert_eq!(response.total_results, 0);
}

#[tokio::test]
async fn deleted_documents_disappear_from_retrieval() {
    let server = MockServer::start_async().await;
    mock_write_path(&server).await;
    let service = service_for(&server);

    let receipt = service
        .ingest(
            minimal_pdf("Minutes of the annual meeting."),
            "minutes.pdf".to_string(),
            Map::new(),
        )
        .await
        .expect("accepted upload");

    assert!(service.delete(&receipt.document_id).await.expect("delete"));
    assert!(service.get(&receipt.document_id, false).await.is_err());
    assert!(
        !service
            .delete(&receipt.document_id)
            .await
            .expect("second delete")
    );
}

#[tokio::test]
async fn reset_then_stats_reports_all_zeroes() {
    let server = MockServer::start_async().await;
    mock_write_path(&server).await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/collections/documents");
            then.status(200).json_body(json!({ "result": true }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/collections/documents");
            then.status(404).body("not found");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/documents");
            then.status(200).json_body(json!({ "result": true }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/collections/documents/points/count");
            then.status(200)
                .json_body(json!({ "result": { "count": 0 } }));
        })
        .await;
    let service = service_for(&server);

    service
        .ingest(
            minimal_pdf("Some content to be wiped."),
            "wiped.pdf".to_string(),
            Map::new(),
        )
        .await
        .expect("accepted upload");

    assert!(service.reset().await);

    let stats = service.stats().await;
    assert_eq!(stats.total_documents, 0);
    assert_eq!(stats.total_chunks, 0);
    assert_eq!(stats.documents_by_status.completed, 0);
    assert_eq!(stats.documents_by_status.processing, 0);
    assert_eq!(stats.documents_by_status.failed, 0);
}
