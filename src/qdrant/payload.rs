//! Helpers for constructing chunk identifiers and Qdrant payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Logical chunk identifier: document id and ordinal, concatenated.
pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
    format!("{document_id}_chunk_{chunk_index}")
}

/// Deterministic point UUID derived from a logical chunk id.
///
/// Qdrant point ids must be UUIDs; deriving them from the chunk id makes
/// re-ingestion of a document overwrite its prior points in place.
pub fn point_uuid(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

/// Build the payload object stored alongside each indexed chunk.
///
/// Caller-supplied metadata is merged first; the reserved fields are written
/// afterwards so callers can never shadow them.
#[allow(clippy::too_many_arguments)]
pub fn build_chunk_payload(
    document_id: &str,
    filename: &str,
    chunk_index: usize,
    total_chunks: usize,
    text: &str,
    status: &str,
    timestamp_rfc3339: &str,
    extra: &Map<String, Value>,
) -> Map<String, Value> {
    let mut payload = Map::new();

    for (key, value) in extra {
        payload.insert(key.clone(), value.clone());
    }

    payload.insert(
        "chunk_id".into(),
        Value::String(chunk_id(document_id, chunk_index)),
    );
    payload.insert(
        "document_id".into(),
        Value::String(document_id.to_string()),
    );
    payload.insert("filename".into(), Value::String(filename.to_string()));
    payload.insert("chunk_index".into(), Value::from(chunk_index));
    payload.insert("total_chunks".into(), Value::from(total_chunks));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert("chunk_hash".into(), Value::String(compute_chunk_hash(text)));
    payload.insert("status".into(), Value::String(status.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );

    payload
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chunk_ids_concatenate_document_and_ordinal() {
        assert_eq!(chunk_id("doc-9", 4), "doc-9_chunk_4");
    }

    #[test]
    fn point_uuid_is_stable_and_namespaced() {
        let a = point_uuid("doc-9_chunk_4");
        let b = point_uuid("doc-9_chunk_4");
        let other = point_uuid("doc-9_chunk_5");
        assert_eq!(a, b);
        assert_ne!(a, other);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn chunk_hash_is_stable() {
        let text = "Hello world";
        let h1 = compute_chunk_hash(text);
        let h2 = compute_chunk_hash(text);
        assert_eq!(h1, h2);
        assert!(!h1.is_empty());
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_carries_reserved_fields_and_text() {
        let payload = build_chunk_payload(
            "doc-1",
            "report.pdf",
            2,
            5,
            "sample text",
            "completed",
            "2025-01-01T00:00:00Z",
            &Map::new(),
        );
        assert_eq!(payload["chunk_id"], "doc-1_chunk_2");
        assert_eq!(payload["document_id"], "doc-1");
        assert_eq!(payload["filename"], "report.pdf");
        assert_eq!(payload["chunk_index"], 2);
        assert_eq!(payload["total_chunks"], 5);
        assert_eq!(payload["text"], "sample text");
        assert_eq!(payload["status"], "completed");
        assert_eq!(payload["timestamp"], "2025-01-01T00:00:00Z");
        assert_eq!(payload["chunk_hash"], compute_chunk_hash("sample text"));
    }

    #[test]
    fn caller_metadata_merges_without_shadowing_reserved_keys() {
        let mut extra = Map::new();
        extra.insert("department".into(), json!("finance"));
        extra.insert("document_id".into(), json!("spoofed"));

        let payload = build_chunk_payload(
            "doc-1",
            "report.pdf",
            0,
            1,
            "text",
            "completed",
            "2025-01-01T00:00:00Z",
            &extra,
        );
        assert_eq!(payload["department"], "finance");
        assert_eq!(payload["document_id"], "doc-1");
    }
}
