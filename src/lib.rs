#![deny(missing_docs)]

//! Core library for the Semdoc document ingestion and search server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding model abstraction, caching, and similarity helpers.
pub mod embedding;
/// PDF validation, text extraction, and OCR fallback.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline and status lifecycle.
pub mod processing;
/// Qdrant vector index integration.
pub mod qdrant;
