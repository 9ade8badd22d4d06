//! PDF validation and text extraction.
//!
//! Extraction runs in two passes: the digital text layer is read first
//! (`pdf-extract`), and only when that yields nothing usable is the document
//! treated as scanned and routed through per-page OCR. Validation (size cap,
//! header version allow-list, structural load) happens before any expensive
//! work so malformed uploads fail fast.

mod ocr;

use crate::config::Config;
use std::time::Duration;
use thiserror::Error;

use ocr::OcrSettings;

/// Errors raised while validating or extracting a PDF document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Upload exceeds the configured size cap.
    #[error("PDF too large: {size_mb:.1}MB exceeds the {limit_mb}MB limit")]
    TooLarge {
        /// Size of the rejected upload in megabytes.
        size_mb: f64,
        /// Configured maximum in megabytes.
        limit_mb: usize,
    },
    /// Header declares a version outside the configured allow-list.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),
    /// Byte stream is not a structurally valid PDF.
    #[error("Malformed PDF: {0}")]
    Malformed(String),
    /// Page rasterization failed before OCR could run.
    #[error("Failed to rasterize PDF pages: {0}")]
    Raster(String),
    /// An OCR invocation exceeded the configured timeout.
    #[error("OCR timed out on page {page}")]
    OcrTimeout {
        /// One-based page number that timed out.
        page: usize,
    },
    /// A required external tool is not installed.
    #[error("OCR tooling unavailable: {0}")]
    OcrUnavailable(String),
    /// The OCR engine returned a failure for a page.
    #[error("OCR failed: {0}")]
    Ocr(String),
    /// Filesystem error while staging raster scratch files.
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Two-pass PDF text extractor with OCR fallback for scanned documents.
pub struct PdfExtractor {
    max_size_bytes: usize,
    supported_versions: Vec<String>,
    ocr: OcrSettings,
}

impl PdfExtractor {
    /// Build an extractor with explicit limits.
    pub fn new(
        max_pdf_size_mb: usize,
        supported_versions: Vec<String>,
        ocr_language: String,
        ocr_timeout: Duration,
    ) -> Self {
        Self {
            max_size_bytes: max_pdf_size_mb * 1024 * 1024,
            supported_versions,
            ocr: OcrSettings {
                language: ocr_language,
                timeout: ocr_timeout,
            },
        }
    }

    /// Build an extractor from the loaded server configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_pdf_size_mb,
            config.supported_pdf_versions.clone(),
            config.ocr_language.clone(),
            Duration::from_secs(config.ocr_timeout_seconds),
        )
    }

    /// Validate size, header version, and structure without extracting text.
    pub fn validate(&self, bytes: &[u8]) -> Result<(), ExtractError> {
        if bytes.len() > self.max_size_bytes {
            return Err(ExtractError::TooLarge {
                size_mb: bytes.len() as f64 / (1024.0 * 1024.0),
                limit_mb: self.max_size_bytes / (1024 * 1024),
            });
        }

        if !bytes.starts_with(b"%PDF-") {
            return Err(ExtractError::Malformed("missing %PDF header".to_string()));
        }

        let document = load_document(bytes)?;
        let version = document.version.clone();
        if !self.supported_versions.iter().any(|v| v == &version) {
            return Err(ExtractError::UnsupportedVersion(version));
        }

        Ok(())
    }

    /// Extract text from a PDF, falling back to OCR when the text layer is empty.
    pub async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        self.validate(bytes)?;

        let digital = extract_digital_text(bytes);
        if !digital.trim().is_empty() {
            tracing::debug!(chars = digital.len(), "Extracted digital text layer");
            return Ok(digital.trim().to_string());
        }

        tracing::info!(
            bytes = bytes.len(),
            "No digital text layer found; treating document as scanned"
        );
        ocr::ocr_pdf(bytes, &self.ocr).await
    }

    /// Number of pages declared by the document structure.
    pub fn page_count(&self, bytes: &[u8]) -> Result<usize, ExtractError> {
        self.validate(bytes)?;
        let document = load_document(bytes)?;
        Ok(document.get_pages().len())
    }

    /// Whether the document carries no digital text layer and would require OCR.
    pub fn is_scanned(&self, bytes: &[u8]) -> Result<bool, ExtractError> {
        self.validate(bytes)?;
        Ok(extract_digital_text(bytes).trim().is_empty())
    }
}

fn load_document(bytes: &[u8]) -> Result<lopdf::Document, ExtractError> {
    lopdf::Document::load_mem(bytes).map_err(|err| ExtractError::Malformed(err.to_string()))
}

/// Read the digital text layer across all pages.
///
/// An unreadable text layer is reported as empty rather than an error so the
/// caller falls through to OCR, matching the scanned-document classification.
fn extract_digital_text(bytes: &[u8]) -> String {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "Digital text extraction failed; treating text layer as empty");
            String::new()
        }
    }
}
