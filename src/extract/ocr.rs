//! Page rasterization and OCR for scanned documents.
//!
//! Pages are rendered to PNG with `pdftoppm` inside a scoped temporary
//! directory, then read with `tesseract` one page at a time. Each page call is
//! bounded by the configured timeout; the scratch directory is removed when it
//! drops, on success and failure alike.

use super::ExtractError;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

const RASTER_DPI: &str = "150";

/// OCR engine settings carried by the extractor.
#[derive(Debug, Clone)]
pub(crate) struct OcrSettings {
    /// Language code passed to tesseract (e.g. `eng`).
    pub(crate) language: String,
    /// Per-page wall-clock budget.
    pub(crate) timeout: Duration,
}

/// Rasterize every page and OCR them in order, joining page texts with newlines.
pub(crate) async fn ocr_pdf(bytes: &[u8], settings: &OcrSettings) -> Result<String, ExtractError> {
    let scratch = TempDir::new()?;
    let source = scratch.path().join("source.pdf");
    tokio::fs::write(&source, bytes).await?;

    rasterize(&source, scratch.path()).await?;
    let pages = collect_page_images(scratch.path())?;
    tracing::debug!(pages = pages.len(), "Rasterized scanned document");

    let mut text = String::new();
    for (index, page) in pages.iter().enumerate() {
        let page_number = index + 1;
        let page_text = recognize_page(page, settings, page_number).await?;
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(page_text.trim());
    }

    Ok(text.trim().to_string())
}

async fn rasterize(source: &PathBuf, dir: &std::path::Path) -> Result<(), ExtractError> {
    let mut command = Command::new("pdftoppm");
    command
        .arg("-png")
        .arg("-r")
        .arg(RASTER_DPI)
        .arg(source)
        .arg(dir.join("page"));
    let output = command
        .output()
        .await
        .map_err(|err| classify_spawn_error(err, "pdftoppm"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Raster(stderr.trim().to_string()));
    }

    Ok(())
}

fn collect_page_images(dir: &std::path::Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut pages: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .collect();
    // pdftoppm zero-pads page numbers, so lexical order is page order.
    pages.sort();

    if pages.is_empty() {
        return Err(ExtractError::Raster(
            "rasterizer produced no page images".to_string(),
        ));
    }

    Ok(pages)
}

async fn recognize_page(
    image: &PathBuf,
    settings: &OcrSettings,
    page_number: usize,
) -> Result<String, ExtractError> {
    let mut command = Command::new("tesseract");
    command
        .arg(image)
        .arg("stdout")
        .arg("-l")
        .arg(&settings.language);

    let output = tokio::time::timeout(settings.timeout, command.output())
        .await
        .map_err(|_| ExtractError::OcrTimeout { page: page_number })?
        .map_err(|err| classify_spawn_error(err, "tesseract"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Ocr(format!(
            "page {page_number}: {}",
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn classify_spawn_error(err: std::io::Error, tool: &str) -> ExtractError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ExtractError::OcrUnavailable(format!("{tool} is not installed"))
    } else {
        ExtractError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_images_sort_in_page_order() {
        let dir = TempDir::new().expect("tempdir");
        for name in ["page-03.png", "page-01.png", "page-02.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }

        let pages = collect_page_images(dir.path()).expect("pages");
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-01.png", "page-02.png", "page-03.png"]);
    }

    #[test]
    fn empty_raster_output_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let error = collect_page_images(dir.path()).unwrap_err();
        assert!(matches!(error, ExtractError::Raster(_)));
    }

    #[test]
    fn missing_tool_is_classified_as_unavailable() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert!(matches!(
            classify_spawn_error(err, "tesseract"),
            ExtractError::OcrUnavailable(_)
        ));
    }
}
