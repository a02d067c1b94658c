//! Page extraction from source documents.
//!
//! A [`PageExtractor`] turns one file into a list of [`RawPage`]s. Page text
//! is returned as extracted; normalization happens in the loader.

use std::path::Path;

use crate::document::RawPage;
use crate::error::{RagError, Result};

/// Splits a source file into pages.
pub trait PageExtractor: Send + Sync {
    /// Extract every page of `path`, numbered from 1.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionError`] if the file cannot be read or
    /// parsed at all. Individual unreadable pages are skipped instead.
    fn extract(&self, path: &Path) -> Result<Vec<RawPage>>;
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Plain-text documents; a form feed (`\x0c`) starts a new page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl PageExtractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<RawPage>> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::ExtractionError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let source_file = file_name(path);
        let texts: Vec<&str> = content.split('\x0c').collect();
        let total_pages = texts.len() as u32;

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| RawPage {
                text: text.to_string(),
                page_number: i as u32 + 1,
                source_file: source_file.clone(),
                total_pages,
            })
            .collect())
    }
}

/// PDF documents, one [`RawPage`] per PDF page.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[cfg(feature = "pdf")]
impl PageExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<RawPage>> {
        let document = lopdf::Document::load(path).map_err(|e| RagError::ExtractionError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let source_file = file_name(path);
        let pages = document.get_pages();
        let total_pages = pages.len() as u32;

        let mut extracted = Vec::with_capacity(pages.len());
        for &page_number in pages.keys() {
            match document.extract_text(&[page_number]) {
                Ok(text) => extracted.push(RawPage {
                    text,
                    page_number,
                    source_file: source_file.clone(),
                    total_pages,
                }),
                Err(e) => {
                    tracing::warn!(
                        file = %source_file,
                        page = page_number,
                        error = %e,
                        "skipping unreadable page"
                    );
                }
            }
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_feeds_split_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.txt");
        std::fs::write(&path, "first page\x0csecond page\x0cthird").unwrap();

        let pages = TextExtractor.extract(&path).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].text, "second page");
        assert_eq!(pages[1].page_number, 2);
        assert!(pages.iter().all(|p| p.total_pages == 3 && p.source_file == "handbook.txt"));
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let err = TextExtractor.extract(Path::new("/nonexistent/file.txt")).unwrap_err();
        assert!(matches!(err, RagError::ExtractionError { .. }));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn garbage_pdf_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        assert!(PdfExtractor.extract(&path).is_err());
    }
}
