//! PDF text extraction for the bookly pipeline.
//!
//! A thin [`PageSource`] implementation over the `pdf-extract` crate, kept
//! in its own crate so `bookly-core` stays backend-agnostic and testable
//! without any PDF fixtures.

use std::path::Path;

use bookly_core::{BackendError, PageSource};

/// Page source backed by the `pdf-extract` crate.
///
/// Reads the whole file into memory and extracts text page by page. Book
/// metadata lives in the front matter, so [`with_max_pages`] can cap the
/// extraction for large scans without losing anything the pipeline uses.
///
/// [`with_max_pages`]: PdfExtractSource::with_max_pages
#[derive(Debug, Default, Clone)]
pub struct PdfExtractSource {
    max_pages: Option<usize>,
}

impl PdfExtractSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract at most the first `max_pages` pages of each document.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

impl PageSource for PdfExtractSource {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError> {
        let bytes = std::fs::read(path)?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        tracing::debug!(
            path = %path.display(),
            pages = pages.len(),
            "extracted pdf text"
        );
        Ok(cap_pages(pages, self.max_pages))
    }
}

fn cap_pages(mut pages: Vec<String>, max_pages: Option<usize>) -> Vec<String> {
    if let Some(max) = max_pages {
        pages.truncate(max);
    }
    pages
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let source = PdfExtractSource::new();
        let err = source
            .extract_pages(Path::new("/nonexistent/book.pdf"))
            .unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }

    #[test]
    fn garbage_bytes_are_an_extraction_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"this is not a pdf").expect("write");

        let source = PdfExtractSource::new();
        let err = source.extract_pages(file.path()).unwrap_err();
        assert!(matches!(err, BackendError::ExtractionError(_)));
    }

    #[test]
    fn cap_pages_truncates_only_beyond_the_limit() {
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(cap_pages(pages.clone(), Some(2)).len(), 2);
        assert_eq!(cap_pages(pages.clone(), Some(5)).len(), 3);
        assert_eq!(cap_pages(pages, None).len(), 3);
    }
}
