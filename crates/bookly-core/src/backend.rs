use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open document: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-page text extraction.
///
/// Implementations return one string per page, in page order. Pages with
/// no text (images, scans) come back as empty strings rather than being
/// dropped, so page indices stay meaningful downstream.
pub trait PageSource: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, BackendError>;
}
