use std::path::Path;

use bookly_segment::text::normalize_whitespace;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::backend::{BackendError, PageSource};

#[derive(Error, Debug)]
pub enum DocumentError {
    /// Input file is not a PDF. Only the extension is checked; the backend
    /// decides whether the bytes are actually parseable.
    #[error("not a PDF file (extension: {extension})")]
    UnsupportedFormat { extension: String },
    #[error("document has no extractable text")]
    Empty,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A loaded document: normalized page text plus a stable identity.
///
/// The id is a truncated SHA-256 over the normalized page text, so the
/// same file ingested twice (or the same book under two filenames with
/// identical text) gets the same id. Pages are read-only after load.
#[derive(Debug, Clone)]
pub struct Document {
    id: String,
    source: String,
    pages: Vec<String>,
}

impl Document {
    /// Load a document from disk via the given backend.
    ///
    /// Rejects anything without a `.pdf` extension (case-insensitive)
    /// before touching the backend, and rejects documents where no page
    /// has any text.
    pub fn load(path: &Path, backend: &dyn PageSource) -> Result<Self, DocumentError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if extension != "pdf" {
            return Err(DocumentError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    extension
                },
            });
        }

        let raw_pages = backend.extract_pages(path)?;
        tracing::debug!(path = %path.display(), pages = raw_pages.len(), "extracted pages");
        Self::from_pages(path.display().to_string(), raw_pages)
    }

    /// Build a document from already-extracted page text.
    ///
    /// Whitespace is normalized per page and the id is derived from the
    /// result, so construction is deterministic for a given text.
    pub fn from_pages(source: String, raw_pages: Vec<String>) -> Result<Self, DocumentError> {
        let pages: Vec<String> = raw_pages.iter().map(|p| normalize_whitespace(p)).collect();
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(DocumentError::Empty);
        }
        let id = digest_pages(&pages);
        Ok(Self { id, source, pages })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// File stem of the source path, used as a last-resort title.
    pub fn file_stem(&self) -> String {
        Path::new(&self.source)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.clone())
    }
}

fn digest_pages(pages: &[String]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.as_bytes());
        // form feed between pages so page boundaries affect the hash
        hasher.update([0x0c]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}
