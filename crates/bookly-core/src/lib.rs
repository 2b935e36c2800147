use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod annotator;
pub mod backend;
pub mod builder;
pub mod catalog;
pub mod config_file;
pub mod document;
pub mod matching;
pub mod merger;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod scorer;
pub mod window;

// Re-export for convenience
pub use annotator::{AnnotateError, SpanAnnotator};
pub use backend::{BackendError, PageSource};
pub use bookly_segment::{
    Segment, SegmentError, SegmentLabel, SegmenterConfig, SegmenterConfigBuilder,
};
pub use builder::build_record;
pub use catalog::{Catalog, CatalogError};
pub use document::{Document, DocumentError};
pub use matching::Fingerprint;
pub use merger::{MergeOutcome, MergePolicy};
pub use model::{
    EntityKind, EntityModel, HeuristicModel, MockModel, MockResponse, ModelError, ModelSpan,
    RemoteModel,
};
pub use pipeline::{process_document, PipelineError};
pub use pool::{ingest_paths, IngestJob, IngestPool};
pub use scorer::{score_document, ScoringWeights};

/// A model span remapped into its source segment.
///
/// Offsets index the segment's text; page and label carry the segment's
/// provenance forward to scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSpan {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
    pub text: String,
    pub page: usize,
    pub label: SegmentLabel,
}

/// A scored extraction candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    /// Normalized form used for grouping and matching.
    pub norm: String,
    pub kind: EntityKind,
    pub confidence: f64,
    pub count: usize,
    pub first_page: usize,
    /// True when invented from the file stem rather than seen in the text.
    pub synthetic: bool,
}

/// A catalog entry for one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    /// Display path of the first document that produced this record.
    pub source: String,
    pub confidence: f64,
    pub low_confidence: bool,
    pub provenance: Vec<Provenance>,
}

/// One document that contributed to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub document_id: String,
    pub extracted_at: DateTime<Utc>,
}

/// Configuration for an ingest run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub num_workers: usize,
    pub model_timeout: Duration,
    /// Serialize model calls instead of annotating from all workers at once.
    pub serialize_model_calls: bool,
    /// Persons below this confidence are not listed as authors.
    pub author_threshold: f64,
    /// Title confidence below this flags the record as low confidence.
    pub title_floor: f64,
    pub merge_threshold: f64,
    pub strong_title_threshold: f64,
    pub scoring: ScoringWeights,
    pub segmenter: SegmenterConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            model_timeout: Duration::from_secs(30),
            serialize_model_calls: false,
            author_threshold: 0.35,
            title_floor: 0.05,
            merge_threshold: 0.85,
            strong_title_threshold: 0.95,
            scoring: ScoringWeights::default(),
            segmenter: SegmenterConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Merge thresholds bundled for [`Catalog::upsert`].
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            merge_threshold: self.merge_threshold,
            strong_title_threshold: self.strong_title_threshold,
        }
    }
}

/// Progress events emitted during an ingest run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Ingesting {
        doc_index: usize,
        total: usize,
        source: String,
    },
    DocumentDone {
        doc_index: usize,
        total: usize,
        source: String,
        fingerprint: Fingerprint,
        merged: bool,
        low_confidence: bool,
    },
    Skipped {
        doc_index: usize,
        total: usize,
        source: String,
        reason: SkipReason,
    },
    Warning {
        source: String,
        message: String,
    },
}

/// Why a document was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedFormat { extension: String },
    EmptyDocument,
    Timeout { secs: u64 },
    Backend { message: String },
    Model { message: String },
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedFormat { extension } => {
                write!(f, "unsupported format: {extension}")
            }
            SkipReason::EmptyDocument => f.write_str("no extractable text"),
            SkipReason::Timeout { secs } => write!(f, "model timed out after {secs}s"),
            SkipReason::Backend { message } => write!(f, "extraction failed: {message}"),
            SkipReason::Model { message } => write!(f, "model error: {message}"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Per-document outcome, reported in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReport {
    pub source: String,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Cataloged {
        fingerprint: Fingerprint,
        merged: bool,
        low_confidence: bool,
    },
    Skipped {
        reason: SkipReason,
    },
}

/// Summary statistics for a complete ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub cataloged: usize,
    pub inserted: usize,
    pub merged: usize,
    pub low_confidence: usize,
    pub skipped: usize,
    pub unsupported: usize,
    pub empty: usize,
    pub timed_out: usize,
    pub backend_errors: usize,
    pub model_errors: usize,
    pub cancelled: usize,
}

impl RunStats {
    pub fn from_reports(reports: &[DocumentReport]) -> Self {
        let mut stats = RunStats {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            match &report.outcome {
                DocumentOutcome::Cataloged {
                    merged,
                    low_confidence,
                    ..
                } => {
                    stats.cataloged += 1;
                    if *merged {
                        stats.merged += 1;
                    } else {
                        stats.inserted += 1;
                    }
                    if *low_confidence {
                        stats.low_confidence += 1;
                    }
                }
                DocumentOutcome::Skipped { reason } => {
                    stats.skipped += 1;
                    match reason {
                        SkipReason::UnsupportedFormat { .. } => stats.unsupported += 1,
                        SkipReason::EmptyDocument => stats.empty += 1,
                        SkipReason::Timeout { .. } => stats.timed_out += 1,
                        SkipReason::Backend { .. } => stats.backend_errors += 1,
                        SkipReason::Model { .. } => stats.model_errors += 1,
                        SkipReason::Cancelled => stats.cancelled += 1,
                    }
                }
            }
        }
        stats
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub documents: Vec<DocumentReport>,
    pub stats: RunStats,
}

/// Errors that abort an entire run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("model '{model}' is unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
