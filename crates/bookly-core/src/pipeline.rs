//! Per-document pipeline: segment, annotate, score, build.

use bookly_segment::{segment_pages_with_config, SegmentError};
use chrono::{DateTime, Utc};

use crate::annotator::{AnnotateError, SpanAnnotator};
use crate::builder::build_record;
use crate::document::Document;
use crate::scorer::score_document;
use crate::{AnnotatedSpan, BookRecord, IngestConfig};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
}

/// Run one document end to end. Deterministic given the model's
/// answers; discarded segments are never sent to the model.
pub async fn process_document(
    document: &Document,
    annotator: &SpanAnnotator,
    config: &IngestConfig,
    extracted_at: DateTime<Utc>,
) -> Result<BookRecord, PipelineError> {
    let segments = segment_pages_with_config(document.pages(), &config.segmenter)?;

    let mut spans: Vec<AnnotatedSpan> = Vec::new();
    let mut kept = 0;
    for segment in segments.iter().filter(|s| s.is_kept()) {
        kept += 1;
        spans.extend(annotator.annotate_segment(segment).await?);
    }
    tracing::debug!(
        source = %document.source(),
        segments = kept,
        spans = spans.len(),
        "annotated document"
    );

    let candidates = score_document(&spans, &document.file_stem(), &config.scoring);
    Ok(build_record(
        &candidates,
        document.source(),
        document.id(),
        extracted_at,
        config,
    ))
}
