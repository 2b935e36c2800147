//! Drives an entity model over segments.
//!
//! The annotator owns the per-call deadline and the optional
//! single-flight gate, remaps window-relative model spans to
//! segment-relative annotated spans, and drops anything a model returns
//! that does not line up with the submitted text.

use std::sync::Arc;
use std::time::Duration;

use bookly_segment::Segment;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::AnnotatedSpan;
use crate::model::{EntityModel, ModelError};
use crate::window::plan_windows;

#[derive(Error, Debug)]
pub enum AnnotateError {
    /// The model cannot serve requests at all. Fatal for the whole run.
    #[error("model unavailable: {reason}")]
    Unavailable { reason: String },
    /// One model call blew its deadline. The document is skipped; there
    /// are no retries.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub struct SpanAnnotator {
    model: Arc<dyn EntityModel>,
    timeout: Duration,
    single_flight: Option<Semaphore>,
}

impl SpanAnnotator {
    pub fn new(model: Arc<dyn EntityModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            single_flight: None,
        }
    }

    /// Allow at most one in-flight model call at a time, for models that
    /// are not safe under concurrency.
    pub fn serialized(mut self) -> Self {
        self.single_flight = Some(Semaphore::new(1));
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn check_availability(&self) -> Result<(), ModelError> {
        self.model.availability().await
    }

    /// Annotate one segment, windowing as needed.
    ///
    /// Returned spans carry segment-relative byte offsets, the covered
    /// text, and the segment's page and label.
    pub async fn annotate_segment(
        &self,
        segment: &Segment,
    ) -> Result<Vec<AnnotatedSpan>, AnnotateError> {
        let max_window = self.model.max_window().max(1);
        let mut spans = Vec::new();

        for window in plan_windows(&segment.text, max_window) {
            let chunk = &segment.text[window.clone()];

            let permit = match &self.single_flight {
                Some(sem) => sem.acquire().await.ok(),
                None => None,
            };
            let outcome = tokio::time::timeout(self.timeout, self.model.annotate(chunk)).await;
            drop(permit);

            let raw = match outcome {
                Ok(Ok(raw)) => raw,
                Ok(Err(ModelError::Unavailable { reason })) => {
                    return Err(AnnotateError::Unavailable { reason });
                }
                Ok(Err(err)) => return Err(AnnotateError::Model(err)),
                Err(_) => {
                    tracing::debug!(
                        model = self.model.name(),
                        page = segment.page,
                        "model call timed out"
                    );
                    return Err(AnnotateError::Timeout {
                        secs: self.timeout.as_secs(),
                    });
                }
            };

            for span in raw {
                if span.start >= span.end
                    || span.end > chunk.len()
                    || !chunk.is_char_boundary(span.start)
                    || !chunk.is_char_boundary(span.end)
                {
                    tracing::warn!(
                        model = self.model.name(),
                        start = span.start,
                        end = span.end,
                        window = chunk.len(),
                        "dropping malformed model span"
                    );
                    continue;
                }
                let start = window.start + span.start;
                let end = window.start + span.end;
                spans.push(AnnotatedSpan {
                    start,
                    end,
                    kind: span.kind,
                    text: segment.text[start..end].to_string(),
                    page: segment.page,
                    label: segment.label,
                });
            }
        }

        tracing::trace!(
            model = self.model.name(),
            page = segment.page,
            spans = spans.len(),
            "annotated segment"
        );
        Ok(spans)
    }
}
