//! Ingest worker pool.
//!
//! Architecture: `num_workers` worker tasks run the per-document
//! pipeline concurrently and hand finished records to a single merger
//! task, so catalog upserts happen one at a time. Workers that hit a
//! fatal condition (model gone, catalog write failure) record it, cancel
//! the pool, and drain the remaining jobs as skipped so every submitted
//! document still gets a report.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bookly_segment::SegmentError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::annotator::{AnnotateError, SpanAnnotator};
use crate::backend::PageSource;
use crate::catalog::Catalog;
use crate::document::{Document, DocumentError};
use crate::model::{EntityModel, ModelError};
use crate::pipeline::{process_document, PipelineError};
use crate::{
    BookRecord, DocumentOutcome, DocumentReport, IngestConfig, ProgressEvent, RunError, RunStats,
    RunSummary, SkipReason,
};

// ── Public API ──────────────────────────────────────────────────────────

/// A document ingest job submitted to the pool.
pub struct IngestJob {
    pub path: PathBuf,
    pub doc_index: usize,
    pub total: usize,
    pub result_tx: oneshot::Sender<DocumentReport>,
    /// Progress callback for this job (emits Ingesting, DocumentDone, etc.).
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

/// A pool of worker tasks feeding a single merger task.
///
/// Submit jobs via [`submit()`](IngestPool::submit), receive reports via
/// the oneshot receiver paired with each job.
pub struct IngestPool {
    job_tx: async_channel::Sender<IngestJob>,
    pool_handle: JoinHandle<()>,
    fatal: Arc<Mutex<Option<RunError>>>,
}

impl IngestPool {
    pub fn new(
        backend: Arc<dyn PageSource>,
        annotator: Arc<SpanAnnotator>,
        catalog: Arc<Catalog>,
        config: Arc<IngestConfig>,
        cancel: CancellationToken,
        num_workers: usize,
    ) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<IngestJob>();
        let (merge_tx, merge_rx) = async_channel::unbounded::<MergeJob>();
        let fatal = Arc::new(Mutex::new(None));

        let merger_handle = tokio::spawn(merger_loop(
            merge_rx,
            catalog,
            config.clone(),
            cancel.clone(),
            fatal.clone(),
        ));

        let worker_fatal = fatal.clone();
        let pool_handle = tokio::spawn(async move {
            let mut worker_handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                worker_handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    merge_tx.clone(),
                    backend.clone(),
                    annotator.clone(),
                    config.clone(),
                    cancel.clone(),
                    worker_fatal.clone(),
                )));
            }

            // Drop our clones so workers are the last holders.
            drop(job_rx);
            drop(merge_tx);

            // Workers exit when job_tx closes; once their merge senders are
            // gone the merger drains its queue and exits too.
            for h in worker_handles {
                let _ = h.await;
            }
            let _ = merger_handle.await;
        });

        Self {
            job_tx,
            pool_handle,
            fatal,
        }
    }

    /// Submit a job to the pool.
    pub async fn submit(&self, job: IngestJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the pool, wait for workers and merger to finish, and return
    /// the first fatal error any of them recorded.
    pub async fn shutdown(self) -> Option<RunError> {
        self.job_tx.close();
        let _ = self.pool_handle.await;
        self.fatal.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Ingest a batch of files and fold the results into the catalog.
///
/// Model availability is checked once up front; an unavailable model
/// aborts before any document is touched. Per-document failures skip
/// that document and the run continues. Every input path appears
/// exactly once in the returned summary, in input order.
pub async fn ingest_paths(
    paths: &[PathBuf],
    backend: Arc<dyn PageSource>,
    model: Arc<dyn EntityModel>,
    catalog: Arc<Catalog>,
    config: IngestConfig,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Result<RunSummary, RunError> {
    let total = paths.len();
    if total == 0 {
        return Ok(RunSummary::default());
    }

    let model_name = model.name().to_string();
    if let Err(e) = model.availability().await {
        let reason = match e {
            ModelError::Unavailable { reason } => reason,
            other => other.to_string(),
        };
        tracing::error!(model = %model_name, reason = %reason, "model unavailable, aborting run");
        return Err(RunError::ModelUnavailable {
            model: model_name,
            reason,
        });
    }

    let mut annotator = SpanAnnotator::new(model, config.model_timeout);
    if config.serialize_model_calls {
        annotator = annotator.serialized();
    }

    let num_workers = config.num_workers.max(1);
    let pool = IngestPool::new(
        backend,
        Arc::new(annotator),
        catalog,
        Arc::new(config),
        cancel,
        num_workers,
    );

    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);
    let mut receivers = Vec::with_capacity(total);
    for (i, path) in paths.iter().enumerate() {
        let (result_tx, result_rx) = oneshot::channel();
        pool.submit(IngestJob {
            path: path.clone(),
            doc_index: i,
            total,
            result_tx,
            progress: progress.clone(),
        })
        .await;
        receivers.push((i, result_rx));
    }

    let mut documents: Vec<Option<DocumentReport>> = vec![None; total];
    for (i, rx) in receivers {
        let report = rx.await.unwrap_or_else(|_| DocumentReport {
            source: paths[i].display().to_string(),
            outcome: DocumentOutcome::Skipped {
                reason: SkipReason::Cancelled,
            },
        });
        documents[i] = Some(report);
    }

    if let Some(err) = pool.shutdown().await {
        return Err(err);
    }

    let documents: Vec<DocumentReport> = documents.into_iter().flatten().collect();
    let stats = RunStats::from_reports(&documents);
    Ok(RunSummary { documents, stats })
}

// ── Internal types ──────────────────────────────────────────────────────

/// A built record on its way to the catalog, with everything needed to
/// finish reporting the job.
struct MergeJob {
    record: BookRecord,
    source: String,
    doc_index: usize,
    total: usize,
    result_tx: oneshot::Sender<DocumentReport>,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

// ── Workers ─────────────────────────────────────────────────────────────

async fn worker_loop(
    job_rx: async_channel::Receiver<IngestJob>,
    merge_tx: async_channel::Sender<MergeJob>,
    backend: Arc<dyn PageSource>,
    annotator: Arc<SpanAnnotator>,
    config: Arc<IngestConfig>,
    cancel: CancellationToken,
    fatal: Arc<Mutex<Option<RunError>>>,
) {
    while let Ok(job) = job_rx.recv().await {
        // Drain remaining jobs after cancellation so each still reports.
        if cancel.is_cancelled() {
            tracing::debug!(path = %job.path.display(), "skipping: cancelled");
            report_skip(job, SkipReason::Cancelled);
            continue;
        }

        let source = job.path.display().to_string();
        (job.progress)(ProgressEvent::Ingesting {
            doc_index: job.doc_index,
            total: job.total,
            source: source.clone(),
        });

        let document = match Document::load(&job.path, backend.as_ref()) {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!(path = %job.path.display(), error = %e, "document rejected");
                report_skip(job, document_skip_reason(e));
                continue;
            }
        };

        let extracted_at = chrono::Utc::now();
        match process_document(&document, &annotator, &config, extracted_at).await {
            Ok(record) => {
                if record.low_confidence {
                    (job.progress)(ProgressEvent::Warning {
                        source: source.clone(),
                        message: "record built with low title confidence".to_string(),
                    });
                }
                let merge = MergeJob {
                    record,
                    source,
                    doc_index: job.doc_index,
                    total: job.total,
                    result_tx: job.result_tx,
                    progress: job.progress,
                };
                let _ = merge_tx.send(merge).await;
            }
            Err(PipelineError::Annotate(AnnotateError::Unavailable { reason })) => {
                tracing::warn!(
                    model = annotator.model_name(),
                    reason = %reason,
                    "model became unavailable, cancelling run"
                );
                set_fatal(
                    &fatal,
                    RunError::ModelUnavailable {
                        model: annotator.model_name().to_string(),
                        reason,
                    },
                );
                cancel.cancel();
                report_skip(job, SkipReason::Cancelled);
            }
            Err(e) => {
                tracing::debug!(path = %job.path.display(), error = %e, "pipeline failed");
                report_skip(job, pipeline_skip_reason(e));
            }
        }
    }
}

// ── Merger ──────────────────────────────────────────────────────────────

/// Sole consumer of the merge channel; the only task that writes the
/// catalog during a run.
async fn merger_loop(
    merge_rx: async_channel::Receiver<MergeJob>,
    catalog: Arc<Catalog>,
    config: Arc<IngestConfig>,
    cancel: CancellationToken,
    fatal: Arc<Mutex<Option<RunError>>>,
) {
    let policy = config.merge_policy();
    while let Ok(job) = merge_rx.recv().await {
        if fatal.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
            let _ = job.result_tx.send(DocumentReport {
                source: job.source,
                outcome: DocumentOutcome::Skipped {
                    reason: SkipReason::Cancelled,
                },
            });
            continue;
        }

        let low_confidence = job.record.low_confidence;
        match catalog.upsert(job.record, &policy) {
            Ok(outcome) => {
                tracing::debug!(
                    source = %job.source,
                    fingerprint = %outcome.fingerprint(),
                    merged = outcome.was_merged(),
                    "cataloged document"
                );
                (job.progress)(ProgressEvent::DocumentDone {
                    doc_index: job.doc_index,
                    total: job.total,
                    source: job.source.clone(),
                    fingerprint: outcome.fingerprint().clone(),
                    merged: outcome.was_merged(),
                    low_confidence,
                });
                let _ = job.result_tx.send(DocumentReport {
                    source: job.source,
                    outcome: DocumentOutcome::Cataloged {
                        fingerprint: outcome.fingerprint().clone(),
                        merged: outcome.was_merged(),
                        low_confidence,
                    },
                });
            }
            Err(e) => {
                tracing::error!(source = %job.source, error = %e, "catalog write failed, cancelling run");
                set_fatal(&fatal, RunError::Catalog(e));
                cancel.cancel();
                let _ = job.result_tx.send(DocumentReport {
                    source: job.source,
                    outcome: DocumentOutcome::Skipped {
                        reason: SkipReason::Cancelled,
                    },
                });
            }
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn report_skip(job: IngestJob, reason: SkipReason) {
    let source = job.path.display().to_string();
    (job.progress)(ProgressEvent::Skipped {
        doc_index: job.doc_index,
        total: job.total,
        source: source.clone(),
        reason: reason.clone(),
    });
    let _ = job.result_tx.send(DocumentReport {
        source,
        outcome: DocumentOutcome::Skipped { reason },
    });
}

/// First fatal error wins; later ones are dropped.
fn set_fatal(fatal: &Mutex<Option<RunError>>, err: RunError) {
    let mut slot = fatal.lock().unwrap_or_else(|e| e.into_inner());
    if slot.is_none() {
        *slot = Some(err);
    }
}

fn document_skip_reason(err: DocumentError) -> SkipReason {
    match err {
        DocumentError::UnsupportedFormat { extension } => {
            SkipReason::UnsupportedFormat { extension }
        }
        DocumentError::Empty => SkipReason::EmptyDocument,
        DocumentError::Backend(e) => SkipReason::Backend {
            message: e.to_string(),
        },
    }
}

fn pipeline_skip_reason(err: PipelineError) -> SkipReason {
    match err {
        PipelineError::Segment(SegmentError::EmptyDocument) => SkipReason::EmptyDocument,
        PipelineError::Annotate(AnnotateError::Timeout { secs }) => SkipReason::Timeout { secs },
        PipelineError::Annotate(AnnotateError::Model(e)) => SkipReason::Model {
            message: e.to_string(),
        },
        // handled by the caller before this mapping; kept total for safety
        PipelineError::Annotate(AnnotateError::Unavailable { .. }) => SkipReason::Cancelled,
    }
}
