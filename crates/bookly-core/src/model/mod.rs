//! Entity models: the annotation backends of the pipeline.
//!
//! A model takes a window of text and returns typed spans. The built-in
//! [`HeuristicModel`] needs no setup; [`RemoteModel`] talks to an
//! annotation server over HTTP; [`MockModel`] is for tests.

pub mod heuristic;
pub mod mock;
pub mod remote;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use heuristic::HeuristicModel;
pub use mock::{MockModel, MockResponse};
pub use remote::RemoteModel;

/// What a span refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    TitleCandidate,
    Org,
    Other,
}

/// A span returned by a model, with byte offsets into the submitted
/// window. Offsets are validated during remapping, not here; models may
/// return garbage and the annotator will drop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpan {
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
}

#[derive(Error, Debug, Clone)]
pub enum ModelError {
    /// The model cannot serve requests at all (server down, missing
    /// resources). Aborts the whole run rather than one document.
    #[error("model unavailable: {reason}")]
    Unavailable { reason: String },
    /// The model answered but the response was unusable.
    #[error("invalid model response: {reason}")]
    Invalid { reason: String },
}

/// An entity annotation backend.
///
/// Implementations must be stateless with respect to annotation:
/// annotating the same window twice yields the same spans.
pub trait EntityModel: Send + Sync {
    /// Short display name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Largest window, in bytes, a single `annotate` call accepts.
    fn max_window(&self) -> usize;

    /// Annotate one window of text.
    fn annotate<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelSpan>, ModelError>> + Send + 'a>>;

    /// Whether the model can serve requests. Checked once before a run
    /// starts. Defaults to always available.
    fn availability<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModelError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}
