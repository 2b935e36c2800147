//! Page-level text segmentation.
//!
//! Splits the per-page text of a document into labeled regions: front
//! matter (the early pages where title, author credits, and publisher
//! lines concentrate), body prose, and discarded boilerplate (running
//! headers, footers, page numbers). Downstream annotation only sees the
//! kept regions; scoring uses the labels to weight where a span was found.

pub mod config;
pub mod text;

mod boilerplate;
mod segmenter;

pub use config::{ListOverride, SegmenterConfig, SegmenterConfigBuilder};
pub use segmenter::{segment_pages, segment_pages_with_config};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    /// No pages, no non-whitespace text, or nothing left after discarding
    /// boilerplate (e.g. a document whose only text is page footers).
    #[error("document has no extractable text")]
    EmptyDocument,
}

/// Region label assigned to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentLabel {
    /// Early pages: title pages, copyright pages, dedications.
    FrontMatter,
    /// Main prose.
    Body,
    /// Repeated boilerplate and page numbers; never annotated.
    Discarded,
}

/// A labeled region of one page.
///
/// `start..end` are byte offsets into that page's normalized text. The
/// segments for a page partition it: every byte belongs to exactly one
/// segment and segments never overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub page: usize,
    pub start: usize,
    pub end: usize,
    pub label: SegmentLabel,
    pub text: String,
}

impl Segment {
    /// Whether this segment survives into annotation.
    pub fn is_kept(&self) -> bool {
        !matches!(self.label, SegmentLabel::Discarded)
    }
}
