//! Record matching and merging.
//!
//! Two records describe the same book when their titles are nearly
//! identical, or when title and author similarity combined clear the
//! merge threshold. Merging keeps the better title, unions authors, and
//! accumulates provenance.

use std::cmp::Ordering;

use crate::matching::{author_similarity, normalize, title_similarity, Fingerprint};
use crate::BookRecord;

const TITLE_WEIGHT: f64 = 0.7;
const AUTHOR_WEIGHT: f64 = 0.3;

/// Thresholds governing when two records merge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    /// Combined similarity at or above this merges.
    pub merge_threshold: f64,
    /// Title similarity at or above this merges regardless of authors.
    pub strong_title_threshold: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            merge_threshold: 0.85,
            strong_title_threshold: 0.95,
        }
    }
}

/// Similarity between two records, broken out by component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    pub title: f64,
    pub authors: f64,
    pub combined: f64,
}

pub fn match_score(a: &BookRecord, b: &BookRecord) -> MatchScore {
    let title = title_similarity(&a.title, &b.title);
    let authors = author_similarity(&a.authors, &b.authors);
    MatchScore {
        title,
        authors,
        combined: TITLE_WEIGHT * title + AUTHOR_WEIGHT * authors,
    }
}

/// A near-identical title is decisive on its own; otherwise the
/// combined score decides.
pub fn is_match(score: &MatchScore, policy: &MergePolicy) -> bool {
    score.title >= policy.strong_title_threshold || score.combined >= policy.merge_threshold
}

/// What the catalog did with an incoming record.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Inserted { fingerprint: Fingerprint },
    Merged { fingerprint: Fingerprint, similarity: f64 },
}

impl MergeOutcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            MergeOutcome::Inserted { fingerprint } => fingerprint,
            MergeOutcome::Merged { fingerprint, .. } => fingerprint,
        }
    }

    pub fn was_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged { .. })
    }
}

/// Fold `incoming` into `existing`.
///
/// Title and subtitle travel together from whichever record wins the
/// title. Author order keeps the existing record's authors first.
/// Commutative and idempotent up to author and provenance order.
pub fn merge_into(existing: &mut BookRecord, incoming: &BookRecord) {
    if prefer_incoming_title(existing, incoming) {
        existing.title = incoming.title.clone();
        existing.subtitle = incoming.subtitle.clone();
    }

    let mut known: Vec<String> = existing.authors.iter().map(|a| normalize(a)).collect();
    for author in &incoming.authors {
        let norm = normalize(author);
        if !known.contains(&norm) {
            known.push(norm);
            existing.authors.push(author.clone());
        }
    }

    existing.confidence = existing.confidence.max(incoming.confidence);
    existing.low_confidence = existing.low_confidence && incoming.low_confidence;

    for entry in &incoming.provenance {
        if !existing
            .provenance
            .iter()
            .any(|p| p.document_id == entry.document_id)
        {
            existing.provenance.push(entry.clone());
        }
    }
}

/// Higher confidence wins; ties go to the wordier title, then the
/// lexicographically smaller one so the choice is order-independent.
fn prefer_incoming_title(existing: &BookRecord, incoming: &BookRecord) -> bool {
    match incoming
        .confidence
        .partial_cmp(&existing.confidence)
        .unwrap_or(Ordering::Equal)
    {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            let incoming_words = incoming.title.split_whitespace().count();
            let existing_words = existing.title.split_whitespace().count();
            match incoming_words.cmp(&existing_words) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => incoming.title < existing.title,
            }
        }
    }
}
