//! Record assembly.
//!
//! Turns a ranked candidate list into a [`BookRecord`]: picks the best
//! title, splits a subtitle, folds shouty casing into something
//! readable, and attaches provenance.

use chrono::{DateTime, Utc};

use crate::model::EntityKind;
use crate::{BookRecord, Candidate, IngestConfig, Provenance};

/// Weight of the title confidence in the aggregate, relative to one
/// author each.
const TITLE_CONFIDENCE_WEIGHT: f64 = 2.0;

/// Build a catalog record from scored candidates.
///
/// `candidates` must already be ranked best-first. Persons below the
/// author threshold are dropped; a missing title yields an empty-titled
/// record flagged as low confidence rather than an error.
pub fn build_record(
    candidates: &[Candidate],
    source: &str,
    document_id: &str,
    extracted_at: DateTime<Utc>,
    config: &IngestConfig,
) -> BookRecord {
    let title_candidate = candidates
        .iter()
        .find(|c| c.kind == EntityKind::TitleCandidate);
    let title_confidence = title_candidate.map_or(0.0, |c| c.confidence);

    let (title, subtitle) = match title_candidate {
        Some(candidate) => {
            let (main, sub) = split_subtitle(&candidate.text);
            (headline_case(main), sub.map(headline_case))
        }
        None => (String::new(), None),
    };

    let mut authors = Vec::new();
    let mut author_confidences = Vec::new();
    let mut seen = Vec::new();
    for candidate in candidates {
        if candidate.kind != EntityKind::Person
            || candidate.confidence < config.author_threshold
        {
            continue;
        }
        if seen.contains(&candidate.norm) {
            continue;
        }
        seen.push(candidate.norm.clone());
        authors.push(display_name(&candidate.text));
        author_confidences.push(candidate.confidence);
    }

    let confidence = aggregate_confidence(title_confidence, &author_confidences);
    let low_confidence = title_confidence < config.title_floor;

    BookRecord {
        title,
        subtitle,
        authors,
        source: source.to_string(),
        confidence,
        low_confidence,
        provenance: vec![Provenance {
            document_id: document_id.to_string(),
            extracted_at,
        }],
    }
}

/// Weighted mean of title and author confidences; the title counts
/// double.
fn aggregate_confidence(title: f64, authors: &[f64]) -> f64 {
    let weight = TITLE_CONFIDENCE_WEIGHT + authors.len() as f64;
    let sum = TITLE_CONFIDENCE_WEIGHT * title + authors.iter().sum::<f64>();
    sum / weight
}

/// Split `"Title: Subtitle"` on the first `": "`. Both halves must be
/// non-empty for the split to take.
fn split_subtitle(text: &str) -> (&str, Option<&str>) {
    if let Some((main, sub)) = text.split_once(": ") {
        let main = main.trim();
        let sub = sub.trim();
        if !main.is_empty() && !sub.is_empty() {
            return (main, Some(sub));
        }
    }
    (text, None)
}

/// Fold an ALL-CAPS phrase to headline case; anything mixed-case is
/// left alone. Minor words are lowered unless first or last.
fn headline_case(text: &str) -> String {
    if !is_shouting(text) {
        return text.to_string();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && i < last && is_minor_word(&lower) {
                lower
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// An ALL-CAPS author name is folded word by word; otherwise the name
/// is kept as written.
fn display_name(name: &str) -> String {
    if is_shouting(name) {
        name.split_whitespace()
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        name.trim().to_string()
    }
}

fn is_shouting(text: &str) -> bool {
    let mut letters = 0;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if c.is_lowercase() {
            return false;
        }
    }
    letters > 0
}

/// Uppercase the first character, lowercase the rest.
pub(crate) fn capitalize<S: AsRef<str>>(word: S) -> String {
    let word = word.as_ref();
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

/// Words not capitalized inside a headline-cased title.
pub(crate) fn is_minor_word(word: &str) -> bool {
    matches!(
        word,
        "a" | "an"
            | "the"
            | "and"
            | "but"
            | "or"
            | "nor"
            | "for"
            | "so"
            | "yet"
            | "as"
            | "at"
            | "by"
            | "in"
            | "of"
            | "on"
            | "per"
            | "to"
            | "up"
            | "via"
            | "with"
            | "from"
            | "into"
            | "onto"
            | "over"
            | "upon"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::normalize;

    fn candidate(text: &str, kind: EntityKind, confidence: f64) -> Candidate {
        Candidate {
            text: text.to_string(),
            norm: normalize(text),
            kind,
            confidence,
            count: 1,
            first_page: 0,
            synthetic: false,
        }
    }

    fn build(candidates: &[Candidate]) -> BookRecord {
        build_record(
            candidates,
            "scan.pdf",
            "abc123",
            Utc::now(),
            &IngestConfig::default(),
        )
    }

    // ===== titles =====

    #[test]
    fn caps_title_is_folded_to_headline_case() {
        let record = build(&[candidate("THE LORD OF THE RINGS", EntityKind::TitleCandidate, 0.8)]);
        assert_eq!(record.title, "The Lord of the Rings");
        assert_eq!(record.subtitle, None);
    }

    #[test]
    fn mixed_case_title_is_kept_verbatim() {
        let record = build(&[candidate("iPhone for Dummies", EntityKind::TitleCandidate, 0.8)]);
        assert_eq!(record.title, "iPhone for Dummies");
    }

    #[test]
    fn subtitle_splits_on_colon_space() {
        let record = build(&[candidate(
            "THE GREAT NOVEL: A STORY OF OUR TIME",
            EntityKind::TitleCandidate,
            0.8,
        )]);
        assert_eq!(record.title, "The Great Novel");
        assert_eq!(record.subtitle.as_deref(), Some("A Story of Our Time"));
    }

    #[test]
    fn empty_subtitle_half_does_not_split() {
        let record = build(&[candidate("Untitled: ", EntityKind::TitleCandidate, 0.8)]);
        assert_eq!(record.title, "Untitled: ");
        assert_eq!(record.subtitle, None);
    }

    #[test]
    fn first_title_candidate_in_rank_order_wins() {
        let record = build(&[
            candidate("First Title", EntityKind::TitleCandidate, 0.9),
            candidate("Second Title", EntityKind::TitleCandidate, 0.8),
        ]);
        assert_eq!(record.title, "First Title");
    }

    // ===== authors =====

    #[test]
    fn authors_below_threshold_are_dropped() {
        let record = build(&[
            candidate("Strong Title", EntityKind::TitleCandidate, 0.9),
            candidate("Jane Doe", EntityKind::Person, 0.6),
            candidate("Faint Name", EntityKind::Person, 0.1),
        ]);
        assert_eq!(record.authors, vec!["Jane Doe"]);
    }

    #[test]
    fn duplicate_authors_collapse_by_normalized_name() {
        let record = build(&[
            candidate("Strong Title", EntityKind::TitleCandidate, 0.9),
            candidate("JANE DOE", EntityKind::Person, 0.7),
            candidate("Jane Doe", EntityKind::Person, 0.6),
        ]);
        assert_eq!(record.authors, vec!["Jane Doe"]);
    }

    #[test]
    fn caps_author_names_are_folded() {
        let record = build(&[
            candidate("Strong Title", EntityKind::TitleCandidate, 0.9),
            candidate("JANE DOE", EntityKind::Person, 0.7),
        ]);
        assert_eq!(record.authors, vec!["Jane Doe"]);
    }

    #[test]
    fn author_order_follows_candidate_rank() {
        let record = build(&[
            candidate("Strong Title", EntityKind::TitleCandidate, 0.9),
            candidate("Jane Doe", EntityKind::Person, 0.7),
            candidate("John Roe", EntityKind::Person, 0.6),
        ]);
        assert_eq!(record.authors, vec!["Jane Doe", "John Roe"]);
    }

    // ===== confidence =====

    #[test]
    fn aggregate_weighs_title_double() {
        let record = build(&[
            candidate("Strong Title", EntityKind::TitleCandidate, 0.85),
            candidate("Jane Doe", EntityKind::Person, 0.79),
        ]);
        let expected = (2.0 * 0.85 + 0.79) / 3.0;
        assert!((record.confidence - expected).abs() < 1e-9);
        assert!(!record.low_confidence);
    }

    #[test]
    fn title_only_aggregate_equals_title_confidence() {
        let record = build(&[candidate("Strong Title", EntityKind::TitleCandidate, 0.85)]);
        assert!((record.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn missing_title_yields_low_confidence_record() {
        let record = build(&[candidate("Jane Doe", EntityKind::Person, 0.7)]);
        assert_eq!(record.title, "");
        assert!(record.low_confidence);
        // title contributes zero, one author at 0.7
        assert!((record.confidence - 0.7 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn raised_title_floor_flags_weak_titles() {
        let config = IngestConfig {
            title_floor: 0.5,
            ..IngestConfig::default()
        };
        let record = build_record(
            &[candidate("Weak Title", EntityKind::TitleCandidate, 0.3)],
            "scan.pdf",
            "abc123",
            Utc::now(),
            &config,
        );
        assert_eq!(record.title, "Weak Title");
        assert!(record.low_confidence);
    }

    // ===== provenance =====

    #[test]
    fn provenance_records_the_source_document() {
        let when = Utc::now();
        let record = build_record(
            &[candidate("Strong Title", EntityKind::TitleCandidate, 0.9)],
            "books/scan.pdf",
            "abc123",
            when,
            &IngestConfig::default(),
        );
        assert_eq!(record.source, "books/scan.pdf");
        assert_eq!(record.provenance.len(), 1);
        assert_eq!(record.provenance[0].document_id, "abc123");
        assert_eq!(record.provenance[0].extracted_at, when);
    }
}
