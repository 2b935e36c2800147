//! Candidate scoring.
//!
//! Spans are grouped by kind and normalized text, and each group gets a
//! confidence from three cues: where it first appears, how often it
//! repeats, and how it is formatted. Front matter dominates; a title on
//! the title page outranks the same words buried on page forty.

use std::cmp::Ordering;
use std::collections::HashMap;

use bookly_segment::SegmentLabel;

use crate::builder::{capitalize, is_minor_word};
use crate::matching::normalize;
use crate::model::EntityKind;
use crate::{AnnotatedSpan, Candidate};

/// Position score for groups that never appear in front matter.
const BODY_POSITION: f64 = 0.1;
/// Confidence assigned to a title invented from the file stem.
const SYNTHETIC_CONFIDENCE: f64 = 0.1;

/// Relative weight of each scoring cue. Must sum to 1 for confidences
/// to stay in `[0, 1]`; custom weights are clamped after combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub position: f64,
    pub repetition: f64,
    pub format: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            position: 0.5,
            repetition: 0.3,
            format: 0.2,
        }
    }
}

/// Formatting strength of an occurrence, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FormatCue {
    Plain,
    LeadingCapital,
    TitleCase,
    AllCaps,
}

impl FormatCue {
    fn of(text: &str) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return FormatCue::Plain;
        }
        let mut letters = 0;
        let mut all_upper = true;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if c.is_lowercase() {
                all_upper = false;
            }
        }
        if letters > 0 && all_upper {
            return FormatCue::AllCaps;
        }
        let last = words.len() - 1;
        let title_cased = words.len() >= 2
            && words.iter().enumerate().all(|(i, w)| {
                let Some(first) = w.chars().next() else {
                    return true;
                };
                first.is_uppercase()
                    || first.is_numeric()
                    || (i > 0 && i < last && is_minor_word(&w.to_lowercase()))
            });
        if title_cased {
            return FormatCue::TitleCase;
        }
        match words[0].chars().next() {
            Some(c) if c.is_uppercase() => FormatCue::LeadingCapital,
            _ => FormatCue::Plain,
        }
    }

    fn score(self) -> f64 {
        match self {
            FormatCue::AllCaps => 1.0,
            FormatCue::TitleCase => 0.7,
            FormatCue::LeadingCapital => 0.4,
            FormatCue::Plain => 0.2,
        }
    }
}

struct Group {
    display: String,
    count: usize,
    first_page: usize,
    front_page: Option<usize>,
    best_cue: FormatCue,
    first_seen: usize,
}

/// Score and rank the spans of one document.
///
/// The result is ordered best-first. If no title candidate was seen at
/// all, a synthetic one is derived from the file stem so a record can
/// always be built.
pub fn score_document(
    spans: &[AnnotatedSpan],
    file_stem: &str,
    weights: &ScoringWeights,
) -> Vec<Candidate> {
    let mut groups: HashMap<(EntityKind, String), Group> = HashMap::new();

    for (i, span) in spans.iter().enumerate() {
        let text = span.text.trim();
        let norm = normalize(text);
        if norm.is_empty() {
            continue;
        }
        let cue = FormatCue::of(text);
        let group = groups
            .entry((span.kind, norm))
            .or_insert_with(|| Group {
                display: text.to_string(),
                count: 0,
                first_page: span.page,
                front_page: None,
                best_cue: cue,
                first_seen: i,
            });
        group.count += 1;
        group.first_page = group.first_page.min(span.page);
        if span.label == SegmentLabel::FrontMatter {
            group.front_page = Some(group.front_page.map_or(span.page, |p| p.min(span.page)));
        }
        if cue > group.best_cue {
            group.best_cue = cue;
            group.display = text.to_string();
        }
    }

    let mut scored: Vec<(Candidate, usize)> = groups
        .into_iter()
        .map(|((kind, norm), group)| {
            let position = match group.front_page {
                Some(page) => 0.5_f64.powi(page as i32),
                None => BODY_POSITION,
            };
            let repetition = 1.0 - 1.0 / group.count as f64;
            let format = group.best_cue.score();
            let confidence = (weights.position * position
                + weights.repetition * repetition
                + weights.format * format)
                .clamp(0.0, 1.0);
            let candidate = Candidate {
                text: group.display,
                norm,
                kind,
                confidence,
                count: group.count,
                first_page: group.first_page,
                synthetic: false,
            };
            (candidate, group.first_seen)
        })
        .collect();

    if !scored.iter().any(|(c, _)| c.kind == EntityKind::TitleCandidate) {
        if let Some(candidate) = synthetic_title(file_stem) {
            tracing::debug!(title = %candidate.text, "no title seen, synthesizing from file stem");
            scored.push((candidate, usize::MAX));
        }
    }

    scored.sort_by(|(a, a_seen), (b, b_seen)| rank(a, *a_seen, b, *b_seen));
    scored.into_iter().map(|(c, _)| c).collect()
}

fn rank(a: &Candidate, a_seen: usize, b: &Candidate, b_seen: usize) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
        .then_with(|| match a.kind {
            // prefer the longer title, then the lexicographically smaller
            EntityKind::TitleCandidate => {
                let a_words = a.text.split_whitespace().count();
                let b_words = b.text.split_whitespace().count();
                b_words.cmp(&a_words).then_with(|| a.norm.cmp(&b.norm))
            }
            // prefer whoever showed up first
            EntityKind::Person => a_seen.cmp(&b_seen),
            _ => a.norm.cmp(&b.norm),
        })
}

fn kind_rank(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::TitleCandidate => 0,
        EntityKind::Person => 1,
        EntityKind::Org => 2,
        EntityKind::Other => 3,
    }
}

/// Last-resort title from a file stem: separators become spaces and each
/// word is capitalized. Returns nothing when the stem has no usable text.
fn synthetic_title(file_stem: &str) -> Option<Candidate> {
    let cleaned: String = file_stem
        .chars()
        .map(|c| match c {
            '_' | '-' | '.' | '+' => ' ',
            other => other,
        })
        .collect();
    let words: Vec<String> = cleaned.split_whitespace().map(capitalize).collect();
    let text = words.join(" ");
    let norm = normalize(&text);
    if norm.is_empty() {
        return None;
    }
    Some(Candidate {
        text,
        norm,
        kind: EntityKind::TitleCandidate,
        confidence: SYNTHETIC_CONFIDENCE,
        count: 0,
        first_page: 0,
        synthetic: true,
    })
}
