//! Regex-driven entity model.
//!
//! No external services, no training data. The rules are tuned for the
//! front matter of books: attribution lines, display titles, name runs,
//! and publisher imprints. Recall beats precision here; the scorer is
//! what separates real titles and authors from the noise.

use std::future::Future;
use std::pin::Pin;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{EntityKind, EntityModel, ModelError, ModelSpan};

const MAX_WINDOW: usize = 64 * 1024;

/// An attribution line: everything before a trailing "by NAME" is the
/// title, the name is the author.
static BY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?P<title>\S(?:.*\S)?)\s+(?:by|By|BY)\s+(?P<author>[A-Z][\w.'’-]*(?:\s+[A-Z][\w.'’-]*){0,4})\s*$",
    )
    .unwrap()
});

/// Runs of two to four capitalized words, allowing initials after the
/// first word.
static NAME_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+(?:[A-Z]\.|[A-Z][a-z]+)){1,3}").unwrap());

/// Capitalized phrases ending in a publisher suffix.
static ORG_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][\w&'’-]*(?:\s+[A-Z][\w&'’-]*){0,4}\s+(?:Press|Publishing|Books|University)\b")
        .unwrap()
});

/// The built-in rule-based model.
#[derive(Debug, Default, Clone)]
pub struct HeuristicModel;

impl HeuristicModel {
    pub fn new() -> Self {
        Self
    }
}

impl EntityModel for HeuristicModel {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn max_window(&self) -> usize {
        MAX_WINDOW
    }

    fn annotate<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelSpan>, ModelError>> + Send + 'a>> {
        let spans = scan(text);
        Box::pin(async move { Ok(spans) })
    }
}

fn scan(text: &str) -> Vec<ModelSpan> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        scan_line(line, line_start, &mut spans);
    }
    spans.sort_by_key(|s| (s.start, s.end));
    spans
}

fn scan_line(line: &str, line_start: usize, spans: &mut Vec<ModelSpan>) {
    if line.trim().is_empty() {
        return;
    }

    if let Some(caps) = BY_LINE.captures(line) {
        if let (Some(title), Some(author)) = (caps.name("title"), caps.name("author")) {
            spans.push(ModelSpan {
                start: line_start + title.start(),
                end: line_start + title.end(),
                kind: EntityKind::TitleCandidate,
            });
            spans.push(ModelSpan {
                start: line_start + author.start(),
                end: line_start + author.end(),
                kind: EntityKind::Person,
            });
            return;
        }
    }

    if let Some((start, end)) = emphatic_span(line) {
        spans.push(ModelSpan {
            start: line_start + start,
            end: line_start + end,
            kind: EntityKind::TitleCandidate,
        });
        return;
    }

    let orgs: Vec<(usize, usize)> = ORG_PHRASE.find_iter(line).map(|m| (m.start(), m.end())).collect();
    for &(start, end) in &orgs {
        spans.push(ModelSpan {
            start: line_start + start,
            end: line_start + end,
            kind: EntityKind::Org,
        });
    }

    for m in NAME_PHRASE.find_iter(line) {
        // publisher names look like person names; the org rule wins
        if orgs.iter().any(|&(s, e)| m.start() < e && s < m.end()) {
            continue;
        }
        let first = m.as_str().split_whitespace().next().unwrap_or("");
        if is_common_starter(first) {
            continue;
        }
        spans.push(ModelSpan {
            start: line_start + m.start(),
            end: line_start + m.end(),
            kind: EntityKind::Person,
        });
    }
}

/// A standalone display line: all caps, or a short title-cased phrase.
/// Returns the trimmed extent in line-relative bytes.
fn emphatic_span(line: &str) -> Option<(usize, usize)> {
    let trimmed = line.trim();
    if trimmed.len() < 3 || trimmed.len() > 100 {
        return None;
    }
    if trimmed.ends_with(['.', ',', ';']) {
        return None;
    }
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() > 12 {
        return None;
    }
    let emphatic = is_all_caps(trimmed) || (words.len() >= 2 && is_title_cased(&words));
    if !emphatic {
        return None;
    }
    let lead = line.len() - line.trim_start().len();
    Some((lead, lead + trimmed.len()))
}

fn is_all_caps(text: &str) -> bool {
    let mut letters = 0;
    for c in text.chars() {
        if c.is_alphabetic() {
            if c.is_lowercase() {
                return false;
            }
            letters += 1;
        }
    }
    letters >= 3
}

fn is_title_cased(words: &[&str]) -> bool {
    words.iter().enumerate().all(|(i, word)| {
        let stripped = word.trim_matches(|c: char| !c.is_alphanumeric());
        let Some(first) = stripped.chars().next() else {
            return true;
        };
        if first.is_uppercase() || first.is_numeric() {
            return true;
        }
        i > 0 && i + 1 < words.len() && is_minor(&stripped.to_lowercase())
    })
}

fn is_minor(word: &str) -> bool {
    matches!(
        word,
        "a" | "an" | "the" | "and" | "or" | "of" | "in" | "on" | "to" | "for" | "with" | "at"
            | "by" | "from"
    )
}

fn is_common_starter(word: &str) -> bool {
    matches!(
        word.to_lowercase().as_str(),
        "the" | "a" | "an" | "this" | "that" | "these" | "those" | "it" | "i" | "we" | "they"
            | "he" | "she"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spans_of(text: &str) -> Vec<ModelSpan> {
        HeuristicModel::new().annotate(text).await.unwrap()
    }

    fn texts<'a>(text: &'a str, spans: &[ModelSpan], kind: EntityKind) -> Vec<&'a str> {
        spans
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| &text[s.start..s.end])
            .collect()
    }

    #[tokio::test]
    async fn by_line_yields_title_and_author() {
        let text = "THE GREAT NOVEL by Jane Doe";
        let spans = spans_of(text).await;
        assert_eq!(texts(text, &spans, EntityKind::TitleCandidate), vec!["THE GREAT NOVEL"]);
        assert_eq!(texts(text, &spans, EntityKind::Person), vec!["Jane Doe"]);
    }

    #[tokio::test]
    async fn by_line_handles_all_caps_author() {
        let text = "THE GREAT NOVEL BY JANE DOE";
        let spans = spans_of(text).await;
        assert_eq!(texts(text, &spans, EntityKind::Person), vec!["JANE DOE"]);
    }

    #[tokio::test]
    async fn all_caps_line_is_a_title_candidate() {
        let text = "preface\n\n  THE GREAT NOVEL  \nchapter one";
        let spans = spans_of(text).await;
        assert_eq!(texts(text, &spans, EntityKind::TitleCandidate), vec!["THE GREAT NOVEL"]);
    }

    #[tokio::test]
    async fn title_cased_line_is_a_title_candidate() {
        let text = "A Study of Winter Light";
        let spans = spans_of(text).await;
        assert_eq!(
            texts(text, &spans, EntityKind::TitleCandidate),
            vec!["A Study of Winter Light"]
        );
    }

    #[tokio::test]
    async fn prose_sentence_is_not_a_title() {
        let text = "The Dog Runs Very Fast Today.";
        let spans = spans_of(text).await;
        assert!(texts(text, &spans, EntityKind::TitleCandidate).is_empty());
    }

    #[tokio::test]
    async fn name_runs_become_people() {
        let text = "Edited with an introduction from Jane Doe and John A. Smith.";
        let spans = spans_of(text).await;
        assert_eq!(
            texts(text, &spans, EntityKind::Person),
            vec!["Jane Doe", "John A. Smith"]
        );
    }

    #[tokio::test]
    async fn common_starters_are_not_people() {
        let text = "This Edition appeared later. They Said its cover was blue.";
        let spans = spans_of(text).await;
        assert!(texts(text, &spans, EntityKind::Person).is_empty());
    }

    #[tokio::test]
    async fn publisher_suffix_is_an_org_not_a_person() {
        let text = "First published in Boston by the house of Acme Press in 1994.";
        let spans = spans_of(text).await;
        assert_eq!(texts(text, &spans, EntityKind::Org), vec!["Acme Press"]);
        assert!(texts(text, &spans, EntityKind::Person).is_empty());
    }

    #[tokio::test]
    async fn university_imprint_is_an_org() {
        let text = "copyright 2001 Northern Lakes University and licensors";
        let spans = spans_of(text).await;
        assert_eq!(texts(text, &spans, EntityKind::Org), vec!["Northern Lakes University"]);
    }

    #[tokio::test]
    async fn empty_text_has_no_spans() {
        assert!(spans_of("").await.is_empty());
        assert!(spans_of("\n\n  \n").await.is_empty());
    }

    #[tokio::test]
    async fn spans_are_sorted_and_in_range() {
        let text = "THE GREAT NOVEL by Jane Doe\nAcme Press\nwith thanks from John Smith";
        let spans = spans_of(text).await;
        assert!(!spans.is_empty());
        for pair in spans.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        for s in &spans {
            assert!(s.start < s.end && s.end <= text.len());
            assert!(text.is_char_boundary(s.start) && text.is_char_boundary(s.end));
        }
    }
}
