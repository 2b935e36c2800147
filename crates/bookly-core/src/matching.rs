//! Text normalization and record similarity.
//!
//! Everything that compares titles or authors goes through [`normalize`]
//! so fingerprints, candidate grouping, and merge decisions all agree on
//! what "the same text" means.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

/// Normalize text for comparison: expand ligatures, strip diacritics to
/// ASCII via NFKD, drop everything that is not alphanumeric, lowercase.
pub fn normalize(text: &str) -> String {
    // NFKD handles fi/fl ligatures but not these
    let expanded = text
        .replace('æ', "ae")
        .replace('Æ', "Ae")
        .replace('œ', "oe")
        .replace('Œ', "Oe")
        .replace('ß', "ss")
        .replace('ø', "o")
        .replace('Ø', "O")
        .replace('ł', "l")
        .replace('Ł', "L")
        .replace('đ', "d")
        .replace('Đ', "D");
    let ascii: String = expanded.nfkd().filter(|c| c.is_ascii()).collect();
    NON_ALNUM.replace_all(&ascii, "").to_lowercase()
}

/// Fuzzy similarity between two titles in `[0, 1]`.
///
/// Returns 0.0 when either side normalizes to nothing; an unreadable
/// title never matches anything on title evidence alone.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize(a);
    let norm_b = normalize(b);
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }
    rapidfuzz::fuzz::ratio(norm_a.chars(), norm_b.chars())
}

/// Jaccard similarity between two author lists over normalized names.
///
/// Two records with no authors at all are treated as agreeing (1.0);
/// one-sided absence is treated as unknown (0.5) rather than conflict.
pub fn author_similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<String> = a.iter().map(|s| normalize(s)).filter(|s| !s.is_empty()).collect();
    let set_b: HashSet<String> = b.iter().map(|s| normalize(s)).filter(|s| !s.is_empty()).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.5;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Catalog key: normalized title plus sorted normalized authors.
///
/// Records whose fingerprints are equal are the same book by definition,
/// whatever the similarity scores say.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(title: &str, authors: &[String]) -> Self {
        let mut names: Vec<String> = authors
            .iter()
            .map(|a| normalize(a))
            .filter(|a| !a.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Fingerprint(format!("{}|{}", normalize(title), names.join("+")))
    }

    pub fn of_record(record: &crate::BookRecord) -> Self {
        Self::new(&record.title, &record.authors)
    }

    /// Rehydrate a key that was previously stored with `as_str`.
    pub fn from_raw(raw: String) -> Self {
        Fingerprint(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== normalize =====

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("The Great Novel!"), "thegreatnovel");
        assert_eq!(normalize("  spaced   out  "), "spacedout");
    }

    #[test]
    fn normalize_strips_diacritics() {
        assert_eq!(normalize("Büchner"), "buchner");
        assert_eq!(normalize("Café"), "cafe");
    }

    #[test]
    fn normalize_expands_ligatures() {
        // U+FB01 decomposes under NFKD
        assert_eq!(normalize("ﬁre"), "fire");
        assert_eq!(normalize("Ästhetik der Größe"), "asthetikdergrosse");
        assert_eq!(normalize("Cæsar"), "caesar");
    }

    #[test]
    fn normalize_can_produce_empty() {
        assert_eq!(normalize("???"), "");
        assert_eq!(normalize(""), "");
    }

    // ===== title similarity =====

    #[test]
    fn identical_titles_score_one() {
        let s = title_similarity("The Great Novel", "THE GREAT NOVEL!");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn near_identical_titles_score_high() {
        let s = title_similarity("The Great Novel", "The Great Novell");
        assert!(s >= 0.95, "score was {s}");
    }

    #[test]
    fn unrelated_titles_score_low() {
        let s = title_similarity("The Great Novel", "Introduction to Topology");
        assert!(s < 0.6, "score was {s}");
    }

    #[test]
    fn empty_title_never_matches() {
        assert_eq!(title_similarity("", "The Great Novel"), 0.0);
        assert_eq!(title_similarity("???", "!!!"), 0.0);
    }

    // ===== author similarity =====

    #[test]
    fn both_author_lists_empty_agree() {
        assert_eq!(author_similarity(&[], &[]), 1.0);
    }

    #[test]
    fn one_sided_authors_are_unknown() {
        let authors = vec!["Jane Doe".to_string()];
        assert_eq!(author_similarity(&authors, &[]), 0.5);
        assert_eq!(author_similarity(&[], &authors), 0.5);
    }

    #[test]
    fn jaccard_over_normalized_names() {
        let a = vec!["Jane Doe".to_string(), "John Smith".to_string()];
        let b = vec!["JANE DOE".to_string()];
        // intersection 1, union 2
        assert!((author_similarity(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn disjoint_authors_score_zero() {
        let a = vec!["Jane Doe".to_string()];
        let b = vec!["Someone Else".to_string()];
        assert_eq!(author_similarity(&a, &b), 0.0);
    }

    // ===== fingerprints =====

    #[test]
    fn fingerprint_sorts_and_dedups_authors() {
        let a = Fingerprint::new("The Great Novel", &["John Smith".into(), "Jane Doe".into()]);
        let b = Fingerprint::new(
            "the great novel!",
            &["jane doe".into(), "JOHN SMITH".into(), "Jane Doe".into()],
        );
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "thegreatnovel|janedoe+johnsmith");
    }

    #[test]
    fn fingerprint_ignores_unusable_authors() {
        let a = Fingerprint::new("Title", &["???".into()]);
        let b = Fingerprint::new("Title", &[]);
        assert_eq!(a, b);
    }
}
