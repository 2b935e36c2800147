//! Boilerplate detection: running headers, footers, and page numbers.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SegmenterConfig;

/// Default patterns for standalone page-number lines.
///
/// Matched against the trimmed line. Digit-only folios, "Page 3 of 210"
/// style counters, dash-wrapped numbers, and short roman-numeral folios.
static DEFAULT_PAGE_NUMBER_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^(?:page\s+)?\d{1,4}(?:\s+of\s+\d{1,4})?$").unwrap(),
        Regex::new(r"^[-–—]\s*\d{1,4}\s*[-–—]$").unwrap(),
        Regex::new(r"(?i)^[ivxlcdm]{2,8}$").unwrap(),
    ]
});

/// Index of lines to discard, built once per document.
///
/// Two sources: lines whose normalized key repeats on enough pages
/// (running headers/footers), and lines matching a page-number pattern.
pub(crate) struct BoilerplateIndex {
    repeated: HashSet<String>,
    page_number_res: Vec<Regex>,
    max_line_chars: usize,
}

impl BoilerplateIndex {
    pub(crate) fn build(page_lines: &[Vec<&str>], config: &SegmenterConfig) -> Self {
        let mut page_counts: HashMap<String, usize> = HashMap::new();
        for lines in page_lines {
            // Count each key once per page so a footer printed twice on one
            // page does not inflate its page count.
            let mut seen: HashSet<String> = HashSet::new();
            for line in lines {
                if let Some(key) = line_key(line, config.max_repeat_line_chars)
                    && seen.insert(key.clone())
                {
                    *page_counts.entry(key).or_insert(0) += 1;
                }
            }
        }

        let required = required_pages(page_lines.len(), config.repeat_ratio);
        let repeated: HashSet<String> = page_counts
            .into_iter()
            .filter(|(_, pages)| *pages >= required)
            .map(|(key, _)| key)
            .collect();

        let page_number_res = config
            .page_number_patterns
            .resolve(&DEFAULT_PAGE_NUMBER_RES);

        Self {
            repeated,
            page_number_res,
            max_line_chars: config.max_repeat_line_chars,
        }
    }

    /// Whether a line should be labeled `Discarded`.
    pub(crate) fn is_boilerplate(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }
        if self.page_number_res.iter().any(|re| re.is_match(trimmed)) {
            return true;
        }
        match line_key(line, self.max_line_chars) {
            Some(key) => self.repeated.contains(&key),
            None => false,
        }
    }
}

/// Normalized repetition key for a line, or `None` if the line cannot be
/// boilerplate (blank, or too long for a header/footer).
///
/// Lowercased with digit runs collapsed to `#`, so "Page 3 of 210" and
/// "Page 7 of 210" share a key.
fn line_key(line: &str, max_chars: usize) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_chars {
        return None;
    }

    let mut key = String::with_capacity(trimmed.len());
    let mut in_digits = false;
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                key.push('#');
                in_digits = true;
            }
        } else {
            in_digits = false;
            key.extend(c.to_lowercase());
        }
    }
    Some(key)
}

/// How many pages a line must appear on before it counts as repeated.
///
/// `ceil(ratio * pages)`, but never fewer than 2: on a one-page document
/// repetition is meaningless, and on tiny documents a single appearance
/// must not discard real text.
fn required_pages(n_pages: usize, ratio: f64) -> usize {
    ((ratio * n_pages as f64).ceil() as usize).max(2)
}
