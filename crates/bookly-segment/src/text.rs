//! Whitespace normalization applied before segmentation.
//!
//! Extraction backends disagree about line endings, tab handling, and
//! blank-line padding. Normalizing once, at document construction, keeps
//! segment byte offsets stable for the rest of the pipeline. Nothing
//! beyond whitespace is corrected here; OCR noise passes through.

/// Normalize extraction whitespace in one page of text.
///
/// CRLF and bare CR become LF, tabs and non-breaking spaces become plain
/// spaces, trailing spaces are stripped from each line, and runs of three
/// or more blank lines collapse to two. Idempotent.
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for raw_line in unified.lines() {
        let line: String = raw_line
            .chars()
            .map(|c| match c {
                '\t' | '\u{a0}' => ' ',
                other => other,
            })
            .collect();
        let line = line.trim_end();

        if line.is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }

        out.push_str(line);
        out.push('\n');
    }

    if !unified.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }

    out
}

/// Whether a line contains nothing but whitespace.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
