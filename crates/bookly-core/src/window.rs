//! Splitting segment text into model-sized windows.
//!
//! Models cap how much text one call may carry, so long segments are cut
//! into windows. Cuts prefer sentence ends, then line breaks, then plain
//! whitespace, and fall back to a hard split only for unbreakable runs.
//! A cut that would land inside a run of capitalized words (likely a
//! name or title) is moved back to an earlier break when one exists, so
//! entities are not sliced in half. Planning is pure and deterministic.

use std::ops::Range;

/// Plan windows of at most `max_window` bytes covering all of `text`.
///
/// The returned ranges tile the text exactly: concatenating them yields
/// the input. Every boundary is a char boundary.
pub fn plan_windows(text: &str, max_window: usize) -> Vec<Range<usize>> {
    let max_window = max_window.max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let rest = &text[start..];
        if rest.len() <= max_window {
            windows.push(start..text.len());
            break;
        }
        let cut = cut_point(rest, max_window);
        windows.push(start..start + cut);
        start += cut;
    }
    windows
}

/// Pick where to end the next window within `rest`, which is known to be
/// longer than `max_window`. Returns a byte offset in `(0, max_window]`.
fn cut_point(rest: &str, max_window: usize) -> usize {
    let mut limit = max_window;
    while limit > 0 && !rest.is_char_boundary(limit) {
        limit -= 1;
    }
    if limit == 0 {
        // first char alone exceeds the window; emit it whole
        return rest.chars().next().map(|c| c.len_utf8()).unwrap_or(rest.len());
    }

    let mut sentence_cut = None;
    let mut newline_cut = None;
    let mut space_cut = None;
    let mut break_cuts: Vec<usize> = Vec::new();
    let mut last_non_ws: Option<char> = None;

    for (i, c) in rest.char_indices() {
        let end = i + c.len_utf8();
        if end > limit {
            break;
        }
        if c.is_whitespace() {
            if matches!(last_non_ws, Some('.') | Some('!') | Some('?')) {
                sentence_cut = Some(end);
            }
            if c == '\n' {
                newline_cut = Some(end);
            }
            space_cut = Some(end);
            break_cuts.push(end);
        } else {
            last_non_ws = Some(c);
        }
    }

    if let Some(cut) = sentence_cut {
        return cut;
    }

    let Some(cut) = newline_cut.or(space_cut) else {
        // one unbroken token; hard split on a char boundary
        return limit;
    };

    if !splits_capital_run(rest, cut) {
        return cut;
    }
    // look behind for a break that does not bisect a capitalized run;
    // there is no sentence end to stop at, so the whole window is fair game
    for &alt in break_cuts.iter().rev() {
        if alt >= cut {
            continue;
        }
        if !splits_capital_run(rest, alt) {
            return alt;
        }
    }
    cut
}

fn splits_capital_run(rest: &str, cut: usize) -> bool {
    let before = rest[..cut].split_whitespace().next_back();
    let after = rest[cut..].split_whitespace().next();
    match (before, after) {
        (Some(b), Some(a)) => starts_upper(b) && starts_upper(a),
        _ => false,
    }
}

fn starts_upper(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}
