use crate::boilerplate::BoilerplateIndex;
use crate::config::SegmenterConfig;
use crate::{Segment, SegmentError, SegmentLabel};

/// Segment the pages of a document with the default configuration.
pub fn segment_pages(pages: &[String]) -> Result<Vec<Segment>, SegmentError> {
    segment_pages_with_config(pages, &SegmenterConfig::default())
}

/// Segment the pages of a document.
///
/// Every byte of every page lands in exactly one segment. Boilerplate
/// lines (repeated headers/footers, page numbers) become `Discarded`
/// segments; the rest of a page is `FrontMatter` or `Body` depending on
/// where front matter ends (see [`SegmenterConfig`]).
///
/// Errors with [`SegmentError::EmptyDocument`] when there is no text at
/// all, or when discarding boilerplate leaves nothing behind.
pub fn segment_pages_with_config(
    pages: &[String],
    config: &SegmenterConfig,
) -> Result<Vec<Segment>, SegmentError> {
    if pages.iter().all(|p| p.trim().is_empty()) {
        return Err(SegmentError::EmptyDocument);
    }

    let page_lines: Vec<Vec<&str>> = pages.iter().map(|p| p.lines().collect()).collect();
    let index = BoilerplateIndex::build(&page_lines, config);
    let body_start = front_matter_end(&page_lines, &index, config);

    tracing::debug!(
        pages = pages.len(),
        front_matter_pages = body_start,
        "segmenting document"
    );

    let mut segments = Vec::new();
    for (page, text) in pages.iter().enumerate() {
        let keep_label = if page < body_start {
            SegmentLabel::FrontMatter
        } else {
            SegmentLabel::Body
        };
        push_page_segments(&mut segments, page, text, keep_label, &index);
    }

    let has_content = segments
        .iter()
        .any(|s| s.is_kept() && !s.text.trim().is_empty());
    if !has_content {
        return Err(SegmentError::EmptyDocument);
    }

    Ok(segments)
}

/// First page index that is body text.
///
/// Front matter covers at most the configured number of leading pages,
/// and ends early at the first page dense with long-sentence prose.
fn front_matter_end(
    page_lines: &[Vec<&str>],
    index: &BoilerplateIndex,
    config: &SegmenterConfig,
) -> usize {
    let limit = config.front_matter_pages.min(page_lines.len());
    for (page, lines) in page_lines.iter().enumerate().take(limit) {
        let kept: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| !index.is_boilerplate(l))
            .collect();
        let density = prose_density(&kept.join(" "), config);
        if density >= config.prose_density_threshold {
            return page;
        }
    }
    limit
}

/// Ratio of long sentences among all sentences, or 0.0 when there are too
/// few sentences to judge.
fn prose_density(text: &str, config: &SegmenterConfig) -> f64 {
    let sentences: Vec<&str> = text
        .split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if sentences.len() < config.min_sentences {
        return 0.0;
    }
    let long = sentences
        .iter()
        .filter(|s| s.split_whitespace().count() >= config.long_sentence_words)
        .count();
    long as f64 / sentences.len() as f64
}

/// Split one page into labeled segments, merging contiguous lines with the
/// same label into a single segment.
fn push_page_segments(
    out: &mut Vec<Segment>,
    page: usize,
    text: &str,
    keep_label: SegmentLabel,
    index: &BoilerplateIndex,
) {
    let mut run_start = 0usize;
    let mut run_label: Option<SegmentLabel> = None;
    let mut pos = 0usize;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches('\n');
        let label = if index.is_boilerplate(content) {
            SegmentLabel::Discarded
        } else {
            keep_label
        };

        match run_label {
            None => {
                run_label = Some(label);
                run_start = pos;
            }
            Some(current) if current == label => {}
            Some(current) => {
                out.push(Segment {
                    page,
                    start: run_start,
                    end: pos,
                    label: current,
                    text: text[run_start..pos].to_string(),
                });
                run_label = Some(label);
                run_start = pos;
            }
        }

        pos += line.len();
    }

    if let Some(label) = run_label {
        out.push(Segment {
            page,
            start: run_start,
            end: text.len(),
            label,
            text: text[run_start..].to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmenterConfigBuilder;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn long_prose() -> String {
        let sentence =
            "The quiet harbor town had always depended on the morning tide to carry its \
             fishing boats past the breakwater and out into open water. ";
        sentence.repeat(5)
    }

    // ── coverage ───────────────────────────────────────────────────────

    #[test]
    fn segments_cover_every_byte_exactly_once() {
        let input = pages(&[
            "THE GREAT NOVEL\n\nby Jane Doe\n12\n",
            &format!("12\n{}", long_prose()),
        ]);
        let segments = segment_pages(&input).unwrap();

        for (page, text) in input.iter().enumerate() {
            let mut page_segments: Vec<&Segment> =
                segments.iter().filter(|s| s.page == page).collect();
            page_segments.sort_by_key(|s| s.start);

            let mut pos = 0;
            for seg in &page_segments {
                assert_eq!(seg.start, pos, "gap or overlap on page {}", page);
                assert!(seg.end > seg.start);
                assert_eq!(&text[seg.start..seg.end], seg.text);
                pos = seg.end;
            }
            assert_eq!(pos, text.len(), "page {} not fully covered", page);
        }
    }

    // ── discard rules ──────────────────────────────────────────────────

    #[test]
    fn repeated_footer_discarded() {
        let input = pages(&[
            "THE GREAT NOVEL\nACME HOUSE\n",
            "chapter text one\nACME HOUSE\n",
            "chapter text two\n",
            "chapter text three\nACME HOUSE\n",
            "chapter text four\n",
        ]);
        let segments = segment_pages(&input).unwrap();

        let discarded: Vec<&Segment> = segments
            .iter()
            .filter(|s| s.label == SegmentLabel::Discarded)
            .collect();
        assert_eq!(discarded.len(), 3);
        assert!(discarded.iter().all(|s| s.text.trim() == "ACME HOUSE"));

        // The title line on page 0 survives
        assert!(segments
            .iter()
            .any(|s| s.page == 0 && s.is_kept() && s.text.contains("THE GREAT NOVEL")));
    }

    #[test]
    fn page_number_lines_discarded() {
        let input = pages(&["THE GREAT NOVEL\n42\nby Jane Doe\n"]);
        let segments = segment_pages(&input).unwrap();

        let labels: Vec<SegmentLabel> = segments.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            vec![
                SegmentLabel::FrontMatter,
                SegmentLabel::Discarded,
                SegmentLabel::FrontMatter,
            ]
        );
    }

    #[test]
    fn contiguous_kept_lines_form_one_segment() {
        let input = pages(&["THE GREAT NOVEL\n\nby Jane Doe\n"]);
        let segments = segment_pages(&input).unwrap();
        // Blank line is not boilerplate, so the whole page is one segment
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].label, SegmentLabel::FrontMatter);
    }

    // ── front matter ───────────────────────────────────────────────────

    #[test]
    fn first_three_pages_are_front_matter_by_default() {
        let input = pages(&["title page", "copyright page", "dedication", "four", "five"]);
        let segments = segment_pages(&input).unwrap();

        for seg in &segments {
            let expected = if seg.page < 3 {
                SegmentLabel::FrontMatter
            } else {
                SegmentLabel::Body
            };
            assert_eq!(seg.label, expected, "page {}", seg.page);
        }
    }

    #[test]
    fn dense_prose_ends_front_matter_early() {
        let input = pages(&["THE GREAT NOVEL\nby Jane Doe\n", &long_prose(), "more"]);
        let segments = segment_pages(&input).unwrap();

        assert!(segments
            .iter()
            .filter(|s| s.page == 0)
            .all(|s| s.label == SegmentLabel::FrontMatter));
        // Page 1 is dense prose, so it and everything after is body
        assert!(segments
            .iter()
            .filter(|s| s.page >= 1)
            .all(|s| s.label == SegmentLabel::Body));
    }

    #[test]
    fn front_matter_pages_configurable() {
        let config = SegmenterConfigBuilder::new()
            .front_matter_pages(1)
            .build()
            .unwrap();
        let input = pages(&["one", "two", "three"]);
        let segments = segment_pages_with_config(&input, &config).unwrap();

        assert!(segments
            .iter()
            .all(|s| (s.page == 0) == (s.label == SegmentLabel::FrontMatter)));
    }

    // ── empty documents ────────────────────────────────────────────────

    #[test]
    fn no_pages_is_empty() {
        assert!(matches!(
            segment_pages(&[]),
            Err(SegmentError::EmptyDocument)
        ));
    }

    #[test]
    fn whitespace_only_is_empty() {
        let input = pages(&["   \n\n", ""]);
        assert!(matches!(
            segment_pages(&input),
            Err(SegmentError::EmptyDocument)
        ));
    }

    #[test]
    fn footer_noise_only_is_empty() {
        // Discard-labeling removes everything, so the document is empty
        let input = pages(&["Page 1 of 2\n", "Page 2 of 2\n"]);
        assert!(matches!(
            segment_pages(&input),
            Err(SegmentError::EmptyDocument)
        ));
    }

    // ── prose density ──────────────────────────────────────────────────

    #[test]
    fn few_sentences_are_not_prose() {
        let config = SegmenterConfig::default();
        assert_eq!(prose_density("THE GREAT NOVEL. by Jane Doe.", &config), 0.0);
    }

    #[test]
    fn long_sentences_raise_density() {
        let config = SegmenterConfig::default();
        let density = prose_density(&long_prose(), &config);
        assert!(density > 0.9, "density was {}", density);
    }

    #[test]
    fn short_sentences_keep_density_low() {
        let config = SegmenterConfig::default();
        let text = "One two. Three four. Five six. Seven eight.";
        assert!(prose_density(text, &config) < 0.5);
    }
}
