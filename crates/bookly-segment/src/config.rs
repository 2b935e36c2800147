use regex::Regex;

/// Controls how a list of patterns is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Configuration for page segmentation.
///
/// Regex overrides are supplied as strings through
/// [`SegmenterConfigBuilder`] and compiled in [`build()`](SegmenterConfigBuilder::build).
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    // ── front matter ──
    /// Number of leading pages treated as front matter unless prose
    /// density ends it earlier (default: 3).
    pub(crate) front_matter_pages: usize,
    /// A page whose long-sentence ratio reaches this threshold is body
    /// text, as is every later page (default: 0.5).
    pub(crate) prose_density_threshold: f64,
    /// Word count at which a sentence counts as "long" (default: 15).
    pub(crate) long_sentence_words: usize,
    /// Minimum sentences on a page before density is meaningful (default: 3).
    pub(crate) min_sentences: usize,

    // ── boilerplate ──
    /// A line repeating on at least this fraction of pages is discarded
    /// (default: 0.4, never fewer than 2 pages).
    pub(crate) repeat_ratio: f64,
    /// Lines longer than this never count as repeated boilerplate
    /// (default: 80). Headers and footers are short.
    pub(crate) max_repeat_line_chars: usize,
    /// Patterns for standalone page-number lines, always discarded.
    pub(crate) page_number_patterns: ListOverride<Regex>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            front_matter_pages: 3,
            prose_density_threshold: 0.5,
            long_sentence_words: 15,
            min_sentences: 3,
            repeat_ratio: 0.4,
            max_repeat_line_chars: 80,
            page_number_patterns: ListOverride::Default,
        }
    }
}

impl SegmenterConfig {
    /// Number of leading pages treated as front matter.
    pub fn front_matter_pages(&self) -> usize {
        self.front_matter_pages
    }

    /// Fraction of pages a line must repeat on to be discarded.
    pub fn repeat_ratio(&self) -> f64 {
        self.repeat_ratio
    }
}

/// Builder for [`SegmenterConfig`].
///
/// Accepts string patterns that are compiled to `Regex` in
/// [`build()`](Self::build). Fails fast with `regex::Error` if any
/// pattern is invalid.
#[derive(Debug, Clone, Default)]
pub struct SegmenterConfigBuilder {
    front_matter_pages: Option<usize>,
    prose_density_threshold: Option<f64>,
    long_sentence_words: Option<usize>,
    min_sentences: Option<usize>,
    repeat_ratio: Option<f64>,
    max_repeat_line_chars: Option<usize>,
    page_number_patterns: PatternListBuilder,
}

/// Helper for building `ListOverride<Regex>` from string patterns.
#[derive(Debug, Clone, Default)]
enum PatternListBuilder {
    #[default]
    Default,
    Replace(Vec<String>),
    Extend(Vec<String>),
}

impl SegmenterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn front_matter_pages(mut self, n: usize) -> Self {
        self.front_matter_pages = Some(n);
        self
    }

    pub fn prose_density_threshold(mut self, threshold: f64) -> Self {
        self.prose_density_threshold = Some(threshold);
        self
    }

    pub fn long_sentence_words(mut self, n: usize) -> Self {
        self.long_sentence_words = Some(n);
        self
    }

    pub fn min_sentences(mut self, n: usize) -> Self {
        self.min_sentences = Some(n);
        self
    }

    pub fn repeat_ratio(mut self, ratio: f64) -> Self {
        self.repeat_ratio = Some(ratio);
        self
    }

    pub fn max_repeat_line_chars(mut self, n: usize) -> Self {
        self.max_repeat_line_chars = Some(n);
        self
    }

    pub fn set_page_number_patterns(mut self, patterns: Vec<String>) -> Self {
        self.page_number_patterns = PatternListBuilder::Replace(patterns);
        self
    }

    pub fn add_page_number_pattern(mut self, pattern: String) -> Self {
        match &mut self.page_number_patterns {
            PatternListBuilder::Extend(v) => v.push(pattern),
            _ => self.page_number_patterns = PatternListBuilder::Extend(vec![pattern]),
        }
        self
    }

    /// Compile all string patterns into regexes and produce a [`SegmenterConfig`].
    pub fn build(self) -> Result<SegmenterConfig, regex::Error> {
        let page_number_patterns = match self.page_number_patterns {
            PatternListBuilder::Default => ListOverride::Default,
            PatternListBuilder::Replace(patterns) => {
                let regexes: Result<Vec<_>, _> = patterns.iter().map(|p| Regex::new(p)).collect();
                ListOverride::Replace(regexes?)
            }
            PatternListBuilder::Extend(patterns) => {
                let regexes: Result<Vec<_>, _> = patterns.iter().map(|p| Regex::new(p)).collect();
                ListOverride::Extend(regexes?)
            }
        };

        Ok(SegmenterConfig {
            front_matter_pages: self.front_matter_pages.unwrap_or(3),
            prose_density_threshold: self.prose_density_threshold.unwrap_or(0.5),
            long_sentence_words: self.long_sentence_words.unwrap_or(15),
            min_sentences: self.min_sentences.unwrap_or(3),
            repeat_ratio: self.repeat_ratio.unwrap_or(0.4),
            max_repeat_line_chars: self.max_repeat_line_chars.unwrap_or(80),
            page_number_patterns,
        })
    }
}
