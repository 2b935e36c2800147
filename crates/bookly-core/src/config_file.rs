use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub ingest: Option<IngestSection>,
    pub scoring: Option<ScoringSection>,
    pub merge: Option<MergeSection>,
    pub segmenter: Option<SegmenterSection>,
    pub catalog: Option<CatalogSection>,
    pub display: Option<DisplaySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSection {
    pub num_workers: Option<usize>,
    pub model_timeout_secs: Option<u64>,
    pub serialize_model_calls: Option<bool>,
    pub model_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringSection {
    pub position_weight: Option<f64>,
    pub repetition_weight: Option<f64>,
    pub format_weight: Option<f64>,
    pub author_threshold: Option<f64>,
    pub title_floor: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeSection {
    pub merge_threshold: Option<f64>,
    pub strong_title_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmenterSection {
    pub front_matter_pages: Option<usize>,
    pub prose_density_threshold: Option<f64>,
    pub long_sentence_words: Option<usize>,
    pub min_sentences: Option<usize>,
    pub repeat_ratio: Option<f64>,
    pub max_repeat_line_chars: Option<usize>,
    pub page_number_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplaySection {
    pub color: Option<bool>,
    pub progress_bar: Option<bool>,
}

/// Platform config directory path: `<config_dir>/bookly/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bookly").join("config.toml"))
}

/// Load config by cascading CWD `.bookly.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".bookly.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        ingest: Some(IngestSection {
            num_workers: overlay
                .ingest
                .as_ref()
                .and_then(|i| i.num_workers)
                .or_else(|| base.ingest.as_ref().and_then(|i| i.num_workers)),
            model_timeout_secs: overlay
                .ingest
                .as_ref()
                .and_then(|i| i.model_timeout_secs)
                .or_else(|| base.ingest.as_ref().and_then(|i| i.model_timeout_secs)),
            serialize_model_calls: overlay
                .ingest
                .as_ref()
                .and_then(|i| i.serialize_model_calls)
                .or_else(|| base.ingest.as_ref().and_then(|i| i.serialize_model_calls)),
            model_url: overlay
                .ingest
                .as_ref()
                .and_then(|i| i.model_url.clone())
                .or_else(|| base.ingest.as_ref().and_then(|i| i.model_url.clone())),
        }),
        scoring: Some(ScoringSection {
            position_weight: overlay
                .scoring
                .as_ref()
                .and_then(|s| s.position_weight)
                .or_else(|| base.scoring.as_ref().and_then(|s| s.position_weight)),
            repetition_weight: overlay
                .scoring
                .as_ref()
                .and_then(|s| s.repetition_weight)
                .or_else(|| base.scoring.as_ref().and_then(|s| s.repetition_weight)),
            format_weight: overlay
                .scoring
                .as_ref()
                .and_then(|s| s.format_weight)
                .or_else(|| base.scoring.as_ref().and_then(|s| s.format_weight)),
            author_threshold: overlay
                .scoring
                .as_ref()
                .and_then(|s| s.author_threshold)
                .or_else(|| base.scoring.as_ref().and_then(|s| s.author_threshold)),
            title_floor: overlay
                .scoring
                .as_ref()
                .and_then(|s| s.title_floor)
                .or_else(|| base.scoring.as_ref().and_then(|s| s.title_floor)),
        }),
        merge: Some(MergeSection {
            merge_threshold: overlay
                .merge
                .as_ref()
                .and_then(|m| m.merge_threshold)
                .or_else(|| base.merge.as_ref().and_then(|m| m.merge_threshold)),
            strong_title_threshold: overlay
                .merge
                .as_ref()
                .and_then(|m| m.strong_title_threshold)
                .or_else(|| base.merge.as_ref().and_then(|m| m.strong_title_threshold)),
        }),
        segmenter: Some(SegmenterSection {
            front_matter_pages: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.front_matter_pages)
                .or_else(|| base.segmenter.as_ref().and_then(|s| s.front_matter_pages)),
            prose_density_threshold: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.prose_density_threshold)
                .or_else(|| {
                    base.segmenter
                        .as_ref()
                        .and_then(|s| s.prose_density_threshold)
                }),
            long_sentence_words: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.long_sentence_words)
                .or_else(|| base.segmenter.as_ref().and_then(|s| s.long_sentence_words)),
            min_sentences: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.min_sentences)
                .or_else(|| base.segmenter.as_ref().and_then(|s| s.min_sentences)),
            repeat_ratio: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.repeat_ratio)
                .or_else(|| base.segmenter.as_ref().and_then(|s| s.repeat_ratio)),
            max_repeat_line_chars: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.max_repeat_line_chars)
                .or_else(|| {
                    base.segmenter
                        .as_ref()
                        .and_then(|s| s.max_repeat_line_chars)
                }),
            page_number_patterns: overlay
                .segmenter
                .as_ref()
                .and_then(|s| s.page_number_patterns.clone())
                .or_else(|| {
                    base.segmenter
                        .as_ref()
                        .and_then(|s| s.page_number_patterns.clone())
                }),
        }),
        catalog: Some(CatalogSection {
            path: overlay
                .catalog
                .as_ref()
                .and_then(|c| c.path.clone())
                .or_else(|| base.catalog.as_ref().and_then(|c| c.path.clone())),
        }),
        display: Some(DisplaySection {
            color: overlay
                .display
                .as_ref()
                .and_then(|d| d.color)
                .or_else(|| base.display.as_ref().and_then(|d| d.color)),
            progress_bar: overlay
                .display
                .as_ref()
                .and_then(|d| d.progress_bar)
                .or_else(|| base.display.as_ref().and_then(|d| d.progress_bar)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_path_round_trip_toml() {
        let config = ConfigFile {
            catalog: Some(CatalogSection {
                path: Some("/tmp/test_catalog.db".to_string()),
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.catalog.unwrap().path.unwrap(),
            "/tmp/test_catalog.db"
        );
    }

    #[test]
    fn absent_fields_deserialize_as_none() {
        let toml_str = "[ingest]\nnum_workers = 8\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let ingest = parsed.ingest.unwrap();
        assert_eq!(ingest.num_workers, Some(8));
        assert!(ingest.model_timeout_secs.is_none());
        assert!(parsed.catalog.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            ingest: Some(IngestSection {
                num_workers: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            ingest: Some(IngestSection {
                num_workers: Some(8),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        assert_eq!(merged.ingest.unwrap().num_workers, Some(8));
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            merge: Some(MergeSection {
                merge_threshold: Some(0.9),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile::default();
        let merged = merge(base, overlay);
        assert_eq!(merged.merge.unwrap().merge_threshold, Some(0.9));
    }

    #[test]
    fn segmenter_patterns_survive_the_merge() {
        let base = ConfigFile {
            segmenter: Some(SegmenterSection {
                page_number_patterns: Some(vec![r"^\d+$".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert_eq!(
            merged.segmenter.unwrap().page_number_patterns,
            Some(vec![r"^\d+$".to_string()])
        );
    }
}
