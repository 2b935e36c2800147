use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use bookly_core::config_file;
use bookly_core::{
    BookRecord, Catalog, DocumentOutcome, EntityModel, Fingerprint, HeuristicModel, IngestConfig,
    PageSource, ProgressEvent, RemoteModel, ScoringWeights, SegmenterConfigBuilder,
};
use bookly_pdf::PdfExtractSource;

mod output;

use output::ColorMode;

/// Bookly - Extract and catalog book metadata from PDF collections
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest PDF files into the catalog
    Ingest {
        /// PDF files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to the catalog database (created if missing)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Number of ingest workers
        #[arg(long)]
        workers: Option<usize>,

        /// Per-document model timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Base URL of a remote annotation model server
        #[arg(long)]
        model_url: Option<String>,

        /// Serialize model calls instead of annotating from all workers at once
        #[arg(long)]
        serial_model: bool,

        /// Number of leading pages treated as front matter
        #[arg(long)]
        front_matter: Option<usize>,

        /// Similarity above which an incoming record merges into an existing one
        #[arg(long)]
        merge_threshold: Option<f64>,

        /// Minimum confidence for a person to be listed as an author
        #[arg(long)]
        author_threshold: Option<f64>,

        /// Print the records produced by this run as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Suppress per-document progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Inspect or export a persisted catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Show configuration file locations and contents
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// List every record in the catalog
    List {
        /// Path to the catalog database
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one record by fingerprint (a unique prefix is enough)
    Show {
        /// Record fingerprint or unique prefix
        fingerprint: String,

        /// Path to the catalog database
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export every record as pretty JSON
    Export {
        /// Path to the catalog database
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the config file search paths
    Path,
    /// Print the merged configuration currently in effect
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Ingest {
            files,
            catalog,
            workers,
            timeout,
            model_url,
            serial_model,
            front_matter,
            merge_threshold,
            author_threshold,
            json,
            no_color,
            quiet,
        } => {
            ingest(
                files,
                catalog,
                workers,
                timeout,
                model_url,
                serial_model,
                front_matter,
                merge_threshold,
                author_threshold,
                json,
                no_color,
                quiet,
            )
            .await
        }
        Command::Catalog { command } => match command {
            CatalogCommand::List { catalog, json } => list_catalog(catalog, json),
            CatalogCommand::Show {
                fingerprint,
                catalog,
                json,
            } => show_record(&fingerprint, catalog, json),
            CatalogCommand::Export { catalog, output } => export_catalog(catalog, output),
        },
        Command::Config { command } => match command {
            ConfigCommand::Path => show_config_paths(),
            ConfigCommand::Show => show_config(),
        },
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
async fn ingest(
    files: Vec<PathBuf>,
    catalog: Option<PathBuf>,
    workers: Option<usize>,
    timeout: Option<u64>,
    model_url: Option<String>,
    serial_model: bool,
    front_matter: Option<usize>,
    merge_threshold: Option<f64>,
    author_threshold: Option<f64>,
    json: bool,
    no_color: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let file_config = config_file::load_config();
    let ingest_file = file_config.ingest.clone().unwrap_or_default();
    let scoring_file = file_config.scoring.clone().unwrap_or_default();
    let merge_file = file_config.merge.clone().unwrap_or_default();
    let seg_file = file_config.segmenter.clone().unwrap_or_default();
    let display_file = file_config.display.clone().unwrap_or_default();
    let defaults = IngestConfig::default();

    // Resolve configuration: CLI flags > env vars > config file > defaults
    let mut segmenter = SegmenterConfigBuilder::new();
    if let Some(n) = front_matter.or(seg_file.front_matter_pages) {
        segmenter = segmenter.front_matter_pages(n);
    }
    if let Some(t) = seg_file.prose_density_threshold {
        segmenter = segmenter.prose_density_threshold(t);
    }
    if let Some(n) = seg_file.long_sentence_words {
        segmenter = segmenter.long_sentence_words(n);
    }
    if let Some(n) = seg_file.min_sentences {
        segmenter = segmenter.min_sentences(n);
    }
    if let Some(r) = seg_file.repeat_ratio {
        segmenter = segmenter.repeat_ratio(r);
    }
    if let Some(n) = seg_file.max_repeat_line_chars {
        segmenter = segmenter.max_repeat_line_chars(n);
    }
    if let Some(patterns) = seg_file.page_number_patterns {
        segmenter = segmenter.set_page_number_patterns(patterns);
    }
    let segmenter = segmenter
        .build()
        .context("invalid page number pattern in configuration")?;

    let scoring = ScoringWeights {
        position: scoring_file
            .position_weight
            .unwrap_or(defaults.scoring.position),
        repetition: scoring_file
            .repetition_weight
            .unwrap_or(defaults.scoring.repetition),
        format: scoring_file
            .format_weight
            .unwrap_or(defaults.scoring.format),
    };

    let config = IngestConfig {
        num_workers: workers
            .or_else(|| {
                std::env::var("BOOKLY_WORKERS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .or(ingest_file.num_workers)
            .unwrap_or(defaults.num_workers),
        model_timeout: Duration::from_secs(
            timeout
                .or_else(|| {
                    std::env::var("BOOKLY_TIMEOUT")
                        .ok()
                        .and_then(|v| v.parse().ok())
                })
                .or(ingest_file.model_timeout_secs)
                .unwrap_or(defaults.model_timeout.as_secs()),
        ),
        serialize_model_calls: serial_model
            || ingest_file.serialize_model_calls.unwrap_or(false),
        author_threshold: author_threshold
            .or(scoring_file.author_threshold)
            .unwrap_or(defaults.author_threshold),
        title_floor: scoring_file.title_floor.unwrap_or(defaults.title_floor),
        merge_threshold: merge_threshold
            .or(merge_file.merge_threshold)
            .unwrap_or(defaults.merge_threshold),
        strong_title_threshold: merge_file
            .strong_title_threshold
            .unwrap_or(defaults.strong_title_threshold),
        scoring,
        segmenter,
    };

    let model_url = model_url
        .or_else(|| std::env::var("BOOKLY_MODEL_URL").ok())
        .or(ingest_file.model_url);

    let catalog_path = catalog
        .or_else(|| std::env::var("BOOKLY_CATALOG").ok().map(PathBuf::from))
        .or_else(|| {
            file_config
                .catalog
                .as_ref()
                .and_then(|c| c.path.clone())
                .map(PathBuf::from)
        });

    let catalog = match &catalog_path {
        Some(path) => Catalog::open(path)
            .with_context(|| format!("failed to open catalog at {}", path.display()))?,
        None => Catalog::in_memory(),
    };
    let catalog = Arc::new(catalog);

    let model: Arc<dyn EntityModel> = match &model_url {
        Some(url) => Arc::new(RemoteModel::new(url.clone())),
        None => Arc::new(HeuristicModel::new()),
    };
    let backend: Arc<dyn PageSource> = Arc::new(PdfExtractSource::new());

    let color = ColorMode(!no_color && display_file.color.unwrap_or(true));
    let show_bar = !quiet && display_file.progress_bar.unwrap_or(true);

    let bar = if show_bar {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };

    let progress_bar = bar.clone();
    let progress_color = color;
    let progress_quiet = quiet;
    let progress_cb = move |event: ProgressEvent| {
        if !progress_quiet {
            let line = output::render_progress(&event, progress_color);
            if progress_bar.is_hidden() {
                eprintln!("{}", line);
            } else {
                progress_bar.println(line);
            }
        }
        match &event {
            ProgressEvent::Ingesting { source, .. } => {
                progress_bar.set_message(output::truncate(source, 40));
            }
            ProgressEvent::DocumentDone { .. } | ProgressEvent::Skipped { .. } => {
                progress_bar.inc(1);
            }
            ProgressEvent::Warning { .. } => {}
        }
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let result = bookly_core::ingest_paths(
        &files,
        backend,
        model,
        Arc::clone(&catalog),
        config,
        progress_cb,
        cancel,
    )
    .await;

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            bar.finish_and_clear();
            return Err(err.into());
        }
    };
    bar.finish_and_clear();

    if json {
        let mut seen = BTreeSet::new();
        let mut records = Vec::new();
        for report in &summary.documents {
            if let DocumentOutcome::Cataloged { fingerprint, .. } = &report.outcome
                && seen.insert(fingerprint.clone())
                && let Some(record) = catalog.get(fingerprint)
            {
                records.push(record);
            }
        }
        println!("{}", serde_json::to_string_pretty(&records)?);
    }

    let mut writer: Box<dyn Write> = if json {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };
    output::print_run_summary(&mut writer, &summary, color)?;

    if let Some(ref path) = catalog_path {
        writeln!(
            writer,
            "Catalog: {} ({} records)",
            path.display(),
            catalog.len()
        )?;
    } else if !json {
        use owo_colors::OwoColorize;
        let note = "Records were not persisted; pass --catalog <path> to keep them.";
        if color.enabled() {
            writeln!(writer, "{}", note.yellow())?;
        } else {
            writeln!(writer, "{}", note)?;
        }
    }

    Ok(())
}

/// Resolve the catalog path (flag > env > config file) and open it,
/// refusing to create a new database on inspection commands.
fn open_existing_catalog(flag: Option<PathBuf>) -> anyhow::Result<(PathBuf, Catalog)> {
    let file_config = config_file::load_config();
    let path = flag
        .or_else(|| std::env::var("BOOKLY_CATALOG").ok().map(PathBuf::from))
        .or_else(|| {
            file_config
                .catalog
                .as_ref()
                .and_then(|c| c.path.clone())
                .map(PathBuf::from)
        });

    let Some(path) = path else {
        anyhow::bail!(
            "No catalog configured. Pass --catalog <path> or set [catalog] path in the config file"
        );
    };
    if !path.exists() {
        anyhow::bail!(
            "Catalog not found at {}. Create one with: bookly ingest --catalog {} <files>",
            path.display(),
            path.display()
        );
    }

    let catalog = Catalog::open(&path)
        .with_context(|| format!("failed to open catalog at {}", path.display()))?;
    Ok((path, catalog))
}

fn display_color() -> ColorMode {
    ColorMode(
        config_file::load_config()
            .display
            .and_then(|d| d.color)
            .unwrap_or(true),
    )
}

fn list_catalog(catalog: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let (_, catalog) = open_existing_catalog(catalog)?;
    let entries = catalog.entries();

    if json {
        let values: Vec<serde_json::Value> = entries
            .iter()
            .map(|(fp, record)| {
                serde_json::json!({ "fingerprint": fp.as_str(), "record": record })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    output::print_record_list(&mut std::io::stdout(), &entries, display_color())?;
    Ok(())
}

fn show_record(fingerprint: &str, catalog: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let (_, catalog) = open_existing_catalog(catalog)?;
    let entries = catalog.entries();
    let matches: Vec<&(Fingerprint, BookRecord)> = entries
        .iter()
        .filter(|(fp, _)| fp.as_str().starts_with(fingerprint))
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("No record matching '{}'", fingerprint),
        [(fp, record)] => {
            if json {
                let value = serde_json::json!({ "fingerprint": fp.as_str(), "record": record });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                output::print_record(&mut std::io::stdout(), fp, record, display_color())?;
            }
            Ok(())
        }
        many => anyhow::bail!(
            "Fingerprint prefix '{}' is ambiguous ({} matches)",
            fingerprint,
            many.len()
        ),
    }
}

fn export_catalog(catalog: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let (path, catalog) = open_existing_catalog(catalog)?;
    let records = catalog.records();
    let json = serde_json::to_string_pretty(&records)?;

    match output {
        Some(ref out) => {
            std::fs::write(out, format!("{}\n", json))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Exported {} records from {} to {}",
                records.len(),
                path.display(),
                out.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn show_config_paths() -> anyhow::Result<()> {
    let cwd = PathBuf::from(".bookly.toml");
    if cwd.exists() {
        println!("{} (active, overrides the platform config)", cwd.display());
    }
    match config_file::config_path() {
        Some(path) => {
            if path.exists() {
                println!("{}", path.display());
            } else {
                println!("{} (not present)", path.display());
            }
        }
        None => println!("No platform configuration directory on this system"),
    }
    Ok(())
}

fn show_config() -> anyhow::Result<()> {
    let config = config_file::load_config();
    let rendered = toml::to_string_pretty(&config).context("failed to render configuration")?;
    if rendered.trim().is_empty() {
        println!("No configuration set; defaults are in effect.");
    } else {
        print!("{}", rendered);
    }
    Ok(())
}
