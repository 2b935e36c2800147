use std::io::Write;

use bookly_core::{BookRecord, DocumentOutcome, Fingerprint, ProgressEvent, RunSummary};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Render one progress event as a display line.
pub fn render_progress(event: &ProgressEvent, color: ColorMode) -> String {
    match event {
        ProgressEvent::Ingesting {
            doc_index,
            total,
            source,
        } => {
            format!(
                "[{}/{}] Ingesting: {}",
                doc_index + 1,
                total,
                truncate(source, 60)
            )
        }
        ProgressEvent::DocumentDone {
            doc_index,
            total,
            fingerprint,
            merged,
            low_confidence,
            ..
        } => {
            let idx = doc_index + 1;
            let disposition = if *merged { "merged" } else { "new" };
            let fp = truncate(fingerprint.as_str(), 40);
            let mut line = if color.enabled() {
                format!(
                    "[{}/{}] -> {} ({}) {}",
                    idx,
                    total,
                    "CATALOGED".green(),
                    disposition,
                    fp.dimmed()
                )
            } else {
                format!("[{}/{}] -> CATALOGED ({}) {}", idx, total, disposition, fp)
            };
            if *low_confidence {
                if color.enabled() {
                    line.push_str(&format!(" {}", "[low confidence]".yellow()));
                } else {
                    line.push_str(" [low confidence]");
                }
            }
            line
        }
        ProgressEvent::Skipped {
            doc_index,
            total,
            reason,
            ..
        } => {
            let idx = doc_index + 1;
            if color.enabled() {
                format!("[{}/{}] -> {} ({})", idx, total, "SKIPPED".yellow(), reason)
            } else {
                format!("[{}/{}] -> SKIPPED ({})", idx, total, reason)
            }
        }
        ProgressEvent::Warning { source, message } => {
            if color.enabled() {
                format!("{} {}: {}", "WARNING:".yellow(), source, message)
            } else {
                format!("WARNING: {}: {}", source, message)
            }
        }
    }
}

/// Print the final run summary, listing every skipped file with its reason.
pub fn print_run_summary(
    w: &mut dyn Write,
    summary: &RunSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = &summary.stats;

    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "RUN SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "RUN SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Documents presented: {}", stats.total)?;
    if color.enabled() {
        writeln!(
            w,
            "  {} {} ({} new, {} merged)",
            "Cataloged:".green(),
            stats.cataloged,
            stats.inserted,
            stats.merged
        )?;
    } else {
        writeln!(
            w,
            "  Cataloged: {} ({} new, {} merged)",
            stats.cataloged, stats.inserted, stats.merged
        )?;
    }
    if stats.low_confidence > 0 {
        if color.enabled() {
            writeln!(
                w,
                "  {} {}",
                "Low confidence:".yellow(),
                stats.low_confidence
            )?;
        } else {
            writeln!(w, "  Low confidence: {}", stats.low_confidence)?;
        }
    }

    if stats.skipped > 0 {
        writeln!(w, "  Skipped: {}", stats.skipped)?;
        for report in &summary.documents {
            if let DocumentOutcome::Skipped { reason } = &report.outcome {
                let line = format!("    - {}: {}", report.source, reason);
                if color.enabled() {
                    writeln!(w, "{}", line.dimmed())?;
                } else {
                    writeln!(w, "{}", line)?;
                }
            }
        }
    }

    writeln!(w)?;
    Ok(())
}

/// Print one record in detail.
pub fn print_record(
    w: &mut dyn Write,
    fingerprint: &Fingerprint,
    record: &BookRecord,
    color: ColorMode,
) -> std::io::Result<()> {
    let title = if record.title.is_empty() {
        "(untitled)"
    } else {
        record.title.as_str()
    };
    if color.enabled() {
        writeln!(w, "{}", "Title:".bold())?;
        writeln!(w, "  {}", title.cyan())?;
    } else {
        writeln!(w, "Title:")?;
        writeln!(w, "  {}", title)?;
    }

    if let Some(ref subtitle) = record.subtitle {
        if color.enabled() {
            writeln!(w, "{}", "Subtitle:".bold())?;
        } else {
            writeln!(w, "Subtitle:")?;
        }
        writeln!(w, "  {}", subtitle)?;
    }

    if color.enabled() {
        writeln!(w, "{}", "Authors:".bold())?;
    } else {
        writeln!(w, "Authors:")?;
    }
    if record.authors.is_empty() {
        if color.enabled() {
            writeln!(w, "  {}", "(none)".dimmed())?;
        } else {
            writeln!(w, "  (none)")?;
        }
    } else {
        for author in &record.authors {
            writeln!(w, "  • {}", author)?;
        }
    }

    let confidence = format!("{:.2}", record.confidence);
    if record.low_confidence {
        if color.enabled() {
            writeln!(
                w,
                "Confidence: {} {}",
                confidence,
                "(low)".yellow()
            )?;
        } else {
            writeln!(w, "Confidence: {} (low)", confidence)?;
        }
    } else {
        writeln!(w, "Confidence: {}", confidence)?;
    }

    writeln!(w, "Source: {}", record.source)?;
    writeln!(w, "Fingerprint: {}", fingerprint)?;

    writeln!(w, "Documents: {}", record.provenance.len())?;
    for p in &record.provenance {
        let line = format!(
            "  - {} at {}",
            truncate(&p.document_id, 12),
            p.extracted_at.format("%Y-%m-%d %H:%M UTC")
        );
        if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }

    Ok(())
}

/// Print a one-entry-per-record listing of the whole catalog.
pub fn print_record_list(
    w: &mut dyn Write,
    entries: &[(Fingerprint, BookRecord)],
    color: ColorMode,
) -> std::io::Result<()> {
    if entries.is_empty() {
        writeln!(w, "Catalog is empty.")?;
        return Ok(());
    }

    writeln!(w, "{} records", entries.len())?;
    writeln!(w)?;

    for (fingerprint, record) in entries {
        let title = if record.title.is_empty() {
            "(untitled)"
        } else {
            record.title.as_str()
        };
        let authors = if record.authors.is_empty() {
            "(no authors)".to_string()
        } else {
            record.authors.join("; ")
        };
        if color.enabled() {
            writeln!(w, "  {}", truncate(fingerprint.as_str(), 60).dimmed())?;
            writeln!(
                w,
                "    {} - {} [{} documents]",
                title.cyan(),
                authors,
                record.provenance.len()
            )?;
        } else {
            writeln!(w, "  {}", truncate(fingerprint.as_str(), 60))?;
            writeln!(
                w,
                "    {} - {} [{} documents]",
                title,
                authors,
                record.provenance.len()
            )?;
        }
    }

    Ok(())
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
