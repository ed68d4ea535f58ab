use crate::error::{EchoMetaError, UserFriendlyError};
use crate::extractor::{ExtractionTrace, RunReport};
use crate::scanner::{format_bytes, RawFile};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use serde_json::json;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static WAVE: Emoji = Emoji("🌊 ", "");
static CROSS: Emoji = Emoji("❌ ", "error: ");
static WARN: Emoji = Emoji("⚠️  ", "warning: ");

/// Writes run results for people (human), scripts (plain) or tools (json).
///
/// In json mode stdout carries exactly one document: the run report or the
/// dry-run listing. Everything else goes to stderr or is dropped.
pub struct OutputFormatter {
    mode: OutputMode,
    colors: bool,
    verbose: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let colors = mode == OutputMode::Human
            && !quiet
            && Term::stdout().features().colors_supported();

        Self {
            mode,
            colors,
            verbose: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn status(&self, message: &str) {
        if self.quiet || self.mode == OutputMode::Json {
            return;
        }

        if self.colors {
            println!("{}{}", WAVE, style(message).bold());
        } else {
            println!("{}", message);
        }
    }

    /// Shown only with -v.
    pub fn detail(&self, message: &str) {
        if self.verbose == 0 || self.mode == OutputMode::Json {
            return;
        }

        for line in message.lines() {
            if self.colors {
                println!("  {}", style(line).dim());
            } else {
                println!("  {}", line);
            }
        }
    }

    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.colors {
            eprintln!("{}{}", WARN, style(message).yellow());
        } else {
            eprintln!("warning: {}", message);
        }
    }

    pub fn print_user_friendly_error(&self, error: &EchoMetaError) {
        let message = error.user_message();
        let suggestion = error.suggestion();

        match self.mode {
            OutputMode::Json => {
                let document = json!({ "error": message, "suggestion": suggestion });
                eprintln!("{}", document);
            }
            _ => {
                if self.colors {
                    eprintln!("{}{}", CROSS, style(&message).red().bold());
                } else {
                    eprintln!("error: {}", message);
                }
                if let Some(suggestion) = suggestion {
                    eprintln!("  {}", suggestion);
                }
            }
        }
    }

    pub fn print_dry_run(&self, files: &[RawFile], output: &Path) {
        match self.mode {
            OutputMode::Json => {
                let listing: Vec<_> = files
                    .iter()
                    .map(|f| json!({ "file": f.filename, "bytes": f.size }))
                    .collect();
                println!(
                    "{}",
                    json!({ "dry_run": true, "files": listing, "output_file": output.display().to_string() })
                );
            }
            OutputMode::Plain => {
                for file in files {
                    println!("file {} {}", file.filename, file.size);
                }
                println!("output {}", output.display());
            }
            OutputMode::Human => {
                let total: u64 = files.iter().map(|f| f.size).sum();
                self.status(&format!(
                    "Would read {} acquisitions ({}) into {}",
                    files.len(),
                    format_bytes(total),
                    output.display()
                ));
                for file in files {
                    println!("  {:<40} {:>10}", file.filename, file.format_size());
                }
            }
        }
    }

    pub fn print_run_report(&self, report: &RunReport) {
        match self.mode {
            OutputMode::Json => match serde_json::to_string_pretty(report) {
                Ok(document) => println!("{}", document),
                Err(e) => eprintln!("error: cannot serialize run report: {}", e),
            },
            _ if self.quiet => {}
            OutputMode::Plain => {
                for line in plain_report(report) {
                    println!("{}", line);
                }
            }
            OutputMode::Human => self.print_human_report(report),
        }
    }

    fn print_human_report(&self, report: &RunReport) {
        let summary = &report.summary;
        self.status(&format!(
            "{}: {} rows from {} acquisitions ({}) in {}",
            report.cruise_label,
            summary.rows_written,
            summary.files_processed,
            format_bytes(summary.bytes_processed),
            format_duration(summary.duration)
        ));

        let width = report
            .files
            .iter()
            .map(|t| t.file.len())
            .max()
            .unwrap_or(0)
            .max("file".len());

        let header = trace_header(width);
        if self.colors {
            println!("  {}", style(header).dim());
        } else {
            println!("  {}", header);
        }
        for trace in &report.files {
            println!("  {}", trace_line(trace, width));
        }

        println!("Table:       {}", report.output_file);
        println!("Calibration: {}", report.calibration);
    }
}

fn trace_header(width: usize) -> String {
    format!(
        "{:<width$}  {:<7} {:<8} {:<11} {:<12} {:<14} {:>5}",
        "file", "dialect", "encoding", "beamwidths", "environment", "navigation", "rows",
    )
}

/// One aligned line per acquisition: which variant each fallback chose.
fn trace_line(trace: &ExtractionTrace, width: usize) -> String {
    let navigation = format!(
        "{} x{} w{}",
        trace.sentence_type, trace.fix_count, trace.window
    );
    format!(
        "{:<width$}  {:<7} {:<8} {:<11} {:<12} {:<14} {:>5}",
        trace.file,
        trace.dialect.to_string(),
        trace.encode_mode.to_string(),
        trace.beamwidth_source.label(),
        trace.environment_layout.label(),
        navigation,
        trace.rows,
    )
}

/// `key=value` records, one per line, for shell pipelines.
fn plain_report(report: &RunReport) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![format!(
        "run cruise={} calibration={} ref_ping={} files={} rows={} bytes={} millis={} output={}",
        report.cruise_label,
        report.calibration,
        report.reference_ping,
        summary.files_processed,
        summary.rows_written,
        summary.bytes_processed,
        summary.duration.as_millis(),
        report.output_file
    )];

    lines.extend(report.files.iter().map(|t| {
        format!(
            "file name={} dialect={} encoding={} beamwidths={:?} environment={:?} sentence={} fixes={} window={} rows={}",
            t.file,
            t.dialect,
            t.encode_mode,
            t.beamwidth_source,
            t.environment_layout,
            t.sentence_type,
            t.fix_count,
            t.window,
            t.rows
        )
    }));
    lines
}
