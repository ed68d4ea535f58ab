use crate::config::{CalibrationStatus, OutputConfig};
use crate::error::{EchoMetaError, Result};
use crate::extractor::metadata_extractor::{ExtractionOutcome, ExtractionSettings, ExtractionTrace};
use crate::extractor::metadata_row::{FieldFormat, MetadataRow, COLUMNS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Machine-readable account of a run, written next to the table.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub cruise_label: String,
    pub calibration: CalibrationStatus,
    pub reference_ping: usize,
    pub output_file: String,
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub files: Vec<ExtractionTrace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    pub rows_written: usize,
    pub bytes_processed: u64,
    pub duration: Duration,
}

pub struct OutputManager {
    output_directory: PathBuf,
    csv_path: PathBuf,
    report_path: PathBuf,
    format: FieldFormat,
    force_overwrite: bool,
}

impl OutputManager {
    pub fn new(output: &OutputConfig, cruise_label: &str) -> Result<Self> {
        let manager = Self {
            output_directory: output.directory.clone(),
            csv_path: output.csv_path(cruise_label),
            report_path: output.report_path(cruise_label),
            format: FieldFormat::from(output),
            force_overwrite: output.force_overwrite,
        };

        manager.validate_paths()?;
        Ok(manager)
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    /// Refuse to clobber an existing table unless forced.
    pub fn initialize(&self) -> Result<()> {
        if self.csv_path.exists() && !self.force_overwrite {
            return Err(EchoMetaError::OutputExists {
                path: self.csv_path.display().to_string(),
            });
        }

        fs::create_dir_all(&self.output_directory)?;
        Ok(())
    }

    pub fn get_csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn get_report_path(&self) -> &Path {
        &self.report_path
    }

    /// Write the header and one record per row. Returns the number of rows.
    pub fn write_table(&self, rows: &[MetadataRow]) -> Result<usize> {
        let mut writer = csv::Writer::from_path(&self.csv_path)?;

        writer.write_record(COLUMNS)?;
        for row in rows {
            writer.write_record(row.to_record(&self.format))?;
        }
        writer.flush()?;

        Ok(rows.len())
    }

    pub fn create_run_report(
        &self,
        settings: &ExtractionSettings,
        outcome: &ExtractionOutcome,
    ) -> RunReport {
        RunReport {
            cruise_label: settings.cruise_label.clone(),
            calibration: settings.calibration,
            reference_ping: settings.reference_ping,
            output_file: self.csv_path.display().to_string(),
            generated_at: Utc::now(),
            summary: RunSummary {
                files_processed: outcome.progress.files_processed,
                rows_written: outcome.rows.len(),
                bytes_processed: outcome.progress.bytes_processed,
                duration: outcome.progress.elapsed(),
            },
            files: outcome.traces.clone(),
        }
    }

    pub fn save_report_json(&self, report: &RunReport) -> Result<()> {
        let json_content = serde_json::to_string_pretty(report)?;
        fs::write(&self.report_path, json_content)?;
        Ok(())
    }

    fn validate_paths(&self) -> Result<()> {
        if self.output_directory.exists() && !self.output_directory.is_dir() {
            return Err(EchoMetaError::InvalidPath {
                path: format!(
                    "Output location is not a directory: {}",
                    self.output_directory.display()
                ),
            });
        }
        Ok(())
    }
}
