pub mod cli;
pub mod config;
pub mod echodata;
pub mod error;
pub mod extractor;
pub mod scanner;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CalibrationStatus, CliOverrides, Config, InputFormat, OutputConfig};
pub use error::{EchoMetaError, Result, UserFriendlyError};

// Core functionality re-exports
pub use echodata::{
    BackendError, DatasetBackend, Dialect, EchoBackend, EncodeMode, JsonSource, WaveformMode,
};
pub use extractor::{
    ExtractionOutcome, ExtractionProgress, ExtractionSettings, MetadataExtractor, MetadataRow,
    OutputManager, RunReport,
};
pub use scanner::{RawFile, RawFileScanner};
pub use ui::{OutputFormatter, OutputMode, ProgressManager};

use log::info;
use std::cell::RefCell;
use std::path::Path;

/// Main library interface: scan, extract, write.
pub struct EchoMeta {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl EchoMeta {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            output_formatter,
            progress_manager,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Ok(Self::new(
            config,
            output_mode,
            cli_args.verbose,
            cli_args.quiet,
        ))
    }

    /// Run with the backend matching the configured input format.
    pub fn run(&self) -> Result<RunReport> {
        match self.config.input.format {
            InputFormat::Json => self.run_with_backend(DatasetBackend::new(JsonSource)),
            #[cfg(feature = "netcdf")]
            InputFormat::Netcdf => {
                self.run_with_backend(DatasetBackend::new(echodata::NetcdfSource))
            }
            #[cfg(not(feature = "netcdf"))]
            InputFormat::Netcdf => Err(EchoMetaError::BackendUnavailable {
                format: InputFormat::Netcdf.to_string(),
            }),
        }
    }

    /// Extract every input file, then write the table (and report).
    ///
    /// Nothing is written unless every file was processed.
    pub fn run_with_backend<B: EchoBackend>(&self, backend: B) -> Result<RunReport> {
        let files = self.scan_inputs()?;
        self.output_formatter.status(&format!(
            "Extracting {} metadata from {} acquisitions",
            self.config.survey.cruise_label,
            files.len()
        ));

        let output_manager = self.setup_output()?;

        let settings = ExtractionSettings::from(&self.config.survey);
        let extractor = MetadataExtractor::new(backend, settings);
        let outcome = self.extract_files(&extractor, &files)?;

        let rows_written = output_manager.write_table(&outcome.rows)?;
        info!(
            "wrote {} rows to {}",
            rows_written,
            output_manager.get_csv_path().display()
        );

        let report = output_manager.create_run_report(extractor.settings(), &outcome);
        if self.config.output.write_report {
            output_manager.save_report_json(&report)?;
            self.output_formatter.detail(&format!(
                "Run report: {}",
                output_manager.get_report_path().display()
            ));
        }

        Ok(report)
    }

    /// Files that a run would process, without reading them.
    pub fn plan(&self) -> Result<Vec<RawFile>> {
        self.scan_inputs()
    }

    fn scan_inputs(&self) -> Result<Vec<RawFile>> {
        let scanner = RawFileScanner::new(self.config.input.effective_pattern());
        let spinner = self
            .progress_manager
            .scan_spinner(&self.config.input.data_dir, scanner.pattern());
        let files = scanner.scan_directory(&self.config.input.data_dir);
        spinner.finish_and_clear();
        let files = files?;

        let stats = scanner.get_statistics(&files);
        self.output_formatter.detail(&stats.display_summary());

        Ok(files)
    }

    fn setup_output(&self) -> Result<OutputManager> {
        let manager = OutputManager::new(&self.config.output, &self.config.survey.cruise_label)?;
        manager.initialize()?;
        Ok(manager)
    }

    fn extract_files<B: EchoBackend>(
        &self,
        extractor: &MetadataExtractor<B>,
        files: &[RawFile],
    ) -> Result<ExtractionOutcome> {
        let total_bytes = files.iter().map(|f| f.size).sum();
        let bar = self.progress_manager.acquisition_bar(total_bytes);
        let last_seen = RefCell::new(ExtractionProgress::new(files.len(), total_bytes));
        let progress_callback = |progress: &ExtractionProgress| {
            ui::progress::track(&bar, progress);
            *last_seen.borrow_mut() = progress.clone();
        };

        let outcome = match extractor.extract_all(files, Some(&progress_callback)) {
            Ok(outcome) => outcome,
            Err(e) => {
                ui::progress::stop(&bar, &last_seen.borrow());
                return Err(e);
            }
        };

        info!(
            "extracted {} rows from {} files",
            outcome.rows.len(),
            outcome.progress.files_processed
        );
        ui::progress::finish(&bar, &outcome.progress);

        Ok(outcome)
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &EchoMetaError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
        netcdf: cfg!(feature = "netcdf"),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
    pub netcdf: bool,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "echometa {} ({}) built on {} for {}{}",
            self.version,
            self.git_hash,
            self.build_date,
            self.target,
            if self.netcdf { " [netcdf]" } else { "" }
        )
    }
}
