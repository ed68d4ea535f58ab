use crate::config::{CalibrationStatus, CliOverrides, Config, InputFormat};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "echometa")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract PANGAEA metadata from EK60/EK80 echosounder data")]
#[command(
    long_about = "echometa reads converted EK60/EK80 acquisitions, collects calibration, \
                  instrument and navigation metadata for every channel and writes one \
                  PANGAEA-style CSV table per cruise."
)]
#[command(before_help = "🌊 echometa - Echosounder Metadata Extraction")]
#[command(after_help = "EXAMPLES:\n  \
    echometa ./converted --cruise JR16003 --calibration yes\n  \
    echometa ./converted --pattern 'D2018*.json' --ref-ping 10 -o exports\n  \
    echometa ./netcdf --format netcdf --cruise DY090 --force\n  \
    echometa --config survey.toml --dry-run")]
pub struct Cli {
    /// Directory holding the converted acquisitions (defaults to config or ".")
    pub data_dir: Option<PathBuf>,

    /// Cruise label, used for the Event column and the output file name
    #[arg(long = "cruise", value_parser = validate_cruise_label)]
    pub cruise_label: Option<String>,

    /// Whether the echosounder was calibrated
    #[arg(long, value_enum)]
    pub calibration: Option<CalibrationStatus>,

    /// Ping index at which per-ping parameters are sampled
    #[arg(long = "ref-ping")]
    pub reference_ping: Option<usize>,

    /// Glob pattern selecting input files (defaults by format)
    #[arg(short, long, value_parser = validate_pattern)]
    pub pattern: Option<String>,

    /// On-disk format of the converted acquisitions
    #[arg(long, value_enum)]
    pub format: Option<InputFormat>,

    /// Directory receiving the CSV table and run report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Overwrite an existing metadata table
    #[arg(long, help = "Overwrite an existing metadata table")]
    pub force: bool,

    /// List the files that would be processed without reading them
    #[arg(long, help = "Show what would be extracted without actually doing it")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_cruise_label(self.cruise_label.clone())
            .with_calibration(self.calibration)
            .with_reference_ping(self.reference_ping)
            .with_data_dir(self.data_dir.clone())
            .with_format(self.format)
            .with_pattern(self.pattern.clone())
            .with_output_dir(self.output.clone())
            .with_force_overwrite(self.force)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn validate_cruise_label(s: &str) -> std::result::Result<String, String> {
    let label = s.trim();

    if label.is_empty() {
        return Err("Cruise label must not be empty".to_string());
    }

    // The label becomes part of the output file name
    if label.contains('/') || label.contains('\\') {
        return Err("Cruise label must not contain path separators".to_string());
    }

    if label.len() > 100 {
        return Err("Cruise label must be 100 characters or less".to_string());
    }

    Ok(label.to_string())
}

pub fn validate_pattern(s: &str) -> std::result::Result<String, String> {
    if s.trim().is_empty() {
        return Err("Pattern must not be empty".to_string());
    }

    if s.contains('/') || s.contains('\\') {
        return Err("Pattern applies to file names; pass the directory as DATA_DIR".to_string());
    }

    glob::Pattern::new(s).map_err(|e| format!("Invalid glob pattern: {}", e))?;

    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cruise_labels() {
        for label in ["JR16003", "DY090", "SURVEY_2018"] {
            assert!(validate_cruise_label(label).is_ok(), "Should accept: {}", label);
        }
        assert_eq!(validate_cruise_label("  JR16003 ").unwrap(), "JR16003");
    }

    #[test]
    fn test_invalid_cruise_labels() {
        for label in ["", "   ", "../up", "a\\b"] {
            assert!(validate_cruise_label(label).is_err(), "Should reject: {:?}", label);
        }
    }

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("*.json").is_ok());
        assert!(validate_pattern("D2018*-T??????.nc").is_ok());
        assert!(validate_pattern("[*.json").is_err());
        assert!(validate_pattern("raw/*.json").is_err());
        assert!(validate_pattern(" ").is_err());
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "echometa",
            "converted",
            "--cruise",
            "JR16003",
            "--calibration",
            "yes",
            "--ref-ping",
            "3",
            "--format",
            "netcdf",
            "-o",
            "exports",
            "--force",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("converted")));
        assert_eq!(cli.cruise_label.as_deref(), Some("JR16003"));
        assert_eq!(cli.calibration, Some(CalibrationStatus::Yes));
        assert_eq!(cli.reference_ping, Some(3));
        assert_eq!(cli.format, Some(InputFormat::Netcdf));
        assert!(cli.force);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_overrides_from_arguments() {
        let cli = Cli::try_parse_from(["echometa", "--cruise", "DY090", "-p", "D*.json"]).unwrap();
        let mut config = Config::default();
        config.merge_with_cli_args(&cli.create_cli_overrides());

        assert_eq!(config.survey.cruise_label, "DY090");
        assert_eq!(config.input.effective_pattern(), "D*.json");
        // untouched settings keep their defaults
        assert_eq!(config.survey.calibration, CalibrationStatus::Unknown);
        assert!(!config.output.force_overwrite);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["echometa", "-q", "-v"]).is_err());

        let cli = Cli::try_parse_from(["echometa", "-vv"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.verbosity_level(), 2);
    }
}
