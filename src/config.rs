use crate::error::{EchoMetaError, Result};
use chrono::format::{Item, StrftimeItems};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub survey: SurveyConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurveyConfig {
    pub cruise_label: String,
    pub calibration: CalibrationStatus,
    pub reference_ping: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub data_dir: PathBuf,
    pub format: InputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub float_precision: usize,
    pub date_format: String,
    pub write_report: bool,
    pub force_overwrite: bool,
}

/// Whether the echosounder was calibrated for the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum CalibrationStatus {
    Yes,
    No,
    Unknown,
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CalibrationStatus::Yes => "Yes",
            CalibrationStatus::No => "No",
            CalibrationStatus::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// On-disk layout of the converted acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Json,
    Netcdf,
}

impl InputFormat {
    pub fn default_pattern(&self) -> &'static str {
        match self {
            InputFormat::Json => "*.json",
            InputFormat::Netcdf => "*.nc",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Json => f.write_str("json"),
            InputFormat::Netcdf => f.write_str("netcdf"),
        }
    }
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            cruise_label: "SURVEY_YEAR".to_string(),
            calibration: CalibrationStatus::Unknown,
            reference_ping: 0,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            format: InputFormat::Json,
            pattern: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            float_precision: 6, // printf %f
            date_format: "%d/%m/%Y %H:%M:%S".to_string(),
            write_report: true,
            force_overwrite: false,
        }
    }
}

impl InputConfig {
    pub fn effective_pattern(&self) -> String {
        self.pattern
            .clone()
            .unwrap_or_else(|| self.format.default_pattern().to_string())
    }
}

impl OutputConfig {
    pub fn csv_path(&self, cruise_label: &str) -> PathBuf {
        self.directory.join(format!("{}_metadata.csv", cruise_label))
    }

    pub fn report_path(&self, cruise_label: &str) -> PathBuf {
        self.directory
            .join(format!("{}_metadata_report.json", cruise_label))
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EchoMetaError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| EchoMetaError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| EchoMetaError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["echometa.toml", ".echometa.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref label) = cli_args.cruise_label {
            self.survey.cruise_label = label.clone();
        }

        if let Some(calibration) = cli_args.calibration {
            self.survey.calibration = calibration;
        }

        if let Some(reference_ping) = cli_args.reference_ping {
            self.survey.reference_ping = reference_ping;
        }

        if let Some(ref data_dir) = cli_args.data_dir {
            self.input.data_dir = data_dir.clone();
        }

        if let Some(format) = cli_args.format {
            self.input.format = format;
        }

        if let Some(ref pattern) = cli_args.pattern {
            self.input.pattern = Some(pattern.clone());
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.output.directory = output_dir.clone();
        }

        if cli_args.force_overwrite {
            self.output.force_overwrite = true;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| EchoMetaError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| EchoMetaError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let label = self.survey.cruise_label.trim();
        if label.is_empty() {
            return Err(EchoMetaError::Config {
                message: "Cruise label must not be empty".to_string(),
            });
        }

        // The label becomes part of the output file name
        if label.contains('/') || label.contains('\\') {
            return Err(EchoMetaError::Config {
                message: format!("Cruise label must not contain path separators: {}", label),
            });
        }

        if let Some(ref pattern) = self.input.pattern {
            if pattern.trim().is_empty() {
                return Err(EchoMetaError::Config {
                    message: "Input pattern must not be empty".to_string(),
                });
            }
        }

        if self.output.float_precision > 12 {
            return Err(EchoMetaError::Config {
                message: format!(
                    "Float precision must be at most 12 (got {})",
                    self.output.float_precision
                ),
            });
        }

        if self.output.date_format.trim().is_empty() {
            return Err(EchoMetaError::Config {
                message: "Date format must not be empty".to_string(),
            });
        }

        if StrftimeItems::new(&self.output.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(EchoMetaError::Config {
                message: format!("Invalid date format: {}", self.output.date_format),
            });
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub cruise_label: Option<String>,
    pub calibration: Option<CalibrationStatus>,
    pub reference_ping: Option<usize>,
    pub data_dir: Option<PathBuf>,
    pub format: Option<InputFormat>,
    pub pattern: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub force_overwrite: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cruise_label(mut self, label: Option<String>) -> Self {
        self.cruise_label = label;
        self
    }

    pub fn with_calibration(mut self, calibration: Option<CalibrationStatus>) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_reference_ping(mut self, ping: Option<usize>) -> Self {
        self.reference_ping = ping;
        self
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_format(mut self, format: Option<InputFormat>) -> Self {
        self.format = format;
        self
    }

    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.survey.cruise_label, "SURVEY_YEAR");
        assert_eq!(config.survey.calibration, CalibrationStatus::Unknown);
        assert_eq!(config.survey.reference_ping, 0);
        assert_eq!(config.output.float_precision, 6);
        assert_eq!(config.input.effective_pattern(), "*.json");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.survey.cruise_label = "  ".to_string();
        assert!(config.validate().is_err());

        config.survey.cruise_label = "../escape".to_string();
        assert!(config.validate().is_err());

        config.survey.cruise_label = "JR16003".to_string();
        config.output.float_precision = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_date_format_validation() {
        let mut config = Config::default();
        config.output.date_format = "%Y-%m-%dT%H:%M:%S".to_string();
        assert!(config.validate().is_ok());

        for bad in ["%d/%m/%Y %Q", "%d/%m/%Y %", " "] {
            config.output.date_format = bad.to_string();
            let err = config.validate().unwrap_err();
            assert!(matches!(err, EchoMetaError::Config { .. }), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_invalid_date_format_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.output.date_format = "%d/%m/%Y %Q".to_string();
        config.save_to_file(temp_file.path()).unwrap();

        let loaded = Config::load_from_file(temp_file.path()).unwrap();
        assert!(loaded.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.survey.calibration = CalibrationStatus::Yes;
        config.input.format = InputFormat::Netcdf;
        let temp_file = NamedTempFile::new().unwrap();

        config.save_to_file(temp_file.path()).unwrap();

        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.survey.calibration, CalibrationStatus::Yes);
        assert_eq!(loaded_config.input.format, InputFormat::Netcdf);
        assert_eq!(loaded_config.input.effective_pattern(), "*.nc");
        assert_eq!(loaded_config.output.date_format, config.output.date_format);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();

        let overrides = CliOverrides::new()
            .with_cruise_label(Some("DY090".to_string()))
            .with_calibration(Some(CalibrationStatus::No))
            .with_reference_ping(Some(3))
            .with_pattern(Some("D2018*.json".to_string()))
            .with_force_overwrite(true);

        config.merge_with_cli_args(&overrides);

        assert_eq!(config.survey.cruise_label, "DY090");
        assert_eq!(config.survey.calibration, CalibrationStatus::No);
        assert_eq!(config.survey.reference_ping, 3);
        assert_eq!(config.input.effective_pattern(), "D2018*.json");
        assert!(config.output.force_overwrite);
    }

    #[test]
    fn test_output_paths_use_cruise_label() {
        let config = Config::default();
        let csv = config.output.csv_path("JR16003");
        assert!(csv.ends_with("JR16003_metadata.csv"));
        let report = config.output.report_path("JR16003");
        assert!(report.ends_with("JR16003_metadata_report.json"));
    }

    #[test]
    fn test_sample_config_generation() {
        let sample = Config::create_sample_config();
        assert!(sample.contains("[survey]"));
        assert!(sample.contains("[input]"));
        assert!(sample.contains("[output]"));
        assert!(sample.contains("calibration = \"Unknown\""));
    }
}
