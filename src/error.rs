use crate::echodata::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EchoMetaError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("No input files matching {pattern} in {directory}")]
    NoInputFiles { directory: String, pattern: String },

    #[error("{file} could not be opened as any supported dialect")]
    UnsupportedDialect { file: String, attempts: Vec<String> },

    #[error("Backend failed on {file}: {source}")]
    Backend {
        file: String,
        #[source]
        source: BackendError,
    },

    #[error("No usable navigation fixes in {file}")]
    NavigationMissing { file: String },

    #[error("Reference ping {ping} out of range for channel {channel} in {file} ({available} pings)")]
    ReferencePingOutOfRange {
        file: String,
        channel: String,
        ping: usize,
        available: usize,
    },

    #[error("Output file already exists: {path}")]
    OutputExists { path: String },

    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Input format {format} is not available in this build")]
    BackendUnavailable { format: String },
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for EchoMetaError {
    fn user_message(&self) -> String {
        match self {
            EchoMetaError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            EchoMetaError::InvalidPath { path } => {
                format!("Invalid path: {}", path)
            }
            EchoMetaError::NoInputFiles { directory, pattern } => {
                format!("No files matching '{}' found in {}", pattern, directory)
            }
            EchoMetaError::UnsupportedDialect { file, attempts } => {
                format!(
                    "Could not open {} (tried: {})",
                    file,
                    attempts.join("; ")
                )
            }
            EchoMetaError::Backend { file, source } => {
                format!("Failed to read {}: {}", file, source)
            }
            EchoMetaError::NavigationMissing { file } => {
                format!("No timestamped GGA, GLL or RMC navigation fixes in {}", file)
            }
            EchoMetaError::OutputExists { path } => {
                format!("Output file already exists: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            EchoMetaError::Config { .. } => Some(
                "Check your configuration file syntax, or regenerate one with --generate-config.".to_string()
            ),
            EchoMetaError::NoInputFiles { .. } => Some(
                "Check the data directory, or pass a different file pattern with --pattern (e.g., --pattern '*.nc').".to_string()
            ),
            EchoMetaError::UnsupportedDialect { .. } => Some(
                "Only CW data recorded with EK60 or EK80 family echosounders is supported.".to_string()
            ),
            EchoMetaError::NavigationMissing { .. } => Some(
                "The file needs GPS fixes in its platform group. Remove it from the input directory or re-convert it with navigation data.".to_string()
            ),
            EchoMetaError::ReferencePingOutOfRange { .. } => Some(
                "Use a smaller reference ping with --ref-ping.".to_string()
            ),
            EchoMetaError::OutputExists { .. } => Some(
                "Remove the existing file, choose a different output directory with --output, or use --force to overwrite.".to_string()
            ),
            EchoMetaError::BackendUnavailable { .. } => Some(
                "Rebuild with the matching cargo feature (e.g., --features netcdf) or use --format json.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for EchoMetaError {
    fn from(error: toml::de::Error) -> Self {
        EchoMetaError::Config {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for EchoMetaError {
    fn from(error: serde_json::Error) -> Self {
        EchoMetaError::Serialization {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EchoMetaError>;
