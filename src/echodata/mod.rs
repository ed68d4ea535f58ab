//! Boundary to the acoustics collaborator.
//!
//! Decoding acquisitions and deriving the calibrated backscatter product is the
//! job of an [`EchoBackend`]. The extractor only sees the typed model in
//! [`model`] and the retry-aware [`BackendError`].

pub mod backend;
pub mod dataset;
pub mod model;
#[cfg(feature = "netcdf")]
pub mod netcdf_source;

pub use backend::{DatasetBackend, DatasetSource, JsonSource};
pub use dataset::{AttrValue, Dataset, DatasetTree, VarData, Variable};
pub use model::{
    BeamGroup, ChannelGrid, ChannelValue, EchoData, NavigationFix, SonarInfo, SvProduct,
};
#[cfg(feature = "netcdf")]
pub use netcdf_source::NetcdfSource;

use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Hardware/firmware family of the echosounder that recorded a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dialect {
    Ek60,
    Ek80,
}

impl Dialect {
    pub const TRY_ORDER: [Dialect; 2] = [Dialect::Ek60, Dialect::Ek80];

    /// Sonar model names each dialect can read.
    pub fn model_names(&self) -> &'static [&'static str] {
        match self {
            Dialect::Ek60 => &["EK60", "ES60"],
            Dialect::Ek80 => &["EK80", "ES80", "EA640"],
        }
    }

    pub fn accepts(&self, sonar_model: &str) -> bool {
        let model = sonar_model.trim().to_uppercase();
        self.model_names().iter().any(|name| *name == model)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Ek60 => f.write_str("EK60"),
            Dialect::Ek80 => f.write_str("EK80"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaveformMode {
    /// Continuous wave (narrowband)
    Cw,
}

impl fmt::Display for WaveformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveformMode::Cw => f.write_str("CW"),
        }
    }
}

/// How raw samples were stored: power/angle pairs or complex samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeMode {
    Power,
    Complex,
}

impl EncodeMode {
    pub const TRY_ORDER: [EncodeMode; 2] = [EncodeMode::Power, EncodeMode::Complex];

    /// Samples dropped at the start of a ping by the TVG range correction.
    pub fn tvg_correction_samples(&self) -> usize {
        match self {
            EncodeMode::Power => 2,
            EncodeMode::Complex => 0,
        }
    }
}

impl fmt::Display for EncodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeMode::Power => f.write_str("power"),
            EncodeMode::Complex => f.write_str("complex"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("file is not {expected} data (sonar model: {})", .found.as_deref().unwrap_or("unknown"))]
    DialectMismatch {
        expected: Dialect,
        found: Option<String>,
    },

    #[error("no {requested}-encoded samples available")]
    EncodingUnavailable { requested: EncodeMode },

    #[error("no {requested} pings available")]
    WaveformUnavailable { requested: WaveformMode },

    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing group {path}")]
    MissingGroup { path: String },

    #[error("missing variable {name} in group {group}")]
    MissingVariable { group: String, name: String },

    #[error("missing attribute {name} in group {group}")]
    MissingAttribute { group: String, name: String },

    #[error("malformed dataset: {message}")]
    Malformed { message: String },
}

impl BackendError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        BackendError::Malformed {
            message: message.into(),
        }
    }

    /// Errors that only say "not this variant", so the next variant may succeed.
    pub fn is_variant_miss(&self) -> bool {
        matches!(
            self,
            BackendError::DialectMismatch { .. }
                | BackendError::EncodingUnavailable { .. }
                | BackendError::WaveformUnavailable { .. }
        )
    }
}

/// The external acoustics library, seen from the extractor.
pub trait EchoBackend {
    /// Open an acquisition assuming it was recorded by `dialect`.
    fn open_raw(&self, path: &Path, dialect: Dialect) -> Result<EchoData, BackendError>;

    /// Derive the calibrated backscatter product for one waveform and encoding.
    fn compute_sv(
        &self,
        echo: &EchoData,
        waveform: WaveformMode,
        encode: EncodeMode,
    ) -> Result<SvProduct, BackendError>;
}

impl<B: EchoBackend + ?Sized> EchoBackend for Box<B> {
    fn open_raw(&self, path: &Path, dialect: Dialect) -> Result<EchoData, BackendError> {
        (**self).open_raw(path, dialect)
    }

    fn compute_sv(
        &self,
        echo: &EchoData,
        waveform: WaveformMode,
        encode: EncodeMode,
    ) -> Result<SvProduct, BackendError> {
        (**self).compute_sv(echo, waveform, encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_accepts_family_models() {
        assert!(Dialect::Ek60.accepts("EK60"));
        assert!(Dialect::Ek60.accepts(" es60 "));
        assert!(!Dialect::Ek60.accepts("EK80"));
        assert!(Dialect::Ek80.accepts("EA640"));
        assert!(!Dialect::Ek80.accepts("EK500"));
    }

    #[test]
    fn test_try_orders() {
        assert_eq!(Dialect::TRY_ORDER, [Dialect::Ek60, Dialect::Ek80]);
        assert_eq!(EncodeMode::TRY_ORDER, [EncodeMode::Power, EncodeMode::Complex]);
    }

    #[test]
    fn test_variant_miss_classification() {
        let miss = BackendError::DialectMismatch {
            expected: Dialect::Ek60,
            found: Some("EK80".to_string()),
        };
        assert!(miss.is_variant_miss());
        assert!(miss.to_string().contains("EK80"));

        let fatal = BackendError::malformed("channel axis length mismatch");
        assert!(!fatal.is_variant_miss());
    }
}
