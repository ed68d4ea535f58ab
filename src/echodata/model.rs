use crate::echodata::dataset::{DatasetTree, Variable};
use crate::echodata::{BackendError, Dialect, EncodeMode};
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Values indexed by channel and a second axis (usually ping).
///
/// A grid with one value per channel broadcasts that value over every ping.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGrid {
    values: Vec<f64>,
    per_channel: usize,
}

impl ChannelGrid {
    /// One value per channel.
    pub fn per_channel(values: Vec<f64>) -> Self {
        Self {
            values,
            per_channel: 1,
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, BackendError> {
        let per_channel = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != per_channel) {
            return Err(BackendError::malformed("channel rows have different lengths"));
        }
        Ok(Self {
            values: rows.into_iter().flatten().collect(),
            per_channel,
        })
    }

    /// Lay out a dataset variable as channel rows.
    ///
    /// Variables without a channel axis are repeated for every channel.
    pub fn from_variable(var: &Variable, channels: usize) -> Result<Self, BackendError> {
        let values = var.numbers()?;

        match (var.axis("channel"), var.shape.len()) {
            (_, 0) => {
                let value = values.first().copied().unwrap_or(f64::NAN);
                Ok(Self::per_channel(vec![value; channels]))
            }
            (Some(0), rank) if rank <= 2 => {
                if var.shape[0] != channels {
                    return Err(BackendError::malformed(format!(
                        "channel axis has {} entries, expected {}",
                        var.shape[0], channels
                    )));
                }
                let per_channel = if rank == 2 { var.shape[1] } else { 1 };
                Ok(Self {
                    values: values.to_vec(),
                    per_channel,
                })
            }
            (Some(1), 2) => {
                let (rows, cols) = (var.shape[0], var.shape[1]);
                if cols != channels {
                    return Err(BackendError::malformed(format!(
                        "channel axis has {} entries, expected {}",
                        cols, channels
                    )));
                }
                let mut transposed = Vec::with_capacity(values.len());
                for ch in 0..cols {
                    transposed.extend((0..rows).map(|r| values[r * cols + ch]));
                }
                Ok(Self {
                    values: transposed,
                    per_channel: rows,
                })
            }
            (None, 1) => {
                let mut repeated = Vec::with_capacity(values.len() * channels);
                for _ in 0..channels {
                    repeated.extend_from_slice(values);
                }
                Ok(Self {
                    values: repeated,
                    per_channel: values.len(),
                })
            }
            _ => Err(BackendError::malformed(format!(
                "cannot lay out dimensions {:?} by channel",
                var.dims
            ))),
        }
    }

    pub fn channel_count(&self) -> usize {
        if self.per_channel == 0 {
            0
        } else {
            self.values.len() / self.per_channel
        }
    }

    pub fn len_per_channel(&self) -> usize {
        self.per_channel
    }

    pub fn row(&self, channel: usize) -> Option<&[f64]> {
        let start = channel.checked_mul(self.per_channel)?;
        self.values.get(start..start + self.per_channel)
    }

    pub fn get(&self, channel: usize, index: usize) -> Option<f64> {
        let row = self.row(channel)?;
        if row.len() == 1 {
            return row.first().copied();
        }
        row.get(index).copied()
    }

    /// Largest defined value, NaN when nothing is defined.
    pub fn nan_max(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max)
    }
}

/// An environmental parameter that is either one value for the whole file
/// or one value per channel and ping.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    Shared(f64),
    PerChannel(ChannelGrid),
}

impl ChannelValue {
    pub fn get(&self, channel: usize, ping: usize) -> Option<f64> {
        match self {
            ChannelValue::Shared(v) => Some(*v),
            ChannelValue::PerChannel(grid) => grid.get(channel, ping),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, ChannelValue::Shared(_))
    }

    /// Single-valued variables become `Shared`; anything else is aligned to
    /// (channel, ping). A second axis that is not the ping axis keeps only its
    /// first value per channel.
    pub fn from_variable(
        var: &Variable,
        channels: usize,
        ping_count: usize,
    ) -> Result<Self, BackendError> {
        let values = var.numbers()?;
        if values.len() == 1 {
            return Ok(ChannelValue::Shared(values[0]));
        }
        if values.is_empty() {
            return Err(BackendError::malformed(format!(
                "no values along {:?}",
                var.dims
            )));
        }

        let grid = ChannelGrid::from_variable(var, channels)?;
        if grid.len_per_channel() == ping_count || grid.len_per_channel() == 1 {
            return Ok(ChannelValue::PerChannel(grid));
        }

        let firsts = (0..channels)
            .map(|ch| grid.get(ch, 0).unwrap_or(f64::NAN))
            .collect();
        Ok(ChannelValue::PerChannel(ChannelGrid::per_channel(firsts)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SonarInfo {
    pub software_name: String,
    pub software_version: String,
}

impl SonarInfo {
    pub fn software_label(&self) -> String {
        format!("{} v{}", self.software_name, self.software_version)
    }
}

#[derive(Debug, Clone)]
pub struct BeamGroup {
    pub channels: Vec<String>,
    pub frequency_nominal: Vec<f64>,
    pub ping_count: usize,
    pub transmit_duration_nominal: ChannelGrid,
    pub sample_interval: ChannelGrid,
    pub transmit_power: ChannelGrid,
    pub beamwidth_twoway_alongship: Option<ChannelGrid>,
    pub beamwidth_twoway_athwartship: Option<ChannelGrid>,
}

impl BeamGroup {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Both two-way beamwidth fields, when this schema variant records them.
    pub fn twoway_beamwidths(&self) -> Option<(&ChannelGrid, &ChannelGrid)> {
        match (
            &self.beamwidth_twoway_alongship,
            &self.beamwidth_twoway_athwartship,
        ) {
            (Some(along), Some(athwart)) => Some((along, athwart)),
            _ => None,
        }
    }
}

/// One GPS record from the platform log.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationFix {
    pub sentence_type: String,
    pub time: Option<NaiveDateTime>,
    pub latitude: f64,
    pub longitude: f64,
}

/// An opened acquisition.
#[derive(Debug, Clone)]
pub struct EchoData {
    pub path: PathBuf,
    pub dialect: Dialect,
    pub sonar: SonarInfo,
    pub beam: BeamGroup,
    pub navigation: Vec<NavigationFix>,
    /// Name of the file the converter read, when recorded.
    pub source_filename: Option<String>,
    pub groups: DatasetTree,
}

/// Calibration constants and environment behind a calibrated Sv product,
/// aligned to the channels of the `EchoData` it was computed from.
#[derive(Debug, Clone)]
pub struct SvProduct {
    pub encode_mode: EncodeMode,
    pub ping_count: usize,
    /// Deepest sample range per channel and ping, in metres.
    pub echo_range: ChannelGrid,
    pub gain_correction: ChannelGrid,
    pub sa_correction: ChannelGrid,
    pub beamwidth_alongship: ChannelGrid,
    pub beamwidth_athwartship: ChannelGrid,
    pub sound_speed: ChannelValue,
    pub sound_absorption: ChannelValue,
    pub water_level: ChannelValue,
}
