use crate::config::{CalibrationStatus, OutputConfig};
use chrono::NaiveDateTime;
use std::fmt::Write;

/// Column headers of the metadata table, in output order.
pub const COLUMNS: [&str; 25] = [
    "Event",
    "Echogram, raw format []",
    "Identification []//*channel",
    "Data acquisition software (recording raw data) []",
    "Frequency [kHz]",
    "Number of pings []",
    "Beamwidth, alongship [deg]",
    "Beamwidth, athwartship [deg]",
    "Gain, transducer [dB re 1]",
    "Simrad correction factor [dB re 1/m]",
    "Sample interval [s]",
    "Pulse duration, transmitted [ms]",
    "Power, transmitted [W]",
    "Sound velocity in water [m/s]",
    "Sound absorption [dB/m]",
    "Depth, water, top/minimum [m]",
    "Depth, water, bottom/maximum [m]",
    "DEPTH, water [m]",
    "Date/time start []",
    "Date/time end []",
    "Latitude []",
    "Latitude 2 []",
    "Longitude []",
    "Longitude 2 []",
    "Calibration []",
];

/// One (file, channel) record of the metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    pub event: String,
    pub echogram: String,
    pub channel: String,
    pub software: String,
    pub frequency_khz: f64,
    pub ping_count: usize,
    pub beamwidth_alongship: f64,
    pub beamwidth_athwartship: f64,
    pub gain: f64,
    pub sa_correction: f64,
    pub sample_interval: f64,
    pub pulse_duration_ms: f64,
    pub transmit_power: f64,
    pub sound_speed: f64,
    pub sound_absorption: f64,
    pub depth_min: f64,
    pub depth_max: f64,
    pub depth_median: f64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub start_latitude: f64,
    pub end_latitude: f64,
    pub start_longitude: f64,
    pub end_longitude: f64,
    pub calibration: CalibrationStatus,
}

/// How floats and timestamps are rendered in the table.
#[derive(Debug, Clone)]
pub struct FieldFormat {
    pub precision: usize,
    pub date_format: String,
}

impl Default for FieldFormat {
    fn default() -> Self {
        Self::from(&OutputConfig::default())
    }
}

impl From<&OutputConfig> for FieldFormat {
    fn from(config: &OutputConfig) -> Self {
        Self {
            precision: config.float_precision,
            date_format: config.date_format.clone(),
        }
    }
}

impl FieldFormat {
    pub fn float(&self, value: f64) -> String {
        if value.is_nan() {
            String::new()
        } else {
            format!("{:.prec$}", value, prec = self.precision)
        }
    }

    /// Undefined times, and formats chrono cannot render, give an empty cell.
    pub fn time(&self, value: Option<NaiveDateTime>) -> String {
        let Some(t) = value else {
            return String::new();
        };
        let mut cell = String::new();
        match write!(cell, "{}", t.format(&self.date_format)) {
            Ok(()) => cell,
            Err(_) => String::new(),
        }
    }
}

impl MetadataRow {
    /// Cells in `COLUMNS` order.
    pub fn to_record(&self, format: &FieldFormat) -> Vec<String> {
        vec![
            self.event.clone(),
            self.echogram.clone(),
            self.channel.clone(),
            self.software.clone(),
            format.float(self.frequency_khz),
            self.ping_count.to_string(),
            format.float(self.beamwidth_alongship),
            format.float(self.beamwidth_athwartship),
            format.float(self.gain),
            format.float(self.sa_correction),
            format.float(self.sample_interval),
            format.float(self.pulse_duration_ms),
            format.float(self.transmit_power),
            format.float(self.sound_speed),
            format.float(self.sound_absorption),
            format.float(self.depth_min),
            format.float(self.depth_max),
            format.float(self.depth_median),
            format.time(self.start_time),
            format.time(self.end_time),
            format.float(self.start_latitude),
            format.float(self.end_latitude),
            format.float(self.start_longitude),
            format.float(self.end_longitude),
            self.calibration.to_string(),
        ]
    }
}
