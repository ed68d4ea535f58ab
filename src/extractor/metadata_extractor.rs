use crate::config::{CalibrationStatus, SurveyConfig};
use crate::echodata::{
    BackendError, Dialect, EchoBackend, EchoData, EncodeMode, SvProduct, WaveformMode,
};
use crate::error::{EchoMetaError, Result};
use crate::extractor::metadata_row::MetadataRow;
use crate::extractor::navigation::{self, NavigationSummary};
use crate::extractor::numeric::round_to;
use crate::scanner::RawFile;
use log::{debug, info};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub cruise_label: String,
    pub calibration: CalibrationStatus,
    pub reference_ping: usize,
}

impl From<&SurveyConfig> for ExtractionSettings {
    fn from(survey: &SurveyConfig) -> Self {
        Self {
            cruise_label: survey.cruise_label.clone(),
            calibration: survey.calibration,
            reference_ping: survey.reference_ping,
        }
    }
}

/// Where the beamwidths in a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamwidthSource {
    /// Two-way beamwidths recorded with the beam group (rounded).
    BeamGroup,
    /// Beamwidths used by the calibrated product (as given).
    SvProduct,
}

impl BeamwidthSource {
    pub fn label(&self) -> &'static str {
        match self {
            BeamwidthSource::BeamGroup => "beam group",
            BeamwidthSource::SvProduct => "Sv product",
        }
    }

    pub fn for_file(echo: &EchoData) -> Self {
        if echo.beam.twoway_beamwidths().is_some() {
            BeamwidthSource::BeamGroup
        } else {
            BeamwidthSource::SvProduct
        }
    }
}

/// Layout of sound speed, absorption and water level in the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentLayout {
    Shared,
    PerChannel,
}

impl EnvironmentLayout {
    pub fn label(&self) -> &'static str {
        match self {
            EnvironmentLayout::Shared => "shared",
            EnvironmentLayout::PerChannel => "per channel",
        }
    }

    pub fn of(sv: &SvProduct) -> Self {
        if sv.sound_speed.is_shared() && sv.sound_absorption.is_shared() && sv.water_level.is_shared() {
            EnvironmentLayout::Shared
        } else {
            EnvironmentLayout::PerChannel
        }
    }
}

/// Which variant each fallback resolved to for one file.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionTrace {
    pub file: String,
    pub dialect: Dialect,
    pub encode_mode: EncodeMode,
    pub beamwidth_source: BeamwidthSource,
    pub environment_layout: EnvironmentLayout,
    pub sentence_type: String,
    pub fix_count: usize,
    pub window: usize,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub rows: Vec<MetadataRow>,
    pub trace: ExtractionTrace,
}

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub rows_extracted: usize,
    pub current_file: Option<String>,
    pub start_time: Instant,
}

impl ExtractionProgress {
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            files_processed: 0,
            total_files,
            bytes_processed: 0,
            total_bytes,
            rows_extracted: 0,
            current_file: None,
            start_time: Instant::now(),
        }
    }

    pub fn start_file(&mut self, filename: String) {
        self.current_file = Some(filename);
    }

    pub fn finish_file(&mut self, bytes: u64, rows: usize) {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        self.rows_extracted += rows;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Rows and traces of a complete run, in file-then-channel order.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub rows: Vec<MetadataRow>,
    pub traces: Vec<ExtractionTrace>,
    pub progress: ExtractionProgress,
}

pub struct MetadataExtractor<B> {
    backend: B,
    settings: ExtractionSettings,
}

impl<B: EchoBackend> MetadataExtractor<B> {
    pub fn new(backend: B, settings: ExtractionSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Process every file in order. The first failing file halts the run.
    pub fn extract_all(
        &self,
        files: &[RawFile],
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> Result<ExtractionOutcome> {
        let total_bytes = files.iter().map(|f| f.size).sum();
        let mut progress = ExtractionProgress::new(files.len(), total_bytes);
        let mut rows = Vec::new();
        let mut traces = Vec::with_capacity(files.len());

        for file in files {
            progress.start_file(file.filename.clone());
            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            let extraction = self.extract_file(file)?;
            progress.finish_file(file.size, extraction.rows.len());
            rows.extend(extraction.rows);
            traces.push(extraction.trace);
        }

        progress.current_file = None;
        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        Ok(ExtractionOutcome {
            rows,
            traces,
            progress,
        })
    }

    pub fn extract_file(&self, file: &RawFile) -> Result<FileExtraction> {
        info!("processing: {}", file.filename);

        let echo = self.open_with_fallback(&file.path)?;
        let sv = self.compute_sv_with_fallback(&file.path, &echo)?;

        let nav = navigation::summarize(&echo.navigation).ok_or_else(|| {
            EchoMetaError::NavigationMissing {
                file: file.path.display().to_string(),
            }
        })?;
        debug!(
            "{}: {} fixes of {}, window {}",
            file.filename, nav.fix_count, nav.sentence_type, nav.window
        );

        let beamwidth_source = BeamwidthSource::for_file(&echo);
        let environment_layout = EnvironmentLayout::of(&sv);
        debug!(
            "{}: beamwidths from {:?}, environment {:?}",
            file.filename, beamwidth_source, environment_layout
        );

        let echogram = echo
            .source_filename
            .clone()
            .unwrap_or_else(|| file.filename.clone());

        let rows = (0..echo.beam.channel_count())
            .map(|channel| {
                self.channel_row(file, &echo, &sv, &nav, channel, &echogram, beamwidth_source)
            })
            .collect::<Result<Vec<_>>>()?;

        let trace = ExtractionTrace {
            file: file.filename.clone(),
            dialect: echo.dialect,
            encode_mode: sv.encode_mode,
            beamwidth_source,
            environment_layout,
            sentence_type: nav.sentence_type.clone(),
            fix_count: nav.fix_count,
            window: nav.window,
            rows: rows.len(),
        };

        Ok(FileExtraction { rows, trace })
    }

    /// Try each dialect in order. Only a dialect mismatch moves on.
    pub fn open_with_fallback(&self, path: &Path) -> Result<EchoData> {
        let mut attempts = Vec::new();

        for dialect in Dialect::TRY_ORDER {
            match self.backend.open_raw(path, dialect) {
                Ok(echo) => {
                    debug!("{}: opened as {}", path.display(), dialect);
                    return Ok(echo);
                }
                Err(e) if e.is_variant_miss() => {
                    debug!("{}: not {} ({})", path.display(), dialect, e);
                    attempts.push(format!("{}: {}", dialect, e));
                }
                Err(e) => return Err(backend_error(path, e)),
            }
        }

        Err(EchoMetaError::UnsupportedDialect {
            file: path.display().to_string(),
            attempts,
        })
    }

    /// Narrowband product from power samples, else from complex samples.
    pub fn compute_sv_with_fallback(&self, path: &Path, echo: &EchoData) -> Result<SvProduct> {
        let mut last_miss = None;

        for encode in EncodeMode::TRY_ORDER {
            match self.backend.compute_sv(echo, WaveformMode::Cw, encode) {
                Ok(sv) => {
                    info!("{}: {} data used to calculate Sv", path.display(), encode);
                    return Ok(sv);
                }
                Err(e) if e.is_variant_miss() => {
                    debug!("{}: no {} product ({})", path.display(), encode, e);
                    last_miss = Some(e);
                }
                Err(e) => return Err(backend_error(path, e)),
            }
        }

        let source = last_miss.unwrap_or(BackendError::EncodingUnavailable {
            requested: EncodeMode::Complex,
        });
        Err(backend_error(path, source))
    }

    #[allow(clippy::too_many_arguments)]
    fn channel_row(
        &self,
        file: &RawFile,
        echo: &EchoData,
        sv: &SvProduct,
        nav: &NavigationSummary,
        channel: usize,
        echogram: &str,
        beamwidth_source: BeamwidthSource,
    ) -> Result<MetadataRow> {
        let ping = self.settings.reference_ping;
        let beam = &echo.beam;
        let channel_name = &beam.channels[channel];

        if ping >= beam.ping_count {
            return Err(EchoMetaError::ReferencePingOutOfRange {
                file: file.path.display().to_string(),
                channel: channel_name.clone(),
                ping,
                available: beam.ping_count,
            });
        }

        let at = |value: Option<f64>| value.unwrap_or(f64::NAN);

        let pulse_duration = round_to(at(beam.transmit_duration_nominal.get(channel, ping)), 6);
        let sample_interval = round_to(at(beam.sample_interval.get(channel, ping)), 7);
        let transmit_power = at(beam.transmit_power.get(channel, ping));

        let (beamwidth_alongship, beamwidth_athwartship) =
            match (beamwidth_source, beam.twoway_beamwidths()) {
                (BeamwidthSource::BeamGroup, Some((along, athwart))) => (
                    round_to(at(along.get(channel, ping)), 5),
                    round_to(at(athwart.get(channel, ping)), 5),
                ),
                _ => (
                    at(sv.beamwidth_alongship.get(channel, ping)),
                    at(sv.beamwidth_athwartship.get(channel, ping)),
                ),
            };

        let sound_speed = round_to(at(sv.sound_speed.get(channel, ping)), 5);
        let sound_absorption = round_to(at(sv.sound_absorption.get(channel, ping)), 8);
        let transducer_depth = round_to(at(sv.water_level.get(channel, ping)), 5);
        let max_range = round_to(sv.echo_range.nan_max(), 5);

        Ok(MetadataRow {
            event: self.settings.cruise_label.clone(),
            echogram: echogram.to_string(),
            channel: channel_name.clone(),
            software: echo.sonar.software_label(),
            frequency_khz: beam.frequency_nominal[channel] / 1000.0,
            ping_count: sv.ping_count,
            beamwidth_alongship,
            beamwidth_athwartship,
            gain: at(sv.gain_correction.get(channel, ping)),
            sa_correction: at(sv.sa_correction.get(channel, ping)),
            sample_interval,
            pulse_duration_ms: round_to(pulse_duration * 1000.0, 3),
            transmit_power,
            sound_speed,
            sound_absorption,
            depth_min: transducer_depth,
            depth_max: transducer_depth + max_range,
            depth_median: transducer_depth + max_range / 2.0,
            start_time: Some(nav.start_time),
            end_time: Some(nav.end_time),
            start_latitude: nav.start_latitude,
            end_latitude: nav.end_latitude,
            start_longitude: nav.start_longitude,
            end_longitude: nav.end_longitude,
            calibration: self.settings.calibration,
        })
    }
}

fn backend_error(path: &Path, source: BackendError) -> EchoMetaError {
    EchoMetaError::Backend {
        file: path.display().to_string(),
        source,
    }
}
