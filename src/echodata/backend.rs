use crate::echodata::dataset::{Dataset, DatasetTree};
use crate::echodata::model::{
    BeamGroup, ChannelGrid, ChannelValue, EchoData, NavigationFix, SonarInfo, SvProduct,
};
use crate::echodata::{BackendError, Dialect, EchoBackend, EncodeMode, WaveformMode};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const SONAR: &str = "Sonar";
const BEAM_GROUPS: [&str; 2] = ["Sonar/Beam_group1", "Sonar/Beam_group2"];
const PLATFORM: &str = "Platform";
const ENVIRONMENT: &str = "Environment";
const VENDOR: &str = "Vendor_specific";
const PROVENANCE: &str = "Provenance";

/// Loads the group tree of one converted acquisition.
pub trait DatasetSource {
    fn load(&self, path: &Path) -> Result<DatasetTree, BackendError>;
}

/// Group trees exported as JSON, one document per acquisition.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSource;

impl DatasetSource for JsonSource {
    fn load(&self, path: &Path) -> Result<DatasetTree, BackendError> {
        let reader = BufReader::new(File::open(path)?);
        let value: serde_json::Value = serde_json::from_reader(reader)
            .map_err(|e| BackendError::malformed(format!("invalid JSON: {}", e)))?;
        DatasetTree::from_json_value(&value)
    }
}

/// Backend over converted echosounder datasets.
#[derive(Debug, Clone, Default)]
pub struct DatasetBackend<S> {
    source: S,
}

impl<S: DatasetSource> DatasetBackend<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: DatasetSource> EchoBackend for DatasetBackend<S> {
    fn open_raw(&self, path: &Path, dialect: Dialect) -> Result<EchoData, BackendError> {
        let tree = self.source.load(path)?;

        let found = sonar_model(&tree);
        if !found.as_deref().is_some_and(|model| dialect.accepts(model)) {
            return Err(BackendError::DialectMismatch {
                expected: dialect,
                found,
            });
        }

        let sonar = read_sonar(&tree)?;
        let beam = read_beam_group(&tree)?;
        let navigation = read_navigation(&tree)?;
        let source_filename = read_source_filename(&tree);

        Ok(EchoData {
            path: path.to_path_buf(),
            dialect,
            sonar,
            beam,
            navigation,
            source_filename,
            groups: tree,
        })
    }

    fn compute_sv(
        &self,
        echo: &EchoData,
        waveform: WaveformMode,
        encode: EncodeMode,
    ) -> Result<SvProduct, BackendError> {
        let tree = &echo.groups;
        let (path, group) = select_beam_group(tree, encode)?;
        check_waveform(group, waveform)?;

        let channels = echo.beam.channel_count();
        let group_channels = group.require(path, "channel")?.strings()?;
        if group_channels != echo.beam.channels.as_slice() {
            return Err(BackendError::malformed(format!(
                "{} lists different channels than {}",
                path, BEAM_GROUPS[0]
            )));
        }

        let ping_count = dim_len(group, path, "ping_time")?;
        let range_samples = dim_len(group, path, "range_sample")?;
        let sample_interval =
            ChannelGrid::from_variable(group.require(path, "sample_interval")?, channels)?;

        let environment = tree.require_group(ENVIRONMENT)?;
        let sound_speed = ChannelValue::from_variable(
            environment.require(ENVIRONMENT, "sound_speed_indicative")?,
            channels,
            ping_count,
        )?;
        let sound_absorption = ChannelValue::from_variable(
            environment.require(ENVIRONMENT, "absorption_indicative")?,
            channels,
            ping_count,
        )?;
        let water_level = match tree.group(PLATFORM).and_then(|p| p.variable("water_level")) {
            Some(var) => ChannelValue::from_variable(var, channels, ping_count)?,
            None => ChannelValue::Shared(0.0),
        };

        let echo_range = echo_range(
            &sample_interval,
            &sound_speed,
            range_samples,
            encode,
            channels,
            ping_count,
        )?;

        let vendor = tree.require_group(VENDOR)?;
        let durations = &echo.beam.transmit_duration_nominal;
        let gain_correction =
            calibration_table(vendor, "gain_correction", channels, ping_count, durations)?;
        let sa_correction =
            calibration_table(vendor, "sa_correction", channels, ping_count, durations)?;

        let beamwidth_alongship = product_beamwidth(
            vendor,
            group,
            "beamwidth_alongship",
            echo.beam.beamwidth_twoway_alongship.as_ref(),
            channels,
        )?;
        let beamwidth_athwartship = product_beamwidth(
            vendor,
            group,
            "beamwidth_athwartship",
            echo.beam.beamwidth_twoway_athwartship.as_ref(),
            channels,
        )?;

        Ok(SvProduct {
            encode_mode: encode,
            ping_count,
            echo_range,
            gain_correction,
            sa_correction,
            beamwidth_alongship,
            beamwidth_athwartship,
            sound_speed,
            sound_absorption,
            water_level,
        })
    }
}

fn sonar_model(tree: &DatasetTree) -> Option<String> {
    tree.group(SONAR)
        .and_then(|g| g.attr_text("sonar_model"))
        .or_else(|| tree.attr_text("keywords"))
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn dim_len(group: &Dataset, path: &str, dim: &str) -> Result<usize, BackendError> {
    group.dim_len(dim).ok_or_else(|| BackendError::MissingVariable {
        group: path.to_string(),
        name: dim.to_string(),
    })
}

fn read_sonar(tree: &DatasetTree) -> Result<SonarInfo, BackendError> {
    let sonar = tree.require_group(SONAR)?;
    let attr = |name: &str| {
        sonar
            .attr_text(name)
            .map(str::to_string)
            .ok_or_else(|| BackendError::MissingAttribute {
                group: SONAR.to_string(),
                name: name.to_string(),
            })
    };

    Ok(SonarInfo {
        software_name: attr("sonar_software_name")?,
        software_version: attr("sonar_software_version")?,
    })
}

fn read_beam_group(tree: &DatasetTree) -> Result<BeamGroup, BackendError> {
    let path = BEAM_GROUPS[0];
    let group = tree.require_group(path)?;

    let channels = group.require(path, "channel")?.strings()?.to_vec();
    let count = channels.len();

    let frequency_nominal = group.require(path, "frequency_nominal")?.numbers()?.to_vec();
    if frequency_nominal.len() != count {
        return Err(BackendError::malformed(format!(
            "{} channels but {} nominal frequencies",
            count,
            frequency_nominal.len()
        )));
    }

    let grid = |name: &str| ChannelGrid::from_variable(group.require(path, name)?, count);
    let optional_grid = |name: &str| {
        group
            .variable(name)
            .map(|var| ChannelGrid::from_variable(var, count))
            .transpose()
    };

    Ok(BeamGroup {
        ping_count: dim_len(group, path, "ping_time")?,
        transmit_duration_nominal: grid("transmit_duration_nominal")?,
        sample_interval: grid("sample_interval")?,
        transmit_power: grid("transmit_power")?,
        beamwidth_twoway_alongship: optional_grid("beamwidth_twoway_alongship")?,
        beamwidth_twoway_athwartship: optional_grid("beamwidth_twoway_athwartship")?,
        channels,
        frequency_nominal,
    })
}

fn read_navigation(tree: &DatasetTree) -> Result<Vec<NavigationFix>, BackendError> {
    // A file recorded without GPS input has no navigation log at all
    let Some(platform) = tree.group(PLATFORM) else {
        return Ok(Vec::new());
    };
    let (Some(sentence_types), Some(latitudes), Some(longitudes), Some(times)) = (
        platform.variable("sentence_type"),
        platform.variable("latitude"),
        platform.variable("longitude"),
        platform.variable("time1"),
    ) else {
        return Ok(Vec::new());
    };

    let sentence_types = sentence_types.strings()?;
    let latitudes = latitudes.numbers()?;
    let longitudes = longitudes.numbers()?;
    let times = times.times()?;

    let count = sentence_types.len();
    if latitudes.len() != count || longitudes.len() != count || times.len() != count {
        return Err(BackendError::malformed(format!(
            "navigation log lengths differ (types {}, latitude {}, longitude {}, time {})",
            count,
            latitudes.len(),
            longitudes.len(),
            times.len()
        )));
    }

    Ok((0..count)
        .map(|i| NavigationFix {
            sentence_type: sentence_types[i].trim().to_string(),
            time: times[i],
            latitude: latitudes[i],
            longitude: longitudes[i],
        })
        .collect())
}

fn read_source_filename(tree: &DatasetTree) -> Option<String> {
    let names = tree
        .group(PROVENANCE)?
        .variable("source_filenames")?
        .strings()
        .ok()?;
    let first = names.iter().find(|n| !n.trim().is_empty())?;
    // recorded paths may come from another platform
    let name = first
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(first);
    Some(name.to_string())
}

fn is_complex(group: &Dataset) -> bool {
    group.dims.contains_key("beam") || group.variable("backscatter_i").is_some()
}

fn select_beam_group(
    tree: &DatasetTree,
    encode: EncodeMode,
) -> Result<(&'static str, &Dataset), BackendError> {
    let found = match encode {
        EncodeMode::Power => BEAM_GROUPS
            .iter()
            .filter_map(|path| tree.group(path).map(|g| (*path, g)))
            .find(|(_, g)| !is_complex(g)),
        EncodeMode::Complex => tree
            .group(BEAM_GROUPS[0])
            .filter(|g| is_complex(g))
            .map(|g| (BEAM_GROUPS[0], g)),
    };

    found.ok_or(BackendError::EncodingUnavailable { requested: encode })
}

fn check_waveform(group: &Dataset, waveform: WaveformMode) -> Result<(), BackendError> {
    let Some(Ok(types)) = group.variable("transmit_type").map(|v| v.strings()) else {
        // no transmit type recorded: narrowband only
        return Ok(());
    };

    let wanted = waveform.to_string();
    if types.iter().any(|t| t.trim().eq_ignore_ascii_case(&wanted)) {
        Ok(())
    } else {
        Err(BackendError::WaveformUnavailable {
            requested: waveform,
        })
    }
}

fn echo_range(
    sample_interval: &ChannelGrid,
    sound_speed: &ChannelValue,
    range_samples: usize,
    encode: EncodeMode,
    channels: usize,
    ping_count: usize,
) -> Result<ChannelGrid, BackendError> {
    let usable = range_samples.saturating_sub(1 + encode.tvg_correction_samples()) as f64;

    let rows = (0..channels)
        .map(|ch| {
            (0..ping_count)
                .map(|ping| match (sample_interval.get(ch, ping), sound_speed.get(ch, ping)) {
                    (Some(interval), Some(speed)) => usable * interval * speed / 2.0,
                    _ => f64::NAN,
                })
                .collect()
        })
        .collect();

    ChannelGrid::from_rows(rows)
}

/// Per-ping calibration values. Tables binned by pulse length are resolved
/// with the bin closest to each ping's nominal transmit duration.
fn calibration_table(
    vendor: &Dataset,
    name: &str,
    channels: usize,
    ping_count: usize,
    durations: &ChannelGrid,
) -> Result<ChannelGrid, BackendError> {
    let var = vendor.require(VENDOR, name)?;
    let table = ChannelGrid::from_variable(var, channels)?;

    let pulse_lengths = match (var.axis("pulse_length_bin"), vendor.variable("pulse_length")) {
        (Some(_), Some(pulse_length)) => ChannelGrid::from_variable(pulse_length, channels)?,
        _ => return Ok(table),
    };

    let rows = (0..channels)
        .map(|ch| {
            let bins = pulse_lengths.row(ch).unwrap_or(&[]);
            (0..ping_count)
                .map(|ping| {
                    durations
                        .get(ch, ping)
                        .and_then(|duration| nearest_bin(bins, duration))
                        .and_then(|bin| table.get(ch, bin))
                        .unwrap_or(f64::NAN)
                })
                .collect()
        })
        .collect();

    ChannelGrid::from_rows(rows)
}

fn nearest_bin(bins: &[f64], duration: f64) -> Option<usize> {
    if duration.is_nan() {
        return None;
    }
    bins.iter()
        .enumerate()
        .filter(|(_, b)| !b.is_nan())
        .min_by(|(_, a), (_, b)| (*a - duration).abs().total_cmp(&(*b - duration).abs()))
        .map(|(i, _)| i)
}

fn product_beamwidth(
    vendor: &Dataset,
    group: &Dataset,
    name: &str,
    twoway: Option<&ChannelGrid>,
    channels: usize,
) -> Result<ChannelGrid, BackendError> {
    if let Some(var) = vendor.variable(name).or_else(|| group.variable(name)) {
        return ChannelGrid::from_variable(var, channels);
    }

    twoway.cloned().ok_or_else(|| BackendError::MissingVariable {
        group: VENDOR.to_string(),
        name: name.to_string(),
    })
}
