use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use ndarray::{Array1, Array2};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::decimate;
use crate::types::*;

// Constants used throughout the reader
const SETTINGS_END: &str = "<End settings>";
const CLOCK_RATE_PREFIX: &str = "Clock rate:";
const VOLTAGE_SCALING_PREFIX: &str = "Voltage_scaling:";
const DIO_RECORD_BYTES: usize = 5; // <time uint32><state uint8>
const READ_BUFFER_CAPACITY: usize = 65536;

/// Loads LFP data for the requested (tetrode, channel) pairs from an export
/// directory.
///
/// `lfp_dir` is the `.LFP` directory produced by exportLFP; file names inside
/// it are assumed unchanged from the exporter's defaults. `tetrodes` and
/// `channels` are parallel: entry `i` of each names one channel file, and a
/// tetrode may appear several times to pull several of its channels. The
/// shared timestamp series is read once from the companion
/// `.timestamps.dat` and every channel is decoded against it.
pub fn load_lfp_dir<P: AsRef<Path>>(
    lfp_dir: P,
    tetrodes: &[u32],
    channels: &[u32],
    options: &LfpOptions,
) -> Result<LfpBundle> {
    if tetrodes.len() != channels.len() {
        return Err(TrodesError::DimensionalityMismatch(format!(
            "{} tetrodes requested against {} channels",
            tetrodes.len(),
            channels.len()
        )));
    }

    let dir = lfp_dir.as_ref();
    let base = export_base(dir, "LFP")?;
    let ts_path = append_suffix(&base, ".timestamps.dat");

    let fs_acquisition = acquisition_rate(&ts_path)?;
    let raw_ticks = load_raw_timestamps(&ts_path)?;
    let n_raw = raw_ticks.len();
    debug!(
        "{} raw timestamps at {} Hz from {}",
        n_raw,
        fs_acquisition,
        ts_path.display()
    );

    let (timestamps, plan) = decimate::reconcile(
        &raw_ticks,
        fs_acquisition,
        options.decimation_factor,
        options.trodes_style_decimation,
    )?;

    let mut data = Array2::zeros((tetrodes.len(), timestamps.len()));
    for (row, (&tetrode, &channel)) in tetrodes.iter().zip(channels).enumerate() {
        let channel_path = append_suffix(&base, &format!(".LFP_nt{}ch{}.dat", tetrode, channel));
        let samples = load_channel_samples(&channel_path)?;
        if samples.len() != n_raw {
            return Err(TrodesError::CorruptBinaryPayload(format!(
                "{} holds {} samples where {} timestamps were expected",
                channel_path.display(),
                samples.len(),
                n_raw
            )));
        }
        // stride exactly as the timestamps were strided so rows stay aligned
        let samples = if plan.stride > 1 {
            samples
                .iter()
                .skip(plan.start_offset)
                .step_by(plan.stride)
                .copied()
                .collect::<Array1<f64>>()
        } else {
            samples
        };
        data.row_mut(row).assign(&samples);
    }

    let labels = reconcile_labels(tetrodes, channels, options.labels.as_deref());

    Ok(LfpBundle {
        data,
        timestamps,
        fs: plan.effective_rate,
        step: plan.step,
        labels,
        resample_to: plan.resample_to,
    })
}

/// Loads all 4 channels of each requested tetrode, one bundle per tetrode.
///
/// Duplicate tetrode IDs are collapsed (first occurrence wins the ordering).
/// Labels are the generated `t{tetrode}c{channel}` defaults; any labels in
/// `options` are ignored here since one caller-supplied list cannot name
/// channels across several bundles.
pub fn load_lfp_tetrodes<P: AsRef<Path>>(
    lfp_dir: P,
    tetrodes: &[u32],
    options: &LfpOptions,
) -> Result<Vec<LfpBundle>> {
    let mut unique: Vec<u32> = Vec::new();
    for &t in tetrodes {
        if !unique.contains(&t) {
            unique.push(t);
        }
    }

    let mut bundles = Vec::with_capacity(unique.len());
    for &tetrode in &unique {
        let opts = LfpOptions {
            labels: None,
            ..options.clone()
        };
        bundles.push(load_lfp_dir(
            lfp_dir.as_ref(),
            &[tetrode; 4],
            &[1, 2, 3, 4],
            &opts,
        )?);
    }
    Ok(bundles)
}

/// Loads the state-change events of one digital input channel from a `.DIO`
/// export directory.
pub fn load_dio_dir<P: AsRef<Path>>(dio_dir: P, channel: u32) -> Result<Vec<DioEvent>> {
    let base = export_base(dio_dir.as_ref(), "DIO")?;
    load_dio_file(append_suffix(&base, &format!(".dio_Din{}.dat", channel)))
}

/// Loads the state-change events of several digital input channels, in
/// request order.
pub fn load_dio_channels<P: AsRef<Path>>(
    dio_dir: P,
    channels: &[u32],
) -> Result<Vec<Vec<DioEvent>>> {
    let mut events = Vec::with_capacity(channels.len());
    for &channel in channels {
        events.push(load_dio_dir(dio_dir.as_ref(), channel)?);
    }
    Ok(events)
}

/// Loads DIO events from a single `.dio_Din{N}.dat` file.
///
/// Works for digital output pins as well; the exporter stores both
/// directions with the same record layout.
pub fn load_dio_file<P: AsRef<Path>>(path: P) -> Result<Vec<DioEvent>> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, file);
    read_preamble(&mut reader)?;
    read_dio_payload(&mut reader)
}

/// Extracts the acquisition sample rate from a `.dat` file's preamble
/// without touching the rest of the file.
///
/// Scanning stops as soon as the `Clock rate:` line is found. Reaching the
/// end-of-settings sentinel (or the end of the file) first means the file
/// cannot be interpreted, not that some default applies.
pub fn acquisition_rate<P: AsRef<Path>>(path: P) -> Result<f64> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, file);
    scan_for_clock_rate(&mut reader)
}

/// Reads the raw (undivided) u32 sample counters from a `.timestamps.dat`
/// export file.
pub fn load_raw_timestamps<P: AsRef<Path>>(path: P) -> Result<Array1<u32>> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, file);
    read_preamble(&mut reader)?;
    read_u32_payload(&mut reader)
}

/// Reads one LFP channel file: preamble for the voltage scaling, then the
/// int16 payload scaled to microvolts.
fn load_channel_samples(path: &Path) -> Result<Array1<f64>> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_CAPACITY, file);
    let settings = read_preamble(&mut reader)?;
    let scaling = settings.require_voltage_scaling()?;
    read_i16_payload(&mut reader, scaling)
}

/// Consumes a settings preamble up to and including the `<End settings>`
/// line, collecting recognized settings along the way.
///
/// On return the reader sits exactly at the first byte of binary payload;
/// the payload decoders below rely on that position. A stream that ends
/// before the sentinel is malformed and nothing of it should be trusted.
fn read_preamble<R: BufRead>(reader: &mut R) -> Result<FileSettings> {
    let mut settings = FileSettings::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(TrodesError::MalformedHeader(
                "'<End settings>' sentinel never found",
            ));
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line == SETTINGS_END {
            return Ok(settings);
        }
        if let Some(rest) = line.strip_prefix(CLOCK_RATE_PREFIX) {
            settings.clock_rate = rest.split_whitespace().last().and_then(|t| t.parse().ok());
        } else if let Some(rest) = line.strip_prefix(VOLTAGE_SCALING_PREFIX) {
            settings.voltage_scaling = rest.trim().parse().ok();
        }
    }
}

/// Scans preamble lines for `Clock rate:` only, stopping at the first match.
fn scan_for_clock_rate<R: BufRead>(reader: &mut R) -> Result<f64> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(TrodesError::MalformedHeader(
                "'Clock rate:' line never found",
            ));
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line == SETTINGS_END {
            return Err(TrodesError::MalformedHeader(
                "'Clock rate:' line never found",
            ));
        }
        if let Some(rest) = line.strip_prefix(CLOCK_RATE_PREFIX) {
            return rest
                .split_whitespace()
                .last()
                .and_then(|t| t.parse().ok())
                .ok_or(TrodesError::MalformedHeader(
                    "unparseable 'Clock rate:' value",
                ));
        }
    }
}

/// Decodes the remaining bytes as little-endian u32 records.
fn read_u32_payload<R: Read>(reader: &mut R) -> Result<Array1<u32>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.len() % 4 != 0 {
        return Err(TrodesError::CorruptBinaryPayload(format!(
            "{} payload bytes is not a whole number of uint32 records",
            bytes.len()
        )));
    }
    let mut values = vec![0u32; bytes.len() / 4];
    bytes.as_slice().read_u32_into::<LittleEndian>(&mut values)?;
    Ok(Array1::from_vec(values))
}

/// Decodes the remaining bytes as little-endian i16 samples scaled to
/// microvolts.
fn read_i16_payload<R: Read>(reader: &mut R, voltage_scaling: f64) -> Result<Array1<f64>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.len() % 2 != 0 {
        return Err(TrodesError::CorruptBinaryPayload(format!(
            "{} payload bytes is not a whole number of int16 records",
            bytes.len()
        )));
    }
    let mut raw = vec![0i16; bytes.len() / 2];
    bytes.as_slice().read_i16_into::<LittleEndian>(&mut raw)?;
    Ok(raw.iter().map(|&s| s as f64 * voltage_scaling).collect())
}

/// Decodes the remaining bytes as (u32 time, u8 state) event records.
fn read_dio_payload<R: Read>(reader: &mut R) -> Result<Vec<DioEvent>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.len() % DIO_RECORD_BYTES != 0 {
        return Err(TrodesError::CorruptBinaryPayload(format!(
            "{} payload bytes is not a whole number of {}-byte event records",
            bytes.len(),
            DIO_RECORD_BYTES
        )));
    }
    let mut events = Vec::with_capacity(bytes.len() / DIO_RECORD_BYTES);
    let mut cursor = bytes.as_slice();
    while !cursor.is_empty() {
        let time = cursor.read_u32::<LittleEndian>()?;
        let state = cursor.read_u8()?;
        events.push(DioEvent { time, state });
    }
    Ok(events)
}

/// Default labels are `t{tetrode}c{channel}`. Caller-supplied labels are
/// padded (with `None`) or truncated to the channel count, with a warning
/// either way.
fn reconcile_labels(
    tetrodes: &[u32],
    channels: &[u32],
    labels: Option<&[String]>,
) -> Vec<Option<String>> {
    let n = tetrodes.len();
    match labels {
        None => tetrodes
            .iter()
            .zip(channels)
            .map(|(t, c)| Some(format!("t{}c{}", t, c)))
            .collect(),
        Some(given) => {
            if given.len() < n {
                warn!(
                    "{} label(s) supplied for {} channels; trailing channels left unlabeled",
                    given.len(),
                    n
                );
            } else if given.len() > n {
                warn!(
                    "{} label(s) supplied for {} channels; extra labels truncated",
                    given.len(),
                    n
                );
            }
            (0..n).map(|i| given.get(i).cloned()).collect()
        }
    }
}

/// Validates an export directory's extension and returns the path base the
/// exporter prefixed every file inside with: `<dir>/<dir stem>`.
fn export_base(dir: &Path, expected_ext: &'static str) -> Result<PathBuf> {
    match dir.extension() {
        Some(ext) if ext == expected_ext => {}
        _ => {
            return Err(TrodesError::Other(format!(
                ".{} directory expected, got {}",
                expected_ext,
                dir.display()
            )))
        }
    }
    let stem = dir
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| TrodesError::Other(format!("unusable directory name {}", dir.display())))?;
    Ok(dir.join(stem))
}

fn append_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
