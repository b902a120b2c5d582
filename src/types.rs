use ndarray::{Array1, Array2};
use std::io;

/// One requested (tetrode, channel) pair.
///
/// Trodes tetrodes carry exactly 4 channels, numbered 1 through 4. Like the
/// Trodes software itself, everything here is 1-indexed: there is no channel 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TetrodeChannel {
    /// Tetrode (nTrode) ID as it appears in the workspace configuration
    pub tetrode: u32,
    /// Channel number within the tetrode, always in 1..=4
    pub channel: u32,
}

/// A single digital I/O state change.
///
/// Field order matches the on-disk record layout written by exportdio:
/// `Fields: <time uint32><state uint8>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DioEvent {
    /// Trodes sample counter at which the pin changed state
    pub time: u32,
    /// New pin state, 0 (low) or 1 (high)
    pub state: u8,
}

/// Settings recovered from a `.dat` file's text preamble.
///
/// The preamble is a short run of `Key: value` lines between `<Start settings>`
/// and `<End settings>`. Only the settings the binary decoders need are kept;
/// everything else (description, byte order, field list) is skipped over.
/// A fresh `FileSettings` is produced per file open and discarded once the
/// payload has been read.
#[derive(Debug, Clone, Default)]
pub struct FileSettings {
    /// Acquisition sample rate in Hz, from the `Clock rate:` line
    pub clock_rate: Option<f64>,
    /// Microvolts per raw int16 count, from the `Voltage_scaling:` line
    pub voltage_scaling: Option<f64>,
}

impl FileSettings {
    /// Returns the acquisition clock rate, or `MalformedHeader` if the
    /// preamble ended without one.
    pub fn require_clock_rate(&self) -> Result<f64> {
        self.clock_rate.ok_or(TrodesError::MalformedHeader(
            "preamble has no 'Clock rate:' line",
        ))
    }

    /// Returns the voltage scaling factor, or `MalformedHeader` if the
    /// preamble ended without one.
    pub fn require_voltage_scaling(&self) -> Result<f64> {
        self.voltage_scaling.ok_or(TrodesError::MalformedHeader(
            "preamble has no 'Voltage_scaling:' line",
        ))
    }
}

/// How a loaded timestamp/sample series was (or should be) decimated.
///
/// Computed once per load from the raw counter series and the requested
/// factor; never mutated afterwards. The two decimation styles differ in who
/// does the work:
///
/// - Trodes-style: samples are dropped at load time by striding the raw
///   series (`stride` > 1), exactly as Trodes modules receive their data.
/// - Subsample-style: the series is left untouched and `resample_to` tells
///   the downstream signal container what rate to resample to.
#[derive(Debug, Clone, PartialEq)]
pub struct DecimationPlan {
    /// Requested decimation factor; 1 when no decimation was requested
    pub factor: u32,
    /// Index of the first raw sample kept (0 unless stride decimation applied)
    pub start_offset: usize,
    /// Keep-every-Nth stride applied at load time; 1 when not striding
    pub stride: usize,
    /// Sample rate of the series as loaded, in Hz
    pub effective_rate: f64,
    /// Mean spacing of consecutive timestamps, in seconds
    pub step: f64,
    /// Target rate for a downstream resampling pass, if one was requested
    pub resample_to: Option<f64>,
}

/// Options for loading LFP data from an export directory.
#[derive(Debug, Clone)]
pub struct LfpOptions {
    /// Factor by which data is decimated. -1 (the default) disables
    /// decimation entirely.
    pub decimation_factor: i32,
    /// Decimate the way Trodes modules do, by taking every
    /// `decimation_factor * 10`-th sample aligned to the raw counter, instead
    /// of marking the output for downstream resampling. Prefer resampling
    /// unless you need exactly the data Trodes modules receive.
    pub trodes_style_decimation: bool,
    /// Per-channel labels. `None` generates `t{tetrode}c{channel}` labels.
    /// A short list leaves the trailing channels unlabeled and a long list is
    /// truncated; both cases log a warning.
    pub labels: Option<Vec<String>>,
}

impl Default for LfpOptions {
    fn default() -> Self {
        LfpOptions {
            decimation_factor: -1,
            trodes_style_decimation: false,
            labels: None,
        }
    }
}

/// Labeled multi-channel LFP data sharing one timestamp series.
///
/// This is the final artifact of an LFP load, shaped for a constructor-style
/// hand-off to an analog-signal container: sample arrays, timestamp array,
/// sample rate, step size and per-channel labels.
///
/// # Examples
///
/// ```no_run
/// use trodes_importer::{load_lfp, LfpOptions};
///
/// let bundle = load_lfp("path/to/session.LFP", &[1, 1], &[2, 4], &LfpOptions::default()).unwrap();
/// println!("{} channels, {:.1} s at {} Hz", bundle.n_channels(), bundle.duration(), bundle.fs);
/// ```
#[derive(Debug, Clone)]
pub struct LfpBundle {
    /// Voltage data in microvolts
    /// - Shape: [num_channels, num_samples]
    pub data: Array2<f64>,
    /// Sample times in seconds, shared by every channel
    pub timestamps: Array1<f64>,
    /// Sample rate of the data as loaded (Hz)
    pub fs: f64,
    /// Mean spacing of consecutive timestamps (seconds)
    pub step: f64,
    /// One label per channel, in request order. `None` marks a channel the
    /// caller left unlabeled.
    pub labels: Vec<Option<String>>,
    /// Target rate for a downstream resampling pass, when subsample-style
    /// decimation was requested at load time
    pub resample_to: Option<f64>,
}

impl LfpBundle {
    /// Returns the time span of the loaded data in seconds.
    pub fn duration(&self) -> f64 {
        match self.timestamps.len() {
            0 => 0.0,
            n => self.timestamps[n - 1] - self.timestamps[0],
        }
    }

    /// Returns the number of channels in the bundle.
    pub fn n_channels(&self) -> usize {
        self.data.shape()[0]
    }

    /// Returns the number of samples per channel.
    pub fn n_samples(&self) -> usize {
        self.timestamps.len()
    }
}

/// Error type for Trodes import operations.
#[derive(Debug, thiserror::Error)]
pub enum TrodesError {
    /// A settings preamble ended (or the file did) before the expected
    /// sentinel or setting line was found
    #[error("malformed settings header: {0}")]
    MalformedHeader(&'static str),
    /// The workspace configuration ended without the expected section
    #[error("{0} section not found in workspace configuration")]
    ConfigRegionNotFound(&'static str),
    /// Parallel input arrays have different lengths
    #[error("dimensionality mismatch: {0}")]
    DimensionalityMismatch(String),
    /// The binary payload does not divide evenly into records, or companion
    /// files disagree about the sample count
    #[error("corrupt binary payload: {0}")]
    CorruptBinaryPayload(String),
    /// The requested operation is not implemented
    #[error("not supported: {0}")]
    Unsupported(&'static str),
    /// An I/O error occurred during file reading
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// A general error with a custom message
    #[error("{0}")]
    Other(String),
}

/// Result type for Trodes import operations.
pub type Result<T> = std::result::Result<T, TrodesError>;
