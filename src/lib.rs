//! Import library for SpikeGadgets Trodes export files.
//!
//! Trodes records into `.rec` files; the `exportLFP` and `exportdio` tools
//! from its distribution unpack those into per-channel `.dat` files inside
//! `.LFP` / `.DIO` directories. This crate parses the workspace
//! configuration embedded in the `.rec` (which tetrodes and digital inputs
//! exist) and loads the exported files into labeled arrays.

mod config;
mod decimate;
pub mod export;
mod reader;
pub mod types;

use std::path::Path;

// Re-export types
pub use types::*;

/// Enumerates the (tetrode, channel) pairs enabled in a `.rec` workspace,
/// honoring the disable lists.
///
/// Tetrode and channel numbering is 1-indexed, as in Trodes itself. Note the
/// disable-list semantics: a tetrode listed in `disable_tetrodes` with no
/// `disable_channels` entry is dropped entirely, while one with an entry
/// keeps the complement of the channels named there.
///
/// # Examples
///
/// ```no_run
/// use trodes_importer::load_tetrode_channels;
///
/// // everything except channels 2 and 3 of tetrode 7
/// let pairs = load_tetrode_channels("session.rec", &[7], Some(&[vec![2, 3]])).unwrap();
/// for p in &pairs {
///     println!("tetrode {} channel {}", p.tetrode, p.channel);
/// }
/// ```
pub fn load_tetrode_channels<P: AsRef<Path>>(
    rec_path: P,
    disable_tetrodes: &[u32],
    disable_channels: Option<&[Vec<u32>]>,
) -> Result<Vec<TetrodeChannel>> {
    config::load_tetrode_channels(rec_path, disable_tetrodes, disable_channels)
}

/// Enumerates the digital input channels (`Din` IDs) enabled in a `.rec`
/// workspace, skipping any in the disable list.
pub fn load_digital_channels<P: AsRef<Path>>(
    rec_path: P,
    disable_digital_channels: &[u32],
) -> Result<Vec<u32>> {
    config::load_digital_channels(rec_path, disable_digital_channels)
}

/// Loads LFP data for the requested (tetrode, channel) pairs from a `.LFP`
/// export directory into one labeled bundle.
///
/// # Examples
///
/// ```no_run
/// use trodes_importer::{load_lfp, LfpOptions};
///
/// // tetrode 1 channels 1 and 4, tetrode 3 channel 2
/// let bundle = load_lfp(
///     "session.LFP",
///     &[1, 1, 3],
///     &[1, 4, 2],
///     &LfpOptions::default(),
/// )
/// .unwrap();
/// println!("{} channels at {} Hz", bundle.n_channels(), bundle.fs);
/// ```
pub fn load_lfp<P: AsRef<Path>>(
    lfp_dir: P,
    tetrodes: &[u32],
    channels: &[u32],
    options: &LfpOptions,
) -> Result<LfpBundle> {
    reader::load_lfp_dir(lfp_dir, tetrodes, channels, options)
}

/// Loads all 4 channels of each requested tetrode, one bundle per tetrode,
/// with generated `t{tetrode}c{channel}` labels.
pub fn load_lfp_tetrodes<P: AsRef<Path>>(
    lfp_dir: P,
    tetrodes: &[u32],
    options: &LfpOptions,
) -> Result<Vec<LfpBundle>> {
    reader::load_lfp_tetrodes(lfp_dir, tetrodes, options)
}

/// Loads the state-change events of one digital input channel from a `.DIO`
/// export directory.
pub fn load_dio<P: AsRef<Path>>(dio_dir: P, channel: u32) -> Result<Vec<DioEvent>> {
    reader::load_dio_dir(dio_dir, channel)
}

/// Loads the state-change events of several digital input channels, in
/// request order.
pub fn load_dio_channels<P: AsRef<Path>>(
    dio_dir: P,
    channels: &[u32],
) -> Result<Vec<Vec<DioEvent>>> {
    reader::load_dio_channels(dio_dir, channels)
}

/// Extracts the acquisition sample rate from any export `.dat` file's
/// settings preamble.
pub fn acquisition_rate<P: AsRef<Path>>(path: P) -> Result<f64> {
    reader::acquisition_rate(path)
}

/// Reads the raw (undivided) u32 sample counters from a `.timestamps.dat`
/// export file.
pub fn load_raw_timestamps<P: AsRef<Path>>(path: P) -> Result<ndarray::Array1<u32>> {
    reader::load_raw_timestamps(path)
}

/// Spike waveform exports are not supported; this fails immediately.
pub fn load_spikes<P: AsRef<Path>>(_path: P) -> Result<()> {
    Err(TrodesError::Unsupported("spike waveform export parsing"))
}

/// Raw multiplexed `.dat` recordings (as written directly to an SD card) are
/// not supported; this fails immediately. Run exportLFP or exportdio on the
/// recording first and load the export directory instead.
pub fn load_raw_dat<P: AsRef<Path>>(_path: P) -> Result<()> {
    Err(TrodesError::Unsupported(
        "raw multiplexed .dat recordings; export with exportLFP/exportdio first",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_paths_fail_immediately() {
        assert!(matches!(
            load_spikes("session.spikes").unwrap_err(),
            TrodesError::Unsupported(_)
        ));
        assert!(matches!(
            load_raw_dat("session.dat").unwrap_err(),
            TrodesError::Unsupported(_)
        ));
    }
}
