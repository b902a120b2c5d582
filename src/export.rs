//! Rendered invocation contracts for the Trodes export executables.
//!
//! Export files are generated by `exportLFP` / `exportdio` from the Trodes
//! distribution, not by this crate. These types render the program path and
//! argument vector those tools expect so a caller can spawn them with
//! whatever process machinery it prefers; nothing here runs a process.

use std::path::{Path, PathBuf};

use crate::types::{Result, TrodesError};

/// Which channels an `exportLFP` run should extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSelection {
    /// `-everything 1`: all channels of every tetrode
    Everything,
    /// `-tetrode`/`-channel` comma lists, parallel by position
    Channels { tetrodes: Vec<u32>, channels: Vec<u32> },
}

/// An `exportLFP` invocation.
#[derive(Debug, Clone)]
pub struct ExportLfpCommand {
    /// The `.rec` file to export from
    pub rec_path: PathBuf,
    /// Subtract the workspace-configured reference channels (`-userefs`)
    pub userefs: bool,
    /// Channel selection
    pub selection: ExportSelection,
    /// Low-pass corner frequency in Hz; -1 leaves the filter off
    pub lowpass: i32,
    /// High-pass corner frequency in Hz; -1 leaves the filter off
    pub highpass: i32,
}

impl ExportLfpCommand {
    /// Export every channel of every tetrode.
    pub fn everything<P: AsRef<Path>>(rec_path: P) -> Self {
        ExportLfpCommand {
            rec_path: rec_path.as_ref().to_path_buf(),
            userefs: false,
            selection: ExportSelection::Everything,
            lowpass: -1,
            highpass: -1,
        }
    }

    /// Export specific (tetrode, channel) pairs. The two slices are parallel
    /// and must have the same length.
    pub fn channels<P: AsRef<Path>>(rec_path: P, tetrodes: &[u32], channels: &[u32]) -> Result<Self> {
        if tetrodes.len() != channels.len() {
            return Err(TrodesError::DimensionalityMismatch(format!(
                "{} tetrodes requested against {} channels",
                tetrodes.len(),
                channels.len()
            )));
        }
        Ok(ExportLfpCommand {
            rec_path: rec_path.as_ref().to_path_buf(),
            userefs: false,
            selection: ExportSelection::Channels {
                tetrodes: tetrodes.to_vec(),
                channels: channels.to_vec(),
            },
            lowpass: -1,
            highpass: -1,
        })
    }

    /// Path of the export executable under a Trodes installation directory.
    pub fn program<P: AsRef<Path>>(&self, trodes_dir: P) -> PathBuf {
        export_program(trodes_dir.as_ref(), "exportLFP")
    }

    /// The argument vector, ready for a process spawner.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-rec".to_string(),
            self.rec_path.display().to_string(),
            "-userefs".to_string(),
            if self.userefs { "1" } else { "0" }.to_string(),
        ];
        match &self.selection {
            ExportSelection::Everything => {
                args.push("-everything".to_string());
                args.push("1".to_string());
            }
            ExportSelection::Channels { tetrodes, channels } => {
                args.push("-tetrode".to_string());
                args.push(comma_list(tetrodes));
                args.push("-channel".to_string());
                args.push(comma_list(channels));
            }
        }
        args.push("-lowpass".to_string());
        args.push(self.lowpass.to_string());
        args.push("-highpass".to_string());
        args.push(self.highpass.to_string());
        args
    }
}

/// An `exportdio` invocation.
#[derive(Debug, Clone)]
pub struct ExportDioCommand {
    /// The `.rec` file to export from
    pub rec_path: PathBuf,
    /// Digital input channel numbers; rendered as `Din<N>` IDs
    pub channels: Vec<u32>,
}

impl ExportDioCommand {
    pub fn new<P: AsRef<Path>>(rec_path: P, channels: &[u32]) -> Self {
        ExportDioCommand {
            rec_path: rec_path.as_ref().to_path_buf(),
            channels: channels.to_vec(),
        }
    }

    /// Path of the export executable under a Trodes installation directory.
    pub fn program<P: AsRef<Path>>(&self, trodes_dir: P) -> PathBuf {
        export_program(trodes_dir.as_ref(), "exportdio")
    }

    /// The argument vector, ready for a process spawner.
    pub fn args(&self) -> Vec<String> {
        let channel_list = self
            .channels
            .iter()
            .map(|c| format!("Din{}", c))
            .collect::<Vec<_>>()
            .join(",");
        vec![
            "-rec".to_string(),
            self.rec_path.display().to_string(),
            "-channel".to_string(),
            channel_list,
        ]
    }
}

fn export_program(trodes_dir: &Path, name: &str) -> PathBuf {
    if cfg!(windows) {
        trodes_dir.join("bin").join("win32").join(format!("{}.exe", name))
    } else {
        trodes_dir.join("bin").join(name)
    }
}

fn comma_list(values: &[u32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lfp_channel_args_follow_the_flag_contract() {
        let cmd = ExportLfpCommand::channels("/data/session.rec", &[1, 1, 3], &[2, 4, 1]).unwrap();
        assert_eq!(
            cmd.args(),
            vec![
                "-rec",
                "/data/session.rec",
                "-userefs",
                "0",
                "-tetrode",
                "1,1,3",
                "-channel",
                "2,4,1",
                "-lowpass",
                "-1",
                "-highpass",
                "-1",
            ]
        );
    }

    #[test]
    fn lfp_everything_args_drop_the_channel_lists() {
        let mut cmd = ExportLfpCommand::everything("/data/session.rec");
        cmd.userefs = true;
        cmd.lowpass = 400;
        assert_eq!(
            cmd.args(),
            vec![
                "-rec",
                "/data/session.rec",
                "-userefs",
                "1",
                "-everything",
                "1",
                "-lowpass",
                "400",
                "-highpass",
                "-1",
            ]
        );
    }

    #[test]
    fn mismatched_selection_lists_are_rejected() {
        let err = ExportLfpCommand::channels("/data/session.rec", &[1, 2], &[1]).unwrap_err();
        assert!(matches!(err, TrodesError::DimensionalityMismatch(_)));
    }

    #[test]
    fn dio_args_render_din_ids() {
        let cmd = ExportDioCommand::new("/data/session.rec", &[1, 12]);
        assert_eq!(
            cmd.args(),
            vec!["-rec", "/data/session.rec", "-channel", "Din1,Din12"]
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn program_paths_sit_under_bin() {
        let cmd = ExportLfpCommand::everything("/data/session.rec");
        assert_eq!(
            cmd.program("/opt/trodes"),
            PathBuf::from("/opt/trodes/bin/exportLFP")
        );
        let dio = ExportDioCommand::new("/data/session.rec", &[1]);
        assert_eq!(
            dio.program("/opt/trodes"),
            PathBuf::from("/opt/trodes/bin/exportdio")
        );
    }
}
