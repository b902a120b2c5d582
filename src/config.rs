//! Topology scanning for the XML-like configuration block at the top of a
//! Trodes `.rec` file.
//!
//! The configuration is line-oriented text bounded by `<Configuration>` and
//! `</Configuration>`, followed by raw packet data. No XML parser is needed
//! (or wanted, since the surrounding file is binary): an explicit region
//! state machine walks the line stream and pulls `id="..."` attributes out of
//! the sections it cares about.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::types::{Result, TetrodeChannel, TrodesError};

const CONFIG_END: &str = "</Configuration>";
const SPIKE_START: &str = "<SpikeConfiguration>";
const SPIKE_END: &str = "</SpikeConfiguration>";
const AUX_START: &str = "<AuxDisplayConfiguration>";
const AUX_END: &str = "</AuxDisplayConfiguration>";

/// Where the scanner currently is relative to the section it is extracting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Outside,
    Inside,
    Done,
}

/// Enumerates the (tetrode, channel) pairs enabled in a `.rec` workspace.
///
/// Every tetrode found in the `<SpikeConfiguration>` section contributes its
/// 4 channels in ascending order, unless it appears in `disable_tetrodes`.
/// A disabled tetrode contributes nothing. When `disable_channels` is
/// supplied it instead contributes the complement of its entry there
/// (so `disable_channels[i] = [2, 3]` keeps channels 1 and 4 of
/// `disable_tetrodes[i]`). Callers relying on the disable lists should note
/// that asymmetry: omitting `disable_channels` drops a disabled tetrode
/// entirely rather than keeping all 4 channels.
///
/// `disable_channels`, when given, must have exactly one entry per disabled
/// tetrode; anything else fails before the file is opened.
pub fn load_tetrode_channels<P: AsRef<Path>>(
    rec_path: P,
    disable_tetrodes: &[u32],
    disable_channels: Option<&[Vec<u32>]>,
) -> Result<Vec<TetrodeChannel>> {
    if let Some(dc) = disable_channels {
        if dc.len() != disable_tetrodes.len() {
            return Err(TrodesError::DimensionalityMismatch(format!(
                "disable_tetrodes has {} entries but disable_channels has {}",
                disable_tetrodes.len(),
                dc.len()
            )));
        }
    }

    // Positional coupling between the two disable lists ends here: everything
    // below looks tetrodes up by ID.
    let mut disabled: HashMap<u32, Option<&[u32]>> = HashMap::new();
    for (i, &t) in disable_tetrodes.iter().enumerate() {
        disabled.insert(t, disable_channels.map(|dc| dc[i].as_slice()));
    }

    let file = File::open(rec_path.as_ref())?;
    let mut reader = BufReader::new(file);

    let mut pairs = Vec::new();
    scan_region(
        &mut reader,
        SPIKE_START,
        SPIKE_END,
        "SpikeConfiguration",
        |line| {
            let Some(id) = quoted_id(line) else {
                return Ok(());
            };
            let tetrode: u32 = id.parse().map_err(|_| {
                TrodesError::Other(format!("invalid tetrode id \"{}\" in workspace configuration", id))
            })?;
            match disabled.get(&tetrode) {
                None => {
                    for channel in 1..=4 {
                        pairs.push(TetrodeChannel { tetrode, channel });
                    }
                }
                Some(Some(chans)) => {
                    debug!("disabling tetrode {} channel(s) {:?}", tetrode, chans);
                    for channel in 1..=4 {
                        if !chans.contains(&channel) {
                            pairs.push(TetrodeChannel { tetrode, channel });
                        }
                    }
                }
                Some(None) => {
                    debug!("disabling tetrode {}", tetrode);
                }
            }
            Ok(())
        },
    )?;

    if pairs.is_empty() {
        warn!("no enabled tetrode channels found in {}", rec_path.as_ref().display());
    }
    Ok(pairs)
}

/// Enumerates the digital input channels (`Din` IDs) enabled in a `.rec`
/// workspace, skipping any listed in `disable_digital_channels`.
pub fn load_digital_channels<P: AsRef<Path>>(
    rec_path: P,
    disable_digital_channels: &[u32],
) -> Result<Vec<u32>> {
    let file = File::open(rec_path.as_ref())?;
    let mut reader = BufReader::new(file);

    let mut channels = Vec::new();
    scan_region(
        &mut reader,
        AUX_START,
        AUX_END,
        "AuxDisplayConfiguration",
        |line| {
            if let Some(din) = din_id(line) {
                if disable_digital_channels.contains(&din) {
                    debug!("disabling digital input {}", din);
                } else {
                    channels.push(din);
                }
            }
            Ok(())
        },
    )?;

    if channels.is_empty() {
        warn!("no enabled digital inputs found in {}", rec_path.as_ref().display());
    }
    Ok(channels)
}

/// Walks the configuration line stream, feeding every line inside the
/// `start_tag`..`end_tag` section to `on_line`.
///
/// The scan ends at `end_tag`, at the outer `</Configuration>` sentinel, or
/// at end of stream, whichever comes first. Never observing `start_tag` at
/// all is fatal: a workspace without the section cannot satisfy the request.
fn scan_region<R: BufRead>(
    reader: &mut R,
    start_tag: &str,
    end_tag: &str,
    section: &'static str,
    mut on_line: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let mut state = Region::Outside;
    let mut buf = Vec::new();

    while state != Region::Done {
        let Some(line) = next_line(reader, &mut buf)? else {
            break;
        };
        match state {
            Region::Outside => {
                if line.contains(CONFIG_END) {
                    break;
                }
                if line.contains(start_tag) {
                    state = Region::Inside;
                }
            }
            Region::Inside => {
                if line.contains(end_tag) {
                    state = Region::Done;
                } else {
                    on_line(&line)?;
                }
            }
            Region::Done => unreachable!(),
        }
    }

    if state == Region::Outside {
        return Err(TrodesError::ConfigRegionNotFound(section));
    }
    Ok(())
}

/// Reads one `\n`-terminated line as (lossy) text, or `None` at end of
/// stream. The `.rec` payload past the configuration block is raw binary, so
/// lines are pulled as bytes and converted lossily rather than trusting the
/// whole stream to be UTF-8.
fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Extracts the value of the first `id="..."` attribute on the line,
/// scanning forward to the closing quote so multi-digit IDs survive.
fn quoted_id(line: &str) -> Option<&str> {
    let start = line.find("id=\"")? + 4;
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

/// Extracts `K` from an `id="DinK"` attribute. `K` is taken as the run of
/// digits after the prefix; an element with no digits there is ignored.
fn din_id(line: &str) -> Option<u32> {
    let start = line.find("id=\"Din")? + 7;
    let digits: &str = {
        let rest = &line[start..];
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn rec_fixture(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        // binary packet data follows the configuration in a real .rec
        file.write_all(&[0x00, 0xff, 0x13, 0x37, 0x00]).unwrap();
        file.flush().unwrap();
        file
    }

    const FULL_CONFIG: &str = "<Configuration>\n\
         <GlobalConfiguration realtimeMode=\"0\"/>\n\
         <SpikeConfiguration>\n\
          <SpikeNTrode id=\"1\" LFPChan=\"1\" refOn=\"0\">\n\
           <SpikeChannel hwChan=\"0\"/>\n\
           <SpikeChannel hwChan=\"1\"/>\n\
           <SpikeChannel hwChan=\"2\"/>\n\
           <SpikeChannel hwChan=\"3\"/>\n\
          </SpikeNTrode>\n\
          <SpikeNTrode id=\"2\" LFPChan=\"1\" refOn=\"0\">\n\
          </SpikeNTrode>\n\
          <SpikeNTrode id=\"14\" LFPChan=\"2\" refOn=\"0\">\n\
          </SpikeNTrode>\n\
         </SpikeConfiguration>\n\
         <AuxDisplayConfiguration>\n\
          <DispChannel id=\"Din1\" analyze=\"1\"/>\n\
          <DispChannel id=\"Din2\" analyze=\"0\"/>\n\
          <DispChannel id=\"Din12\" analyze=\"1\"/>\n\
          <DispChannel id=\"Dout3\" analyze=\"0\"/>\n\
         </AuxDisplayConfiguration>\n\
        </Configuration>\n";

    #[test]
    fn enumerates_four_channels_per_tetrode_in_order() {
        let file = rec_fixture(FULL_CONFIG);
        let pairs = load_tetrode_channels(file.path(), &[], None).unwrap();
        assert_eq!(pairs.len(), 12);
        for (i, expected_tetrode) in [1u32, 2, 14].iter().enumerate() {
            for channel in 1..=4u32 {
                let pair = pairs[i * 4 + (channel as usize - 1)];
                assert_eq!(pair.tetrode, *expected_tetrode);
                assert_eq!(pair.channel, channel);
            }
        }
    }

    #[test]
    fn disabled_tetrode_without_channel_list_is_dropped() {
        let file = rec_fixture(FULL_CONFIG);
        let all = load_tetrode_channels(file.path(), &[], None).unwrap();
        let pairs = load_tetrode_channels(file.path(), &[2], None).unwrap();
        assert_eq!(pairs.len(), all.len() - 4);
        assert!(pairs.iter().all(|p| p.tetrode != 2));
    }

    #[test]
    fn disabled_channels_keep_the_complement() {
        let file = rec_fixture(FULL_CONFIG);
        let pairs = load_tetrode_channels(file.path(), &[14], Some(&[vec![2, 3]])).unwrap();
        let t14: Vec<u32> = pairs.iter().filter(|p| p.tetrode == 14).map(|p| p.channel).collect();
        assert_eq!(t14, vec![1, 4]);
        // the other tetrodes are untouched
        assert_eq!(pairs.len(), 8 + 2);
    }

    #[test]
    fn mismatched_disable_lists_fail_before_io() {
        let err = load_tetrode_channels(
            Path::new("/nonexistent/never_opened.rec"),
            &[1, 2],
            Some(&[vec![1]]),
        )
        .unwrap_err();
        assert!(matches!(err, TrodesError::DimensionalityMismatch(_)));
    }

    #[test]
    fn missing_spike_section_is_fatal() {
        let file = rec_fixture(
            "<Configuration>\n\
              <AuxDisplayConfiguration>\n\
               <DispChannel id=\"Din1\"/>\n\
              </AuxDisplayConfiguration>\n\
             </Configuration>\n",
        );
        let err = load_tetrode_channels(file.path(), &[], None).unwrap_err();
        assert!(matches!(err, TrodesError::ConfigRegionNotFound("SpikeConfiguration")));
    }

    #[test]
    fn empty_spike_section_yields_empty_set() {
        let file = rec_fixture(
            "<Configuration>\n\
              <SpikeConfiguration>\n\
              </SpikeConfiguration>\n\
             </Configuration>\n",
        );
        let pairs = load_tetrode_channels(file.path(), &[], None).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn digital_inputs_parse_one_and_two_digit_ids() {
        let file = rec_fixture(FULL_CONFIG);
        let channels = load_digital_channels(file.path(), &[]).unwrap();
        assert_eq!(channels, vec![1, 2, 12]);
    }

    #[test]
    fn digital_disable_list_is_applied() {
        let file = rec_fixture(FULL_CONFIG);
        let channels = load_digital_channels(file.path(), &[2, 12]).unwrap();
        assert_eq!(channels, vec![1]);
    }

    #[test]
    fn missing_aux_section_is_fatal() {
        let file = rec_fixture(
            "<Configuration>\n\
              <SpikeConfiguration>\n\
               <SpikeNTrode id=\"1\"/>\n\
              </SpikeConfiguration>\n\
             </Configuration>\n",
        );
        let err = load_digital_channels(file.path(), &[]).unwrap_err();
        assert!(matches!(err, TrodesError::ConfigRegionNotFound("AuxDisplayConfiguration")));
    }

    #[test]
    fn quoted_id_scans_to_closing_quote() {
        assert_eq!(quoted_id("  <SpikeNTrode id=\"128\" refOn=\"0\">"), Some("128"));
        assert_eq!(quoted_id("  <SpikeChannel hwChan=\"3\"/>"), None);
    }
}
