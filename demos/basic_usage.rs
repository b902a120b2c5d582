use std::error::Error;
use trodes_importer::{load_dio, load_lfp, load_tetrode_channels, LfpOptions};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Which tetrodes and channels does the workspace enable?
    let pairs = load_tetrode_channels("data/session.rec", &[], None)?;
    println!("Workspace enables {} tetrode channels:", pairs.len());
    for pair in pairs.iter().take(8) {
        println!("  tetrode {} channel {}", pair.tetrode, pair.channel);
    }
    if pairs.len() > 8 {
        println!("  ... and {} more", pairs.len() - 8);
    }

    // Load two channels of tetrode 1 from the exportLFP output
    let bundle = load_lfp(
        "data/session.LFP",
        &[1, 1],
        &[1, 4],
        &LfpOptions::default(),
    )?;

    println!("\nLFP bundle:");
    println!("  {} channels x {} samples", bundle.n_channels(), bundle.n_samples());
    println!("  Sample rate: {} Hz, step {:.6} s", bundle.fs, bundle.step);
    println!("  Duration: {:.3} seconds", bundle.duration());
    for (label, row) in bundle.labels.iter().zip(bundle.data.rows()) {
        let name = label.as_deref().unwrap_or("<unlabeled>");
        let first = if row.is_empty() { 0.0 } else { row[0] };
        println!("  {}: first sample {:.3} uV", name, first);
    }

    // Digital input events from the exportdio output
    let events = load_dio("data/session.DIO", 1)?;
    println!("\nDin1: {} state changes", events.len());
    for event in events.iter().take(5) {
        println!("  t={} state={}", event.time, event.state);
    }

    Ok(())
}
