//! CLI command for island, margin and drift checks

use std::path::Path;
use std::time::Instant;

use super::load_config;
use crate::cli::progress::{LOOKING_GLASS, phase_bar, print_done, print_step, update_bar};
use crate::formats::photon::PhotonFile;
use crate::progress::PhotonProgress;

/// Analyse a file and print its diagnostics. Nothing is modified.
pub fn execute(
    source: &Path,
    margin: Option<usize>,
    config: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let config = load_config(config)?;
    let margin = margin.unwrap_or(config.margin);

    if !quiet {
        print_step(1, 1, LOOKING_GLASS, &format!("Analyzing {}...", source.display()));
    }
    let pb = phase_bar(quiet);
    let callback = |p: &PhotonProgress| update_bar(&pb, p);
    let file = PhotonFile::open(source, margin, Some(&callback))?;
    pb.finish_and_clear();

    println!("{}", file.information());
    println!("{}", file.layer_information());
    println!("{}", file.margin_information());
    if let Some(drift) = file.z_drift() {
        println!("Z drift: {drift:.4} mm");
    }
    file.close();

    if !quiet {
        print_done(started.elapsed());
    }
    Ok(())
}
