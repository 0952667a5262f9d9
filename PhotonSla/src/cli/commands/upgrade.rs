//! CLI command for version and anti-aliasing upgrades

use std::path::Path;
use std::time::Instant;

use super::load_config;
use crate::cli::progress::{DISK, GEAR, LOOKING_GLASS, phase_bar, print_done, print_step, update_bar};
use crate::formats::photon::PhotonFile;
use crate::progress::PhotonProgress;

/// Upgrade to version 2 and optionally render `aa` anti-aliasing levels.
pub fn execute(
    source: &Path,
    output: &Path,
    aa: Option<u32>,
    config: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let config = load_config(config)?;
    let pb = phase_bar(quiet);
    let callback = |p: &PhotonProgress| update_bar(&pb, p);

    if !quiet {
        print_step(1, 3, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    }
    let mut file = PhotonFile::open(source, config.margin, Some(&callback))?;
    let from = file.version();

    if !quiet {
        print_step(2, 3, GEAR, "Upgrading...");
    }
    file.upgrade_to_version_2();
    if let Some(levels) = aa {
        file.set_aa_levels(levels)?;
        file.calculate_aa_layers(&config.aa_matrix(), Some(&callback));
    }
    file.recalculate(Some(&callback));

    if !quiet {
        print_step(3, 3, DISK, &format!("Writing {}...", output.display()));
    }
    file.save(output, Some(&callback))?;
    pb.finish_and_clear();

    println!(
        "Version {} -> {}, {} anti-aliasing level(s)",
        from,
        file.version(),
        file.aa_levels()
    );
    file.close();

    if !quiet {
        print_done(started.elapsed());
    }
    Ok(())
}
