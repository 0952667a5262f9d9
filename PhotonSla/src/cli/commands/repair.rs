//! CLI command for island repair

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::load_config;
use crate::cli::progress::{
    DISK, LOOKING_GLASS, WRENCH, phase_bar, print_done, print_step, update_bar,
};
use crate::formats::photon::PhotonFile;
use crate::progress::PhotonProgress;

/// `model.photon` -> `model_fixed.photon`
fn default_output(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{stem}_fixed.{}", ext.to_string_lossy()),
        None => format!("{stem}_fixed"),
    };
    source.with_file_name(name)
}

/// Run the full repair escalation and save the result.
pub fn execute(
    source: &Path,
    output: Option<&Path>,
    margin: Option<usize>,
    config: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    let started = Instant::now();
    let config = load_config(config)?;
    let margin = margin.unwrap_or(config.margin);
    let output = output.map_or_else(|| default_output(source), Path::to_path_buf);

    let pb = phase_bar(quiet);
    let callback = |p: &PhotonProgress| update_bar(&pb, p);

    if !quiet {
        print_step(1, 3, LOOKING_GLASS, "Analyzing layers...");
    }
    let mut file = PhotonFile::open(source, margin, Some(&callback))?;
    if !quiet {
        pb.println(file.layer_information());
        print_step(2, 3, WRENCH, "Repairing islands...");
    }

    let report = file.fix_all(Some(&callback), None)?;
    if !quiet {
        pb.println(report.summary());
        print_step(3, 3, DISK, &format!("Writing {}...", output.display()));
    }
    file.save(&output, Some(&callback))?;
    pb.finish_and_clear();

    println!("{}", file.layer_information());
    println!("{}", file.margin_information());
    file.close();

    if !quiet {
        print_done(started.elapsed());
    }
    Ok(())
}
