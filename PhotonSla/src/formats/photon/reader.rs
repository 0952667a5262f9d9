//! Photon file reading
//!
//! SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::file::PhotonFile;
use super::header::PhotonHeader;
use super::layer::CompactLayer;
use super::preview::PreviewImage;
use crate::error::{Error, Result};
use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback, report};

/// Read a Photon file from disk and analyse it.
///
/// # Errors
///
/// Returns [`Error::IncompleteRead`] if fewer bytes arrive than the file
/// reports, [`Error::Io`] on other I/O failures, and [`Error::Format`] for
/// malformed contents.
///
/// [`Error::IncompleteRead`]: crate::Error::IncompleteRead
/// [`Error::Io`]: crate::Error::Io
/// [`Error::Format`]: crate::Error::Format
pub fn read_photon<P: AsRef<Path>>(
    path: P,
    margin: usize,
    progress: Option<ProgressCallback>,
) -> Result<PhotonFile> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let expected = file.metadata()?.len();
    let mut buffer = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut buffer)?;
    let actual = buffer.len() as u64;
    if actual < expected {
        return Err(Error::IncompleteRead { expected, actual });
    }
    tracing::debug!("Read {} bytes from {}", actual, path.display());
    parse_photon_bytes(&buffer, margin, progress)
}

/// Parse Photon data from bytes and analyse it.
///
/// Sections are read in dependency order: the header first, since it locates
/// everything else, then both previews, the version 2+ parameter blocks, and
/// finally the layer table with its payloads.
pub fn parse_photon_bytes(
    data: &[u8],
    margin: usize,
    progress: Option<ProgressCallback>,
) -> Result<PhotonFile> {
    report(progress, || PhotonProgress::new(PhotonPhase::ReadingHeader, 1, 1));
    let mut header = PhotonHeader::parse(data)?;
    tracing::debug!(
        "Photon v{}: {}x{}, {} layers, AA {}",
        header.version(),
        header.resolution_x(),
        header.resolution_y(),
        header.layer_count(),
        header.aa_levels()
    );

    report(progress, || PhotonProgress::new(PhotonPhase::ReadingPreviews, 1, 2));
    let large = PreviewImage::parse(data, header.offsets().preview_one as usize, "large preview")?;
    report(progress, || PhotonProgress::new(PhotonPhase::ReadingPreviews, 2, 2));
    let small = PreviewImage::parse(data, header.offsets().preview_two as usize, "small preview")?;

    if header.version() > 1 {
        header.read_parameters(data)?;
    }

    let layers = CompactLayer::read_layers(&header, data, progress)?;
    let mut file = PhotonFile::from_parts(header, [large, small], layers, margin);
    file.recalculate(progress);

    report(progress, || PhotonProgress::new(PhotonPhase::Complete, 1, 1));
    tracing::info!("Loaded Photon file with {} layers", file.layer_count());
    Ok(file)
}
