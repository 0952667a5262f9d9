//! Photon file writing
//!
//! The offset table is computed once, top-down, before any byte is written.
//! Layers are then written in three phases:
//!
//! 1. payload addresses are assigned in read order, each layer followed by
//!    its AA companions
//! 2. the fixed record table is written level by level (all base layers, then
//!    every layer's first companion, and so on) so single-level readers find
//!    the base layers first
//! 3. payloads are written in the order their addresses were assigned
//!
//! SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::file::PhotonFile;
use super::{LAYER_RECORD_SIZE, PrintParameters, SectionOffsets};
use crate::error::{FormatError, Result};
use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback, report};

/// Compute every section offset from the current section sizes.
pub fn compute_offsets(file: &PhotonFile) -> Result<SectionOffsets> {
    let header = &file.header;
    let [large, small] = &file.previews;

    let preview_one = header.byte_size();
    let preview_two = preview_one + large.byte_size();
    let mut cursor = preview_two + small.byte_size();

    let mut print_parameters = 0;
    let mut machine_info = 0;
    if header.version() > 1 {
        print_parameters = cursor;
        cursor += PrintParameters::BYTE_SIZE;
        if let Some(info) = header.machine_info().filter(|info| !info.is_empty()) {
            machine_info = cursor;
            cursor += info.byte_size();
        }
    }

    let layer_table = cursor;
    let records = file.layers.len() * header.aa_levels() as usize;
    let payload_start = layer_table + records * LAYER_RECORD_SIZE;

    Ok(SectionOffsets {
        preview_one: to_offset(preview_one)?,
        preview_two: to_offset(preview_two)?,
        print_parameters: to_offset(print_parameters)?,
        machine_info: to_offset(machine_info)?,
        layer_table: to_offset(layer_table)?,
        payload_start: to_offset(payload_start)?,
    })
}

fn to_offset(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| FormatError::Inconsistent(format!("offset {value} exceeds 32 bits")).into())
}

/// Serialize a Photon file to bytes.
///
/// Updates the header's layer count and recorded offsets, and every layer's
/// payload address, to match what was written.
pub fn serialize_photon(
    file: &mut PhotonFile,
    progress: Option<ProgressCallback>,
) -> Result<Vec<u8>> {
    let levels = file.header.aa_levels() as usize;
    if let Some(index) = file
        .layers
        .iter()
        .position(|layer| layer.companions().len() != levels - 1)
    {
        return Err(FormatError::Inconsistent(format!(
            "layer {index} has {} AA companions, expected {}",
            file.layers[index].companions().len(),
            levels - 1
        ))
        .into());
    }
    if file.header.version() > 1 && file.header.print_parameters().is_none() {
        file.header.print_parameters = Some(PrintParameters::with_bottom_layers(file.header.bottom_layers()));
    }

    file.header.set_layer_count(file.layers.len() as u32);
    let offsets = compute_offsets(file)?;
    tracing::debug!("Section offsets: {:?}", offsets);

    let mut out = Vec::new();
    file.header.write(&mut out, &offsets)?;
    file.previews[0].write(&mut out, offsets.preview_one)?;
    file.previews[1].write(&mut out, offsets.preview_two)?;
    if file.header.version() > 1 {
        if let Some(parameters) = file.header.print_parameters() {
            parameters.write(&mut out)?;
        }
        if let Some(info) = file.header.machine_info() {
            info.write(&mut out, offsets.machine_info)?;
        }
    }
    debug_assert_eq!(out.len(), offsets.layer_table as usize);

    // Phase 1: addresses in read order
    let mut position = offsets.payload_start;
    for layer in &mut file.layers {
        position = layer.assign_address(position)?;
        for companion in layer.companions_mut() {
            position = companion.assign_address(position)?;
        }
    }

    // Phase 2: records level by level
    let total = file.layers.len();
    for (index, layer) in file.layers.iter().enumerate() {
        report(progress, || PhotonProgress::new(PhotonPhase::Writing, index + 1, total));
        layer.write_record(&mut out)?;
    }
    for level in 0..levels - 1 {
        for layer in &file.layers {
            layer.companions()[level].write_record(&mut out)?;
        }
    }
    debug_assert_eq!(out.len(), offsets.payload_start as usize);

    // Phase 3: payloads in address order
    for layer in &file.layers {
        layer.write_payload(&mut out)?;
        for companion in layer.companions() {
            companion.write_payload(&mut out)?;
        }
    }

    file.header.set_offsets(offsets);
    Ok(out)
}

/// Write a Photon file to disk.
///
/// # Errors
/// Returns an error if the layer list is inconsistent with the header or the
/// file cannot be written.
pub fn write_photon<P: AsRef<Path>>(
    path: P,
    file: &mut PhotonFile,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = serialize_photon(file, progress)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    report(progress, || PhotonProgress::new(PhotonPhase::Complete, 1, 1));
    tracing::info!("Saved {} layers ({} bytes) to {}", file.layer_count(), bytes.len(), path.display());
    Ok(())
}
