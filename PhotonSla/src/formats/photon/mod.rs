//! Photon / cbddlp SLA print-job format
//!
//! A Photon file is laid out top-down:
//!
//! ```text
//! [header][large preview][small preview]
//! [print parameters][machine info]        (version > 1)
//! [layer record table]                    (layer_count x aa_levels records)
//! [layer payloads]
//! ```
//!
//! Every section offset lives in the header. Offsets are computed once by
//! [`writer::compute_offsets`] from the sizes of the preceding sections and
//! handed to each section's writer.
//!
//! SPDX-License-Identifier: MIT

mod file;
mod header;
mod layer;
mod parameters;
mod preview;
mod reader;
pub mod rle;
mod writer;

pub use file::{PhotonFile, PhotonFileBuilder};
pub use header::{HEADER_SIZE_V1, PhotonHeader, ProjectionType};
pub use layer::CompactLayer;
pub use parameters::{MachineInfo, PrintParameters};
pub use preview::{PREVIEW_HEADER_SIZE, PreviewImage};
pub use reader::{parse_photon_bytes, read_photon};
pub use writer::{compute_offsets, serialize_photon, write_photon};

/// Photon file signature.
pub const PHOTON_MAGIC: u32 = 0x12FD_0019;

/// Newest file version this library reads and writes.
pub const MAX_VERSION: u32 = 3;

/// Upper bound on anti-aliasing levels.
pub const MAX_AA_LEVELS: u32 = 16;

/// Largest raster (width x height) accepted from a header or builder.
pub const MAX_PIXELS: usize = 1 << 28;

/// Size of one fixed layer record.
pub const LAYER_RECORD_SIZE: usize = 36;

/// Absolute offsets of every section after the header.
///
/// Zero means the section is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionOffsets {
    pub preview_one: u32,
    pub preview_two: u32,
    pub print_parameters: u32,
    pub machine_info: u32,
    pub layer_table: u32,
    /// First byte after the layer record table.
    pub payload_start: u32,
}
