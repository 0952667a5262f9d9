//! Photon file header: global print parameters and the section offset table
//!
//! SPDX-License-Identifier: MIT

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::layer::CompactLayer;
use super::parameters::{MachineInfo, PrintParameters};
use super::{MAX_AA_LEVELS, MAX_PIXELS, MAX_VERSION, PHOTON_MAGIC, SectionOffsets};
use crate::error::{Error, FormatError, Result};

/// Header size for version 1 files; version 2+ adds the machine-info size field.
pub const HEADER_SIZE_V1: usize = 108;

/// Reject empty rasters and rasters too large to expand in memory.
pub(crate) fn check_resolution(x: u32, y: u32) -> Result<()> {
    let pixels = (x as usize).checked_mul(y as usize);
    match pixels {
        Some(pixels) if pixels > 0 && pixels <= MAX_PIXELS => Ok(()),
        _ => Err(FormatError::InvalidResolution { x, y }.into()),
    }
}

/// How the image is projected onto the vat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionType {
    #[default]
    Cast,
    LcdMirror,
    /// Any value this library does not interpret; preserved on write.
    Other(u32),
}

impl ProjectionType {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ProjectionType::Cast,
            1 => ProjectionType::LcdMirror,
            other => ProjectionType::Other(other),
        }
    }

    #[must_use]
    pub fn to_raw(self) -> u32 {
        match self {
            ProjectionType::Cast => 0,
            ProjectionType::LcdMirror => 1,
            ProjectionType::Other(raw) => raw,
        }
    }
}

/// Photon header.
///
/// Offsets read from disk are kept for inspection; they are never reused when
/// writing. The writer computes a fresh [`SectionOffsets`] and passes it in.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotonHeader {
    magic: u32,
    version: u32,
    bed_x_mm: f32,
    bed_y_mm: f32,
    bed_z_mm: f32,
    reserved_a: [u32; 3],
    layer_height_mm: f32,
    exposure_s: f32,
    bottom_exposure_s: f32,
    off_time_s: f32,
    bottom_layers: u32,
    resolution_x: u32,
    resolution_y: u32,
    layer_count: u32,
    print_time_s: u32,
    projection: ProjectionType,
    aa_level: u32,
    light_pwm: u16,
    bottom_light_pwm: u16,
    reserved_b: u32,
    machine_info_size: u32,
    print_parameters_size: u32,
    offsets: SectionOffsets,
    pub(crate) print_parameters: Option<PrintParameters>,
    pub(crate) machine_info: Option<MachineInfo>,
}

impl PhotonHeader {
    /// A version 1 header with stock Photon settings for the given resolution.
    #[must_use]
    pub fn new(resolution_x: u32, resolution_y: u32) -> Self {
        Self {
            magic: PHOTON_MAGIC,
            version: 1,
            bed_x_mm: 68.04,
            bed_y_mm: 120.96,
            bed_z_mm: 150.0,
            reserved_a: [0; 3],
            layer_height_mm: 0.05,
            exposure_s: 8.0,
            bottom_exposure_s: 60.0,
            off_time_s: 1.0,
            bottom_layers: 8,
            resolution_x,
            resolution_y,
            layer_count: 0,
            print_time_s: 0,
            projection: ProjectionType::Cast,
            aa_level: 1,
            light_pwm: 255,
            bottom_light_pwm: 255,
            reserved_b: 0,
            machine_info_size: 0,
            print_parameters_size: 0,
            offsets: SectionOffsets::default(),
            print_parameters: None,
            machine_info: None,
        }
    }

    /// Parse the header from the start of `data`.
    ///
    /// Print parameters and machine info are read separately by
    /// [`PhotonHeader::read_parameters`] once previews are located.
    pub fn parse(data: &[u8]) -> Result<Self> {
        FormatError::check_span("header", 0, HEADER_SIZE_V1, data.len())?;
        let mut cursor = Cursor::new(data);

        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != PHOTON_MAGIC {
            return Err(FormatError::InvalidMagic {
                expected: PHOTON_MAGIC,
                found: magic,
            }
            .into());
        }
        let version = cursor.read_u32::<LittleEndian>()?;
        if !(1..=MAX_VERSION).contains(&version) {
            return Err(FormatError::UnsupportedVersion(version).into());
        }

        let bed_x_mm = cursor.read_f32::<LittleEndian>()?;
        let bed_y_mm = cursor.read_f32::<LittleEndian>()?;
        let bed_z_mm = cursor.read_f32::<LittleEndian>()?;
        let mut reserved_a = [0u32; 3];
        for value in &mut reserved_a {
            *value = cursor.read_u32::<LittleEndian>()?;
        }

        let layer_height_mm = cursor.read_f32::<LittleEndian>()?;
        let exposure_s = cursor.read_f32::<LittleEndian>()?;
        let bottom_exposure_s = cursor.read_f32::<LittleEndian>()?;
        let off_time_s = cursor.read_f32::<LittleEndian>()?;
        let bottom_layers = cursor.read_u32::<LittleEndian>()?;

        let resolution_x = cursor.read_u32::<LittleEndian>()?;
        let resolution_y = cursor.read_u32::<LittleEndian>()?;

        let preview_one = cursor.read_u32::<LittleEndian>()?;
        let layer_table = cursor.read_u32::<LittleEndian>()?;
        let layer_count = cursor.read_u32::<LittleEndian>()?;
        let preview_two = cursor.read_u32::<LittleEndian>()?;
        let print_time_s = cursor.read_u32::<LittleEndian>()?;
        let projection = ProjectionType::from_raw(cursor.read_u32::<LittleEndian>()?);

        let print_parameters_offset = cursor.read_u32::<LittleEndian>()?;
        let print_parameters_size = cursor.read_u32::<LittleEndian>()?;
        let aa_level = cursor.read_u32::<LittleEndian>()?;

        let light_pwm = cursor.read_u16::<LittleEndian>()?;
        let bottom_light_pwm = cursor.read_u16::<LittleEndian>()?;

        let reserved_b = cursor.read_u32::<LittleEndian>()?;
        let machine_info_offset = cursor.read_u32::<LittleEndian>()?;
        let machine_info_size = if version > 1 {
            FormatError::check_span("header", 0, HEADER_SIZE_V1 + 4, data.len())?;
            cursor.read_u32::<LittleEndian>()?
        } else {
            0
        };

        let header = Self {
            magic,
            version,
            bed_x_mm,
            bed_y_mm,
            bed_z_mm,
            reserved_a,
            layer_height_mm,
            exposure_s,
            bottom_exposure_s,
            off_time_s,
            bottom_layers,
            resolution_x,
            resolution_y,
            layer_count,
            print_time_s,
            projection,
            aa_level,
            light_pwm,
            bottom_light_pwm,
            reserved_b,
            machine_info_size,
            print_parameters_size,
            offsets: SectionOffsets {
                preview_one,
                preview_two,
                print_parameters: print_parameters_offset,
                machine_info: machine_info_offset,
                layer_table,
                payload_start: 0,
            },
            print_parameters: None,
            machine_info: None,
        };
        header.validate(data.len())?;
        Ok(header)
    }

    /// Reject headers whose fields contradict each other or the buffer.
    fn validate(&self, available: usize) -> Result<()> {
        check_resolution(self.resolution_x, self.resolution_y)?;
        if self.version > 1 {
            if self.offsets.print_parameters == 0 {
                return Err(FormatError::Inconsistent(format!(
                    "version {} file has no print parameter block",
                    self.version
                ))
                .into());
            }
            if self.aa_level == 0 {
                return Err(FormatError::Inconsistent(format!(
                    "version {} file declares an anti-aliasing level of 0",
                    self.version
                ))
                .into());
            }
        }

        let mut sections = vec![
            ("large preview", self.offsets.preview_one),
            ("small preview", self.offsets.preview_two),
            ("layer table", self.offsets.layer_table),
        ];
        if self.version > 1 {
            sections.push(("print parameters", self.offsets.print_parameters));
            if self.machine_info_size > 0 {
                sections.push(("machine info", self.offsets.machine_info));
            }
        }
        for (section, offset) in sections {
            if offset as usize > available {
                return Err(FormatError::OffsetOutOfBounds {
                    section,
                    offset: offset as usize,
                    available,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Read the version 2+ print parameter and machine info blocks.
    pub fn read_parameters(&mut self, data: &[u8]) -> Result<()> {
        self.print_parameters = Some(PrintParameters::parse(
            data,
            self.offsets.print_parameters as usize,
        )?);
        self.machine_info = Some(MachineInfo::parse(
            data,
            self.offsets.machine_info as usize,
            self.machine_info_size as usize,
        )?);
        Ok(())
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        if self.version > 1 {
            HEADER_SIZE_V1 + 4
        } else {
            HEADER_SIZE_V1
        }
    }

    /// Write the header using offsets computed by the caller.
    pub fn write<W: Write>(&self, writer: &mut W, offsets: &SectionOffsets) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;

        writer.write_f32::<LittleEndian>(self.bed_x_mm)?;
        writer.write_f32::<LittleEndian>(self.bed_y_mm)?;
        writer.write_f32::<LittleEndian>(self.bed_z_mm)?;
        for value in self.reserved_a {
            writer.write_u32::<LittleEndian>(value)?;
        }

        writer.write_f32::<LittleEndian>(self.layer_height_mm)?;
        writer.write_f32::<LittleEndian>(self.exposure_s)?;
        writer.write_f32::<LittleEndian>(self.bottom_exposure_s)?;
        writer.write_f32::<LittleEndian>(self.off_time_s)?;
        writer.write_u32::<LittleEndian>(self.bottom_layers)?;

        writer.write_u32::<LittleEndian>(self.resolution_x)?;
        writer.write_u32::<LittleEndian>(self.resolution_y)?;

        writer.write_u32::<LittleEndian>(offsets.preview_one)?;
        writer.write_u32::<LittleEndian>(offsets.layer_table)?;
        writer.write_u32::<LittleEndian>(self.layer_count)?;
        writer.write_u32::<LittleEndian>(offsets.preview_two)?;
        writer.write_u32::<LittleEndian>(self.print_time_s)?;
        writer.write_u32::<LittleEndian>(self.projection.to_raw())?;

        writer.write_u32::<LittleEndian>(offsets.print_parameters)?;
        writer.write_u32::<LittleEndian>(self.print_parameters_size_on_disk())?;
        writer.write_u32::<LittleEndian>(self.aa_level)?;

        writer.write_u16::<LittleEndian>(self.light_pwm)?;
        writer.write_u16::<LittleEndian>(self.bottom_light_pwm)?;

        writer.write_u32::<LittleEndian>(self.reserved_b)?;
        writer.write_u32::<LittleEndian>(offsets.machine_info)?;
        if self.version > 1 {
            writer.write_u32::<LittleEndian>(self.machine_info_size_on_disk())?;
        }
        Ok(())
    }

    fn print_parameters_size_on_disk(&self) -> u32 {
        if self.version > 1 {
            PrintParameters::BYTE_SIZE as u32
        } else {
            self.print_parameters_size
        }
    }

    fn machine_info_size_on_disk(&self) -> u32 {
        self.machine_info
            .as_ref()
            .map_or(0, |info| info.block_size() as u32)
    }

    /// Record the offsets used by the last successful write.
    pub(crate) fn set_offsets(&mut self, offsets: SectionOffsets) {
        self.offsets = offsets;
        if self.version > 1 {
            self.print_parameters_size = PrintParameters::BYTE_SIZE as u32;
            self.machine_info_size = self.machine_info_size_on_disk();
        }
    }

    /// Change the number of anti-aliasing levels, adding or dropping each
    /// layer's companion sub-layers to match.
    ///
    /// New companions start as copies of their base layer. Derived analysis
    /// data is not refreshed.
    pub fn set_aa_levels(&mut self, levels: u32, layers: &mut [CompactLayer]) -> Result<()> {
        if self.version <= 1 {
            return Err(Error::AntiAliasingUnsupported {
                version: self.version,
            });
        }
        if levels == 0 || levels > MAX_AA_LEVELS {
            return Err(Error::InvalidAntiAliasingLevel { levels });
        }
        let companions = (levels - 1) as usize;
        for layer in layers.iter_mut() {
            layer.resize_companions(companions);
        }
        self.aa_level = levels;
        Ok(())
    }

    /// Switch to a different file version, resetting anti-aliasing and
    /// light settings and creating default print parameters.
    pub fn set_file_version(&mut self, version: u32) {
        self.version = version;
        self.aa_level = 1;
        self.light_pwm = 255;
        self.bottom_light_pwm = 255;
        if version > 1 {
            self.print_parameters = Some(PrintParameters::with_bottom_layers(self.bottom_layers));
            if self.machine_info.is_none() {
                self.machine_info = Some(MachineInfo::empty());
            }
        } else {
            self.print_parameters = None;
            self.machine_info = None;
        }
    }

    /// One-line summary of the exposure settings.
    #[must_use]
    pub fn information(&self) -> String {
        format!(
            "T: {:.3}, E: {}, O: {}, BE: {}, BL: {}",
            self.layer_height_mm,
            self.exposure_s,
            self.off_time_s,
            self.bottom_exposure_s,
            self.bottom_layers
        )
    }

    // ==================== Accessors ====================

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn resolution_x(&self) -> u32 {
        self.resolution_x
    }

    #[must_use]
    pub fn resolution_y(&self) -> u32 {
        self.resolution_y
    }

    #[must_use]
    pub fn bed_size_mm(&self) -> (f32, f32, f32) {
        (self.bed_x_mm, self.bed_y_mm, self.bed_z_mm)
    }

    pub fn set_bed_size_mm(&mut self, x: f32, y: f32, z: f32) {
        self.bed_x_mm = x;
        self.bed_y_mm = y;
        self.bed_z_mm = z;
    }

    #[must_use]
    pub fn layer_height_mm(&self) -> f32 {
        self.layer_height_mm
    }

    pub fn set_layer_height_mm(&mut self, height: f32) {
        self.layer_height_mm = height;
    }

    #[must_use]
    pub fn exposure_s(&self) -> f32 {
        self.exposure_s
    }

    pub fn set_exposure_s(&mut self, seconds: f32) {
        self.exposure_s = seconds;
    }

    #[must_use]
    pub fn bottom_exposure_s(&self) -> f32 {
        self.bottom_exposure_s
    }

    pub fn set_bottom_exposure_s(&mut self, seconds: f32) {
        self.bottom_exposure_s = seconds;
    }

    #[must_use]
    pub fn off_time_s(&self) -> f32 {
        self.off_time_s
    }

    pub fn set_off_time_s(&mut self, seconds: f32) {
        self.off_time_s = seconds;
    }

    #[must_use]
    pub fn bottom_layers(&self) -> u32 {
        self.bottom_layers
    }

    pub fn set_bottom_layers(&mut self, count: u32) {
        self.bottom_layers = count;
    }

    #[must_use]
    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    pub(crate) fn set_layer_count(&mut self, count: u32) {
        self.layer_count = count;
    }

    #[must_use]
    pub fn print_time_s(&self) -> u32 {
        self.print_time_s
    }

    #[must_use]
    pub fn projection(&self) -> ProjectionType {
        self.projection
    }

    pub fn set_projection(&mut self, projection: ProjectionType) {
        self.projection = projection;
    }

    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        self.projection == ProjectionType::LcdMirror
    }

    /// Raw anti-aliasing level field.
    #[must_use]
    pub fn anti_aliasing_level(&self) -> u32 {
        self.aa_level
    }

    /// Effective number of AA levels: always 1 for version 1 files.
    #[must_use]
    pub fn aa_levels(&self) -> u32 {
        if self.version > 1 { self.aa_level.max(1) } else { 1 }
    }

    #[must_use]
    pub fn has_aa(&self) -> bool {
        self.version > 1 && self.aa_level > 1
    }

    #[must_use]
    pub fn light_pwm(&self) -> (u16, u16) {
        (self.light_pwm, self.bottom_light_pwm)
    }

    /// Offsets as last read from or written to disk.
    #[must_use]
    pub fn offsets(&self) -> &SectionOffsets {
        &self.offsets
    }

    #[must_use]
    pub fn print_parameters(&self) -> Option<&PrintParameters> {
        self.print_parameters.as_ref()
    }

    #[must_use]
    pub fn machine_info(&self) -> Option<&MachineInfo> {
        self.machine_info.as_ref()
    }

    /// Replace the machine-info block. Ignored by version 1 files on write.
    pub fn set_machine_info(&mut self, info: MachineInfo) {
        self.machine_info = Some(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize(header: &PhotonHeader) -> Vec<u8> {
        let mut out = Vec::new();
        let offsets = SectionOffsets {
            preview_one: 112,
            preview_two: 150,
            print_parameters: 200,
            machine_info: 0,
            layer_table: 260,
            payload_start: 260,
        };
        header.write(&mut out, &offsets).unwrap();
        // Pad so every offset lands inside the buffer
        out.resize(400, 0);
        out
    }

    #[test]
    fn test_header_byte_size_matches_written() {
        let mut header = PhotonHeader::new(1440, 2560);
        let mut out = Vec::new();
        header.write(&mut out, &SectionOffsets::default()).unwrap();
        assert_eq!(out.len(), header.byte_size());

        header.set_file_version(2);
        let mut out = Vec::new();
        header.write(&mut out, &SectionOffsets::default()).unwrap();
        assert_eq!(out.len(), 112);
    }

    #[test]
    fn test_parse_written_header() {
        let mut header = PhotonHeader::new(1440, 2560);
        header.set_file_version(2);
        header.set_layer_count(12);
        let data = serialize(&header);

        let parsed = PhotonHeader::parse(&data).unwrap();
        assert_eq!(parsed.version(), 2);
        assert_eq!(parsed.resolution_x(), 1440);
        assert_eq!(parsed.layer_count(), 12);
        assert_eq!(parsed.offsets().layer_table, 260);
        assert_eq!(parsed.aa_levels(), 1);
    }

    #[test]
    fn test_short_buffer_is_format_error() {
        let err = PhotonHeader::parse(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::Truncated { .. })));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut data = serialize(&PhotonHeader::new(10, 10));
        data[0] = 0;
        let err = PhotonHeader::parse(&data).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::InvalidMagic { .. })));
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let data = serialize(&PhotonHeader::new(0, 10));
        let err = PhotonHeader::parse(&data).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::InvalidResolution { .. })));
    }

    #[test]
    fn test_oversized_resolution_rejected() {
        let data = serialize(&PhotonHeader::new(u32::MAX, u32::MAX));
        let err = PhotonHeader::parse(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InvalidResolution { x: u32::MAX, y: u32::MAX })
        ));

        assert!(check_resolution(16_384, 16_384).is_ok());
        assert!(check_resolution(16_384, 16_385).is_err());
    }

    #[test]
    fn test_version_two_without_parameters_is_inconsistent() {
        let mut header = PhotonHeader::new(10, 10);
        header.set_file_version(2);
        let mut data = Vec::new();
        header.write(&mut data, &SectionOffsets {
            preview_one: 112,
            preview_two: 112,
            print_parameters: 0,
            machine_info: 0,
            layer_table: 112,
            payload_start: 112,
        }).unwrap();
        data.resize(200, 0);
        let err = PhotonHeader::parse(&data).unwrap_err();
        assert!(matches!(err, Error::Format(FormatError::Inconsistent(_))));
    }

    #[test]
    fn test_set_aa_levels_requires_version_two() {
        let mut header = PhotonHeader::new(10, 10);
        let mut layers = vec![CompactLayer::default()];
        assert!(matches!(
            header.set_aa_levels(4, &mut layers),
            Err(Error::AntiAliasingUnsupported { version: 1 })
        ));

        header.set_file_version(2);
        header.set_aa_levels(4, &mut layers).unwrap();
        assert_eq!(layers[0].companions().len(), 3);
        header.set_aa_levels(2, &mut layers).unwrap();
        assert_eq!(layers[0].companions().len(), 1);
        assert_eq!(header.aa_levels(), 2);
    }
}
