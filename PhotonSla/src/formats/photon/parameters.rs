//! Version 2+ parameter blocks: print parameters and machine info

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{FormatError, Result};

/// Lift, retract and resin-usage settings stored by version 2+ files.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintParameters {
    pub bottom_lift_distance_mm: f32,
    pub bottom_lift_speed_mm_min: f32,
    pub lift_distance_mm: f32,
    pub lift_speed_mm_min: f32,
    pub retract_speed_mm_min: f32,
    pub volume_ml: f32,
    pub weight_g: f32,
    pub cost: f32,
    pub bottom_light_off_delay_s: f32,
    pub light_off_delay_s: f32,
    pub bottom_layer_count: u32,
    reserved: [u32; 4],
}

impl Default for PrintParameters {
    fn default() -> Self {
        Self::with_bottom_layers(0)
    }
}

impl PrintParameters {
    /// Serialized size in bytes.
    pub const BYTE_SIZE: usize = 60;

    /// Stock lift settings: 5 mm lifts at 300 mm/min.
    #[must_use]
    pub fn with_bottom_layers(bottom_layer_count: u32) -> Self {
        Self {
            bottom_lift_distance_mm: 5.0,
            bottom_lift_speed_mm_min: 300.0,
            lift_distance_mm: 5.0,
            lift_speed_mm_min: 300.0,
            retract_speed_mm_min: 300.0,
            volume_ml: 0.0,
            weight_g: 0.0,
            cost: 0.0,
            bottom_light_off_delay_s: 0.0,
            light_off_delay_s: 0.0,
            bottom_layer_count,
            reserved: [0; 4],
        }
    }

    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        FormatError::check_span("print parameters", offset, Self::BYTE_SIZE, data.len())?;
        let mut cursor = Cursor::new(&data[offset..offset + Self::BYTE_SIZE]);

        let mut floats = [0f32; 10];
        for value in &mut floats {
            *value = cursor.read_f32::<LittleEndian>()?;
        }
        let bottom_layer_count = cursor.read_u32::<LittleEndian>()?;
        let mut reserved = [0u32; 4];
        for value in &mut reserved {
            *value = cursor.read_u32::<LittleEndian>()?;
        }

        let [
            bottom_lift_distance_mm,
            bottom_lift_speed_mm_min,
            lift_distance_mm,
            lift_speed_mm_min,
            retract_speed_mm_min,
            volume_ml,
            weight_g,
            cost,
            bottom_light_off_delay_s,
            light_off_delay_s,
        ] = floats;

        Ok(Self {
            bottom_lift_distance_mm,
            bottom_lift_speed_mm_min,
            lift_distance_mm,
            lift_speed_mm_min,
            retract_speed_mm_min,
            volume_ml,
            weight_g,
            cost,
            bottom_light_off_delay_s,
            light_off_delay_s,
            bottom_layer_count,
            reserved,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for value in [
            self.bottom_lift_distance_mm,
            self.bottom_lift_speed_mm_min,
            self.lift_distance_mm,
            self.lift_speed_mm_min,
            self.retract_speed_mm_min,
            self.volume_ml,
            self.weight_g,
            self.cost,
            self.bottom_light_off_delay_s,
            self.light_off_delay_s,
        ] {
            writer.write_f32::<LittleEndian>(value)?;
        }
        writer.write_u32::<LittleEndian>(self.bottom_layer_count)?;
        for value in self.reserved {
            writer.write_u32::<LittleEndian>(value)?;
        }
        Ok(())
    }
}

/// Printer identification block.
///
/// Only the machine name is interpreted. The rest of the fixed block is kept
/// byte-for-byte so foreign files survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MachineInfo {
    reserved: [u32; 7],
    /// Bytes of the fixed block past the name fields.
    extra: Vec<u8>,
    name: Vec<u8>,
    present: bool,
}

impl MachineInfo {
    /// Smallest fixed block: 7 reserved words plus the name address and length.
    pub const MIN_BLOCK_SIZE: usize = 36;

    /// An absent machine-info block (size 0 on disk).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            present: true,
            ..Self::default()
        }
    }

    /// Parse the block at `offset` with the header-declared `size`.
    pub fn parse(data: &[u8], offset: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Ok(Self::empty());
        }
        if size < Self::MIN_BLOCK_SIZE {
            return Err(FormatError::Inconsistent(format!(
                "machine info block of {size} bytes is smaller than {}",
                Self::MIN_BLOCK_SIZE
            ))
            .into());
        }
        FormatError::check_span("machine info", offset, size, data.len())?;
        let mut cursor = Cursor::new(&data[offset..offset + size]);

        let mut reserved = [0u32; 7];
        for value in &mut reserved {
            *value = cursor.read_u32::<LittleEndian>()?;
        }
        let name_address = cursor.read_u32::<LittleEndian>()? as usize;
        let name_length = cursor.read_u32::<LittleEndian>()? as usize;
        let extra = data[offset + Self::MIN_BLOCK_SIZE..offset + size].to_vec();

        let name = if name_length == 0 {
            Vec::new()
        } else {
            FormatError::check_span("machine name", name_address, name_length, data.len())?;
            data[name_address..name_address + name_length].to_vec()
        };

        Ok(Self {
            reserved,
            extra,
            name,
            present: true,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.present
    }

    /// Size of the fixed block as declared in the header.
    #[must_use]
    pub fn block_size(&self) -> usize {
        if self.present {
            Self::MIN_BLOCK_SIZE + self.extra.len()
        } else {
            0
        }
    }

    /// Fixed block plus the trailing name bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        if self.present {
            self.block_size() + self.name.len()
        } else {
            0
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Write the block at absolute `position`; the name follows immediately.
    pub fn write<W: Write>(&self, writer: &mut W, position: u32) -> Result<()> {
        if !self.present {
            return Ok(());
        }
        for value in self.reserved {
            writer.write_u32::<LittleEndian>(value)?;
        }
        let name_address = if self.name.is_empty() {
            0
        } else {
            position + self.block_size() as u32
        };
        writer.write_u32::<LittleEndian>(name_address)?;
        writer.write_u32::<LittleEndian>(self.name.len() as u32)?;
        writer.write_all(&self.extra)?;
        writer.write_all(&self.name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_parameters_size() {
        let mut out = Vec::new();
        PrintParameters::with_bottom_layers(6).write(&mut out).unwrap();
        assert_eq!(out.len(), PrintParameters::BYTE_SIZE);

        let parsed = PrintParameters::parse(&out, 0).unwrap();
        assert_eq!(parsed.bottom_layer_count, 6);
        assert!((parsed.lift_speed_mm_min - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_print_parameters_truncated() {
        assert!(PrintParameters::parse(&[0u8; 40], 0).is_err());
    }

    #[test]
    fn test_machine_info_name_follows_block() {
        let info = MachineInfo::named("Photon S");
        let mut out = vec![0u8; 10];
        info.write(&mut out, 10).unwrap();
        assert_eq!(out.len(), 10 + info.byte_size());

        let parsed = MachineInfo::parse(&out, 10, info.block_size()).unwrap();
        assert_eq!(parsed.name(), "Photon S");
        assert_eq!(parsed, info);
    }

    #[test]
    fn test_empty_machine_info_writes_nothing() {
        let mut out = Vec::new();
        MachineInfo::empty().write(&mut out, 0).unwrap();
        assert!(out.is_empty());
        assert!(MachineInfo::parse(&[], 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_machine_info_too_small() {
        assert!(MachineInfo::parse(&[0u8; 64], 0, 20).is_err());
    }
}
