//! Compact on-disk layers
//!
//! A [`CompactLayer`] holds one layer record and its run-length payload. It is
//! never mutated pixel-by-pixel: callers decode into an [`ExpandedRaster`],
//! change the raster, and [`CompactLayer::encode`] it back.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::header::PhotonHeader;
use super::{LAYER_RECORD_SIZE, rle};
use crate::error::{FormatError, Result};
use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback, report};
use crate::raster::ExpandedRaster;

/// One printed layer, or one anti-aliasing companion of a printed layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactLayer {
    z_mm: f32,
    exposure_s: f32,
    off_time_s: f32,
    reserved: [u32; 4],
    /// Payload address as last read or assigned for writing.
    address: u32,
    data: Vec<u8>,
    /// AA sub-layers; always empty on companions themselves.
    companions: Vec<CompactLayer>,
    /// Classified raster from the last analysis, run-length packed.
    overlay: Option<Vec<u8>>,
    island_count: usize,
    pixels: u64,
    extends_margin: bool,
}

/// Raw fields of one 36-byte record.
struct LayerRecord {
    z_mm: f32,
    exposure_s: f32,
    off_time_s: f32,
    address: u32,
    size: u32,
    reserved: [u32; 4],
}

impl LayerRecord {
    fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let mut cursor = Cursor::new(&data[offset..offset + LAYER_RECORD_SIZE]);
        let z_mm = cursor.read_f32::<LittleEndian>()?;
        let exposure_s = cursor.read_f32::<LittleEndian>()?;
        let off_time_s = cursor.read_f32::<LittleEndian>()?;
        let address = cursor.read_u32::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;
        let mut reserved = [0u32; 4];
        for value in &mut reserved {
            *value = cursor.read_u32::<LittleEndian>()?;
        }
        Ok(Self {
            z_mm,
            exposure_s,
            off_time_s,
            address,
            size,
            reserved,
        })
    }
}

impl CompactLayer {
    /// A layer with the given timing and an already-encoded payload.
    #[must_use]
    pub fn new(z_mm: f32, exposure_s: f32, off_time_s: f32, data: Vec<u8>) -> Self {
        let pixels = rle::count_lit(&data);
        Self {
            z_mm,
            exposure_s,
            off_time_s,
            data,
            pixels,
            ..Self::default()
        }
    }

    /// Encode a raster into a new layer.
    #[must_use]
    pub fn from_raster(raster: &ExpandedRaster, z_mm: f32, exposure_s: f32, off_time_s: f32) -> Self {
        Self::new(z_mm, exposure_s, off_time_s, raster.pack_payload())
    }

    /// Read every layer record and payload the header points at.
    ///
    /// Records are stored level by level: all base layers, then the first AA
    /// level for every layer, and so on.
    pub fn read_layers(
        header: &PhotonHeader,
        data: &[u8],
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<CompactLayer>> {
        let count = header.layer_count() as usize;
        let levels = header.aa_levels() as usize;
        let table = header.offsets().layer_table as usize;
        let table_len = count
            .checked_mul(levels)
            .and_then(|n| n.checked_mul(LAYER_RECORD_SIZE))
            .ok_or_else(|| FormatError::Inconsistent(format!("{count} layers x {levels} AA levels overflows")))?;
        FormatError::check_span("layer table", table, table_len, data.len())?;

        let mut layers: Vec<CompactLayer> = Vec::with_capacity(count);
        for level in 0..levels {
            for index in 0..count {
                if level == 0 {
                    report(progress, || {
                        PhotonProgress::new(PhotonPhase::ReadingLayers, index + 1, count)
                    });
                }
                let offset = table + (level * count + index) * LAYER_RECORD_SIZE;
                let record = LayerRecord::parse(data, offset)?;
                let layer = Self::from_record(&record, data)?;
                if level == 0 {
                    layers.push(layer);
                } else {
                    layers[index].companions.push(layer);
                }
            }
        }

        tracing::debug!("Read {} layers with {} AA levels", count, levels);
        Ok(layers)
    }

    fn from_record(record: &LayerRecord, data: &[u8]) -> Result<Self> {
        let address = record.address as usize;
        let size = record.size as usize;
        FormatError::check_span("layer payload", address, size, data.len())?;
        let mut layer = Self::new(
            record.z_mm,
            record.exposure_s,
            record.off_time_s,
            data[address..address + size].to_vec(),
        );
        layer.address = record.address;
        layer.reserved = record.reserved;
        Ok(layer)
    }

    /// Write the 36-byte record using the currently assigned address.
    pub fn write_record<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<LittleEndian>(self.z_mm)?;
        writer.write_f32::<LittleEndian>(self.exposure_s)?;
        writer.write_f32::<LittleEndian>(self.off_time_s)?;
        writer.write_u32::<LittleEndian>(self.address)?;
        writer.write_u32::<LittleEndian>(self.data.len() as u32)?;
        for value in self.reserved {
            writer.write_u32::<LittleEndian>(value)?;
        }
        Ok(())
    }

    pub fn write_payload<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Place this layer's payload at `position`; returns the next free position.
    pub fn assign_address(&mut self, position: u32) -> Result<u32> {
        let end = u32::try_from(self.data.len())
            .ok()
            .and_then(|len| position.checked_add(len))
            .ok_or_else(|| {
                FormatError::Inconsistent(format!(
                    "layer payload of {} bytes at {position} ends past the 32-bit address range",
                    self.data.len()
                ))
            })?;
        self.address = position;
        Ok(end)
    }

    // ==================== Pack / unpack ====================

    /// Decode the payload into a new raster.
    #[must_use]
    pub fn decode(&self, width: usize, height: usize) -> ExpandedRaster {
        let mut raster = ExpandedRaster::new(width, height);
        self.decode_into(&mut raster);
        raster
    }

    /// Decode the payload into a caller-owned raster. Every lit pixel comes
    /// out supported.
    pub fn decode_into(&self, raster: &mut ExpandedRaster) {
        raster.load_payload(&self.data);
    }

    /// Decode with the classification from the last analysis, falling back to
    /// the plain payload when the layer has not been analysed.
    pub fn decode_classified_into(&self, raster: &mut ExpandedRaster) {
        match &self.overlay {
            Some(overlay) => raster.load_overlay(overlay),
            None => {
                raster.load_payload(&self.data);
            }
        }
    }

    /// Replace the payload with the raster's contents.
    pub fn encode(&mut self, raster: &ExpandedRaster) {
        self.data = raster.pack_payload();
        self.overlay = Some(raster.pack_overlay());
        self.pixels = raster.lit_pixels();
    }

    /// Cheap island recount from a raster that already carries classes.
    pub fn update_islands(&mut self, raster: &mut ExpandedRaster) {
        self.island_count = raster.island_regions();
    }

    /// Cache the results of an authoritative analysis of `raster`.
    pub(crate) fn store_analysis(&mut self, raster: &mut ExpandedRaster, margin: usize) {
        self.overlay = Some(raster.pack_overlay());
        self.island_count = raster.island_regions();
        self.pixels = raster.lit_pixels();
        self.extends_margin = raster.extends_margin(margin);
    }

    // ==================== AA companions ====================

    /// Grow or shrink the companion list to `count`.
    ///
    /// New companions copy this layer's timing and payload. Shrinking drops
    /// companions from the front.
    pub fn resize_companions(&mut self, count: usize) {
        let current = self.companions.len();
        if count < current {
            self.companions.drain(..current - count);
            return;
        }
        let template = Self {
            z_mm: self.z_mm,
            exposure_s: self.exposure_s,
            off_time_s: self.off_time_s,
            reserved: self.reserved,
            data: self.data.clone(),
            pixels: self.pixels,
            ..Self::default()
        };
        self.companions.resize(count, template);
    }

    #[must_use]
    pub fn companions(&self) -> &[CompactLayer] {
        &self.companions
    }

    pub fn companions_mut(&mut self) -> &mut [CompactLayer] {
        &mut self.companions
    }

    // ==================== Accessors ====================

    #[must_use]
    pub fn z_mm(&self) -> f32 {
        self.z_mm
    }

    pub fn set_z_mm(&mut self, z: f32) {
        self.z_mm = z;
    }

    #[must_use]
    pub fn exposure_s(&self) -> f32 {
        self.exposure_s
    }

    #[must_use]
    pub fn off_time_s(&self) -> f32 {
        self.off_time_s
    }

    /// Set exposure and off time on this layer and its companions.
    pub fn set_timing(&mut self, exposure_s: f32, off_time_s: f32) {
        self.exposure_s = exposure_s;
        self.off_time_s = off_time_s;
        for companion in &mut self.companions {
            companion.exposure_s = exposure_s;
            companion.off_time_s = off_time_s;
        }
    }

    #[must_use]
    pub fn address(&self) -> u32 {
        self.address
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn island_count(&self) -> usize {
        self.island_count
    }

    #[must_use]
    pub fn pixels(&self) -> u64 {
        self.pixels
    }

    #[must_use]
    pub fn extends_margin(&self) -> bool {
        self.extends_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_past_u32_range_rejected() {
        let mut layer = CompactLayer::new(0.05, 8.0, 1.0, vec![0x85, 0x05]);
        assert_eq!(layer.assign_address(u32::MAX - 2).unwrap(), u32::MAX);

        let err = layer.assign_address(u32::MAX - 1).unwrap_err();
        assert!(matches!(err, crate::error::Error::Format(FormatError::Inconsistent(_))));
        assert_eq!(layer.address(), u32::MAX - 2);
    }

    #[test]
    fn test_record_is_36_bytes() {
        let mut layer = CompactLayer::new(0.05, 8.0, 1.0, vec![0x85, 0x05]);
        assert_eq!(layer.assign_address(1000).unwrap(), 1002);

        let mut out = Vec::new();
        layer.write_record(&mut out).unwrap();
        assert_eq!(out.len(), LAYER_RECORD_SIZE);

        let record = LayerRecord::parse(&out, 0).unwrap();
        assert_eq!(record.address, 1000);
        assert_eq!(record.size, 2);
    }

    #[test]
    fn test_encode_replaces_payload() {
        let mut layer = CompactLayer::new(0.0, 1.0, 1.0, Vec::new());
        let raster = ExpandedRaster::from_fn(10, 2, |x, _| x < 3);
        layer.encode(&raster);
        assert_eq!(layer.pixels(), 6);

        let decoded = layer.decode(10, 2);
        assert!(decoded.is_lit(2, 1));
        assert!(!decoded.is_lit(3, 1));
    }

    #[test]
    fn test_resize_companions_copies_payload() {
        let mut layer = CompactLayer::new(0.1, 8.0, 1.0, vec![0x8A]);
        layer.resize_companions(3);
        assert_eq!(layer.companions().len(), 3);
        assert!(layer.companions().iter().all(|c| c.payload() == [0x8A]));
        assert!(layer.companions().iter().all(|c| c.companions().is_empty()));

        layer.companions_mut()[0] = CompactLayer::new(0.1, 8.0, 1.0, vec![0x81]);
        layer.resize_companions(2);
        // Dropped from the front
        assert!(layer.companions().iter().all(|c| c.payload() == [0x8A]));
    }

    #[test]
    fn test_payload_outside_buffer_is_error() {
        let record = LayerRecord {
            z_mm: 0.0,
            exposure_s: 0.0,
            off_time_s: 0.0,
            address: 90,
            size: 20,
            reserved: [0; 4],
        };
        assert!(CompactLayer::from_record(&record, &[0u8; 100]).is_err());
    }
}
