//! Embedded preview thumbnails
//!
//! The payload is kept verbatim so files round-trip unchanged. Decoding to RGB
//! is only needed for export.
//!
//! Payload codec: a stream of little-endian u16 colour words, red in bits
//! 11..15, green in bits 6..10, blue in bits 0..4. Bit 5 marks a repeat; the
//! next word's low 12 bits give the number of extra copies.

use std::io::{Cursor, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::{ImageFormat, Rgb, RgbImage};

use super::MAX_PIXELS;
use crate::error::{FormatError, Result};

/// Fixed preview header: resolution, image address, size and 4 reserved words.
pub const PREVIEW_HEADER_SIZE: usize = 32;

const REPEAT_FLAG: u16 = 0x0020;
const MAX_EXTRA_REPEAT: usize = 0x0FFF;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviewImage {
    resolution_x: u32,
    resolution_y: u32,
    reserved: [u32; 4],
    data: Vec<u8>,
}

impl PreviewImage {
    /// A 0x0 preview with no payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the preview whose header starts at `offset`.
    pub fn parse(data: &[u8], offset: usize, section: &'static str) -> Result<Self> {
        FormatError::check_span(section, offset, PREVIEW_HEADER_SIZE, data.len())?;
        let mut cursor = Cursor::new(&data[offset..offset + PREVIEW_HEADER_SIZE]);

        let resolution_x = cursor.read_u32::<LittleEndian>()?;
        let resolution_y = cursor.read_u32::<LittleEndian>()?;
        let image_address = cursor.read_u32::<LittleEndian>()? as usize;
        let data_size = cursor.read_u32::<LittleEndian>()? as usize;
        // 0x0 is allowed and marks an absent preview
        let pixels = (resolution_x as usize).checked_mul(resolution_y as usize);
        if pixels.is_none_or(|pixels| pixels > MAX_PIXELS) {
            return Err(FormatError::InvalidResolution {
                x: resolution_x,
                y: resolution_y,
            }
            .into());
        }
        let mut reserved = [0u32; 4];
        for value in &mut reserved {
            *value = cursor.read_u32::<LittleEndian>()?;
        }

        let payload = if data_size == 0 {
            Vec::new()
        } else {
            FormatError::check_span(section, image_address, data_size, data.len())?;
            data[image_address..image_address + data_size].to_vec()
        };

        tracing::debug!(
            "{}: {}x{}, {} bytes at {}",
            section,
            resolution_x,
            resolution_y,
            data_size,
            image_address
        );

        Ok(Self {
            resolution_x,
            resolution_y,
            reserved,
            data: payload,
        })
    }

    /// Encode an RGB image into a new preview.
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let mut data = Vec::new();
        let mut pixels = image.pixels().map(|p| pack_colour(*p)).peekable();
        while let Some(colour) = pixels.next() {
            let mut extra = 0usize;
            while extra < MAX_EXTRA_REPEAT && pixels.peek() == Some(&colour) {
                pixels.next();
                extra += 1;
            }
            if extra == 0 {
                data.extend_from_slice(&colour.to_le_bytes());
            } else {
                data.extend_from_slice(&(colour | REPEAT_FLAG).to_le_bytes());
                data.extend_from_slice(&(extra as u16).to_le_bytes());
            }
        }
        Self {
            resolution_x: image.width(),
            resolution_y: image.height(),
            reserved: [0; 4],
            data,
        }
    }

    /// Serialized size: header plus payload.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        PREVIEW_HEADER_SIZE + self.data.len()
    }

    /// Write at absolute `position`; the payload follows the header.
    pub fn write<W: Write>(&self, writer: &mut W, position: u32) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.resolution_x)?;
        writer.write_u32::<LittleEndian>(self.resolution_y)?;
        writer.write_u32::<LittleEndian>(position + PREVIEW_HEADER_SIZE as u32)?;
        writer.write_u32::<LittleEndian>(self.data.len() as u32)?;
        for value in self.reserved {
            writer.write_u32::<LittleEndian>(value)?;
        }
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Decode to RGB. Missing pixels stay black; surplus runs are dropped.
    #[must_use]
    pub fn decode(&self) -> RgbImage {
        let mut image = RgbImage::new(self.resolution_x, self.resolution_y);
        let total = self.resolution_x as usize * self.resolution_y as usize;
        let width = self.resolution_x.max(1) as usize;

        let mut words = self
            .data
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
        let mut cursor = 0usize;
        while let Some(word) = words.next() {
            if cursor >= total {
                break;
            }
            let mut count = 1;
            if word & REPEAT_FLAG != 0 {
                let Some(extra) = words.next() else {
                    break;
                };
                count += usize::from(extra) & MAX_EXTRA_REPEAT;
            }
            let colour = unpack_colour(word);
            for idx in cursor..(cursor + count).min(total) {
                image.put_pixel((idx % width) as u32, (idx / width) as u32, colour);
            }
            cursor += count;
        }
        image
    }

    /// Decode and save as PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.decode().save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }

    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        (self.resolution_x, self.resolution_y)
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn pack_colour(Rgb([r, g, b]): Rgb<u8>) -> u16 {
    (u16::from(r >> 3) << 11) | (u16::from(g >> 3) << 6) | u16::from(b >> 3)
}

fn unpack_colour(word: u16) -> Rgb<u8> {
    let r = ((word >> 11) & 0x1F) as u8;
    let g = ((word >> 6) & 0x1F) as u8;
    let b = (word & 0x1F) as u8;
    Rgb([r << 3, g << 3, b << 3])
}
