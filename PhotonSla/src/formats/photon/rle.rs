//! Run-length codecs for layer pixel data
//!
//! Two codecs live here:
//!
//! - The on-disk layer payload: one byte per run, bit 7 = lit, bits 0..6 = length.
//!   Runs never exceed [`MAX_PAYLOAD_RUN`] pixels.
//! - The in-memory classification overlay: bit 7 = extended length, bits 5..6 =
//!   pixel class, bits 0..4 = length (13 bits when extended, low byte follows).
//!
//! SPDX-License-Identifier: MIT

/// Longest run a single payload byte may carry.
pub const MAX_PAYLOAD_RUN: usize = 125;

/// Lit flag in a payload run byte.
const PAYLOAD_LIT: u8 = 0x80;

/// Length mask in a payload run byte.
const PAYLOAD_LENGTH_MASK: u8 = 0x7F;

/// Extended-length flag in an overlay run byte.
const OVERLAY_EXTENDED: u8 = 0x80;

/// Longest run a single overlay entry may carry (13 bits).
const MAX_OVERLAY_RUN: usize = 0x1FFF;

/// Append a payload run, splitting it into as many bytes as needed.
pub fn push_payload_run(out: &mut Vec<u8>, lit: bool, mut length: usize) {
    let flag = if lit { PAYLOAD_LIT } else { 0 };
    while length > 0 {
        let chunk = length.min(MAX_PAYLOAD_RUN);
        out.push(flag | chunk as u8);
        length -= chunk;
    }
}

/// Visit every non-empty run in a payload as `(lit, length)`.
pub fn for_each_payload_run(data: &[u8], mut visit: impl FnMut(bool, usize)) {
    for &byte in data {
        let length = usize::from(byte & PAYLOAD_LENGTH_MASK);
        if length > 0 {
            visit(byte & PAYLOAD_LIT != 0, length);
        }
    }
}

/// Count lit pixels in a payload without expanding it.
pub fn count_lit(data: &[u8]) -> u64 {
    data.iter()
        .filter(|&&b| b & PAYLOAD_LIT != 0)
        .map(|&b| u64::from(b & PAYLOAD_LENGTH_MASK))
        .sum()
}

/// Append an overlay run for pixel class `class` (0..=3).
pub fn push_overlay_run(out: &mut Vec<u8>, class: u8, mut length: usize) {
    let class_bits = (class & 0x03) << 5;
    while length > 0 {
        let chunk = length.min(MAX_OVERLAY_RUN);
        if chunk < 32 {
            out.push(class_bits | chunk as u8);
        } else {
            out.push(OVERLAY_EXTENDED | class_bits | ((chunk >> 8) as u8 & 0x1F));
            out.push((chunk & 0xFF) as u8);
        }
        length -= chunk;
    }
}

/// Visit every run in an overlay as `(class, length)`.
///
/// A trailing extended byte without its low byte is ignored.
pub fn for_each_overlay_run(data: &[u8], mut visit: impl FnMut(u8, usize)) {
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let class = (byte >> 5) & 0x03;
        let mut length = usize::from(byte & 0x1F);
        if byte & OVERLAY_EXTENDED != 0 {
            i += 1;
            let Some(&low) = data.get(i) else {
                break;
            };
            length = (length << 8) | usize::from(low);
        }
        if length > 0 {
            visit(class, length);
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_run_splits_at_125() {
        let mut out = Vec::new();
        push_payload_run(&mut out, true, 300);
        assert_eq!(out, vec![0x80 | 125, 0x80 | 125, 0x80 | 50]);
        assert_eq!(count_lit(&out), 300);
    }

    #[test]
    fn test_payload_zero_length_bytes_skipped() {
        let mut runs = Vec::new();
        for_each_payload_run(&[0x00, 0x83, 0x02], |lit, len| runs.push((lit, len)));
        assert_eq!(runs, vec![(true, 3), (false, 2)]);
    }

    #[test]
    fn test_overlay_short_and_extended() {
        let mut out = Vec::new();
        push_overlay_run(&mut out, 2, 5);
        push_overlay_run(&mut out, 1, 1440);
        assert_eq!(out[0], (2 << 5) | 5);
        assert_eq!(out.len(), 3);

        let mut runs = Vec::new();
        for_each_overlay_run(&out, |class, len| runs.push((class, len)));
        assert_eq!(runs, vec![(2, 5), (1, 1440)]);
    }

    #[test]
    fn test_overlay_truncated_extended_byte() {
        let mut runs = Vec::new();
        for_each_overlay_run(&[0x03, 0x80 | 0x01], |class, len| runs.push((class, len)));
        assert_eq!(runs, vec![(0, 3)]);
    }
}
