//! Anti-aliasing companion rendering
//!
//! A base layer's lit mask is blurred with a 5x5 kernel into 0..=255
//! coverage values; each companion sub-layer lights the pixels whose
//! coverage reaches its threshold.

use serde::{Deserialize, Serialize};

use super::{ExpandedRaster, Pixel};

/// 5x5 convolution kernel for anti-aliasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AaMatrix {
    kernel: [[u32; 5]; 5],
}

impl Default for AaMatrix {
    /// 3x3 box blur centred in the 5x5 window.
    fn default() -> Self {
        let mut kernel = [[0; 5]; 5];
        for row in kernel.iter_mut().skip(1).take(3) {
            for cell in row.iter_mut().skip(1).take(3) {
                *cell = 1;
            }
        }
        Self { kernel }
    }
}

impl AaMatrix {
    /// Create a matrix from an explicit kernel.
    ///
    /// An all-zero kernel behaves like the identity.
    #[must_use]
    pub fn new(kernel: [[u32; 5]; 5]) -> Self {
        Self { kernel }
    }

    #[must_use]
    pub fn kernel(&self) -> &[[u32; 5]; 5] {
        &self.kernel
    }

    /// Sum of kernel entries. Widened so any `u32` kernel fits.
    fn weight(&self) -> u64 {
        self.kernel.iter().flatten().map(|&k| u64::from(k)).sum()
    }

    /// Blur `lit` (row-major, `width * height`) into coverage values.
    pub fn convolve(&self, lit: &[bool], width: usize, height: usize, out: &mut Vec<u8>) {
        out.clear();
        out.resize(width * height, 0);
        let weight = self.weight();
        if weight == 0 {
            for (dst, &src) in out.iter_mut().zip(lit) {
                *dst = if src { 255 } else { 0 };
            }
            return;
        }

        for y in 0..height {
            for x in 0..width {
                let mut sum = 0u64;
                for (ky, row) in self.kernel.iter().enumerate() {
                    let Some(sy) = (y + ky).checked_sub(2).filter(|&sy| sy < height) else {
                        continue;
                    };
                    for (kx, &k) in row.iter().enumerate() {
                        if k == 0 {
                            continue;
                        }
                        let Some(sx) = (x + kx).checked_sub(2).filter(|&sx| sx < width) else {
                            continue;
                        };
                        if lit[sy * width + sx] {
                            sum += u64::from(k) * 255;
                        }
                    }
                }
                out[y * width + x] = (sum / weight) as u8;
            }
        }
    }

    /// Threshold for companion `index` (0-based) of `levels` total AA levels.
    #[must_use]
    pub fn threshold(levels: u32, index: usize) -> u32 {
        let step = 255 / levels.max(1);
        step * (index as u32 + 1)
    }
}

impl ExpandedRaster {
    /// Replace contents with every pixel whose coverage reaches `threshold`.
    pub fn load_coverage(&mut self, coverage: &[u8], threshold: u32) {
        self.clear();
        for (idx, &value) in coverage.iter().enumerate().take(self.width * self.height) {
            if u32::from(value) >= threshold {
                self.set(idx % self.width, idx / self.width, Pixel::Supported);
            }
        }
    }
}
