//! Expanded per-layer raster used for island analysis and repair
//!
//! A compact layer is unpacked into an [`ExpandedRaster`], mutated, and packed
//! back. The raster is working memory only; callers own one instance and reuse
//! it across a whole-file scan.

mod antialias;
mod repair;

pub use antialias::AaMatrix;

use crate::formats::photon::rle;

/// Classification of a single raster cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Pixel {
    /// Not exposed.
    #[default]
    Off = 0,
    /// Lit and resting on a lit pixel in the previous layer.
    Supported = 1,
    /// Lit with no support below and no path to supported pixels.
    Island = 2,
    /// Lit without support below, but joined to a supported region.
    Connected = 3,
}

impl Pixel {
    /// Decode a 2-bit class code.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0 => Pixel::Off,
            1 => Pixel::Supported,
            2 => Pixel::Island,
            _ => Pixel::Connected,
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn is_lit(self) -> bool {
        self != Pixel::Off
    }

    /// Supported or connected: anything an island can attach to.
    #[must_use]
    pub fn is_anchored(self) -> bool {
        matches!(self, Pixel::Supported | Pixel::Connected)
    }
}

/// Dense, mutable pixel grid for one layer.
#[derive(Debug, Clone)]
pub struct ExpandedRaster {
    width: usize,
    height: usize,
    cells: Vec<Pixel>,
    row_lit: Vec<u32>,
    row_islands: Vec<u32>,
    island_pixels: usize,
    /// Flood-fill stack, kept to avoid reallocating per call
    stack: Vec<usize>,
    /// Visit marks for region counting
    marks: Vec<bool>,
}

impl ExpandedRaster {
    /// Create an all-off raster.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Pixel::Off; width * height],
            row_lit: vec![0; height],
            row_islands: vec![0; height],
            island_pixels: 0,
            stack: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Build a raster from a predicate; lit pixels start out supported.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, lit: impl Fn(usize, usize) -> bool) -> Self {
        let mut raster = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if lit(x, y) {
                    raster.set(x, y, Pixel::Supported);
                }
            }
        }
        raster
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at `(x, y)`. Out-of-range coordinates read as off.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Pixel {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Pixel::Off
        }
    }

    #[must_use]
    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        self.get(x, y).is_lit()
    }

    /// Total lit pixels.
    #[must_use]
    pub fn lit_pixels(&self) -> u64 {
        self.row_lit.iter().map(|&n| u64::from(n)).sum()
    }

    /// Total pixels currently classified as island.
    #[must_use]
    pub fn island_pixels(&self) -> usize {
        self.island_pixels
    }

    /// Reset every cell to off.
    pub fn clear(&mut self) {
        self.cells.fill(Pixel::Off);
        self.row_lit.fill(0);
        self.row_islands.fill(0);
        self.island_pixels = 0;
    }

    /// Set a cell, keeping row and island counters in step.
    ///
    /// Out-of-range coordinates are ignored.
    pub fn set(&mut self, x: usize, y: usize, pixel: Pixel) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = y * self.width + x;
        let old = self.cells[idx];
        if old == pixel {
            return;
        }
        if old.is_lit() {
            self.row_lit[y] -= 1;
        }
        if old == Pixel::Island {
            self.row_islands[y] -= 1;
            self.island_pixels -= 1;
        }
        if pixel.is_lit() {
            self.row_lit[y] += 1;
        }
        if pixel == Pixel::Island {
            self.row_islands[y] += 1;
            self.island_pixels += 1;
        }
        self.cells[idx] = pixel;
    }

    /// Light every pixel in the half-open rectangle `[x0, x1) x [y0, y1)`.
    pub fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize) {
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                self.set(x, y, Pixel::Supported);
            }
        }
    }

    /// Fill a run of cells in flat row-major order, clipping at the end of the grid.
    fn fill_flat(&mut self, start: usize, length: usize, pixel: Pixel) -> usize {
        let total = self.cells.len();
        let end = start.saturating_add(length).min(total);
        if pixel != Pixel::Off {
            for idx in start..end {
                self.set(idx % self.width, idx / self.width, pixel);
            }
        }
        length.saturating_sub(end.saturating_sub(start))
    }

    /// Replace contents with a layer payload; every lit pixel becomes supported.
    ///
    /// Returns the number of lit pixels that fell outside the grid.
    pub fn load_payload(&mut self, data: &[u8]) -> usize {
        self.clear();
        let mut cursor = 0usize;
        let mut overflow = 0usize;
        rle::for_each_payload_run(data, |lit, length| {
            let pixel = if lit { Pixel::Supported } else { Pixel::Off };
            let clipped = self.fill_flat(cursor, length, pixel);
            if lit {
                overflow += clipped;
            }
            cursor += length;
        });
        if overflow > 0 {
            tracing::warn!("Layer payload overflows raster by {} lit pixels, clipped", overflow);
        }
        overflow
    }

    /// Replace contents with a classification overlay.
    pub fn load_overlay(&mut self, data: &[u8]) {
        self.clear();
        let mut cursor = 0usize;
        rle::for_each_overlay_run(data, |class, length| {
            self.fill_flat(cursor, length, Pixel::from_code(class));
            cursor += length;
        });
    }

    /// Run-length encode rows, calling `emit(class_or_lit, length)` per run.
    fn pack_rows(&self, mut emit: impl FnMut(Pixel, usize), lit_only: bool) {
        let key = |p: Pixel| {
            if lit_only && p.is_lit() {
                Pixel::Supported
            } else {
                p
            }
        };
        for y in 0..self.height {
            if self.row_lit[y] == 0 {
                emit(Pixel::Off, self.width);
                continue;
            }
            let row = &self.cells[y * self.width..(y + 1) * self.width];
            let mut current = key(row[0]);
            let mut length = 0usize;
            for &cell in row {
                let next = key(cell);
                if next == current {
                    length += 1;
                } else {
                    emit(current, length);
                    current = next;
                    length = 1;
                }
            }
            emit(current, length);
        }
    }

    /// Encode the raster as an on-disk layer payload.
    #[must_use]
    pub fn pack_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.pack_rows(
            |pixel, length| rle::push_payload_run(&mut out, pixel.is_lit(), length),
            true,
        );
        out
    }

    /// Encode the raster with its classification as an overlay.
    #[must_use]
    pub fn pack_overlay(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.pack_rows(
            |pixel, length| rle::push_overlay_run(&mut out, pixel.code(), length),
            false,
        );
        out
    }

    /// Write the lit/unlit state of every cell into `mask`, resizing it as needed.
    pub fn lit_mask_into(&self, mask: &mut Vec<bool>) {
        mask.clear();
        mask.extend(self.cells.iter().map(|p| p.is_lit()));
    }

    /// Classify every lit pixel against the layer below and collapse
    /// islands that touch supported regions.
    ///
    /// With no layer below (the first layer) everything lit is supported.
    pub fn classify(&mut self, below: Option<&[bool]>) {
        for idx in 0..self.cells.len() {
            if !self.cells[idx].is_lit() {
                continue;
            }
            let supported = below.is_none_or(|mask| mask.get(idx).copied().unwrap_or(false));
            let pixel = if supported {
                Pixel::Supported
            } else {
                Pixel::Island
            };
            self.set(idx % self.width, idx / self.width, pixel);
        }
        self.reduce();
    }

    /// Convert every island pixel 4-connected to an anchored pixel into a
    /// connected pixel, flooding through whole island regions.
    pub fn reduce(&mut self) {
        if self.island_pixels == 0 {
            return;
        }
        let mut stack = std::mem::take(&mut self.stack);
        stack.clear();
        for y in 0..self.height {
            if self.row_islands[y] == 0 {
                continue;
            }
            for x in 0..self.width {
                if self.get(x, y) == Pixel::Island && self.touches_anchor(x, y) {
                    self.set(x, y, Pixel::Connected);
                    stack.push(y * self.width + x);
                }
            }
        }
        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % self.width, idx / self.width);
            for (nx, ny) in self.neighbours(x, y) {
                if self.get(nx, ny) == Pixel::Island {
                    self.set(nx, ny, Pixel::Connected);
                    stack.push(ny * self.width + nx);
                }
            }
        }
        self.stack = stack;
    }

    fn touches_anchor(&self, x: usize, y: usize) -> bool {
        self.neighbours(x, y)
            .into_iter()
            .any(|(nx, ny)| self.get(nx, ny).is_anchored())
    }

    /// 4-neighbourhood; out-of-range neighbours map to an off coordinate.
    fn neighbours(&self, x: usize, y: usize) -> [(usize, usize); 4] {
        [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ]
    }

    /// Number of 4-connected island regions.
    #[must_use]
    pub fn island_regions(&mut self) -> usize {
        if self.island_pixels == 0 {
            return 0;
        }
        let mut marks = std::mem::take(&mut self.marks);
        let mut stack = std::mem::take(&mut self.stack);
        marks.clear();
        marks.resize(self.cells.len(), false);
        stack.clear();

        let mut regions = 0;
        for start in 0..self.cells.len() {
            if marks[start] || self.cells[start] != Pixel::Island {
                continue;
            }
            regions += 1;
            marks[start] = true;
            stack.push(start);
            while let Some(idx) = stack.pop() {
                let (x, y) = (idx % self.width, idx / self.width);
                for (nx, ny) in self.neighbours(x, y) {
                    if self.get(nx, ny) == Pixel::Island {
                        let n = ny * self.width + nx;
                        if !marks[n] {
                            marks[n] = true;
                            stack.push(n);
                        }
                    }
                }
            }
        }

        self.marks = marks;
        self.stack = stack;
        regions
    }

    /// Delete every island pixel. Returns the number of pixels removed.
    pub fn remove_islands(&mut self) -> usize {
        if self.island_pixels == 0 {
            return 0;
        }
        let mut removed = 0;
        for y in 0..self.height {
            if self.row_islands[y] == 0 {
                continue;
            }
            for x in 0..self.width {
                if self.get(x, y) == Pixel::Island {
                    self.set(x, y, Pixel::Off);
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Whether any lit pixel lies within `margin` pixels of the raster edge.
    #[must_use]
    pub fn extends_margin(&self, margin: usize) -> bool {
        if margin == 0 {
            return false;
        }
        for y in 0..self.height {
            if self.row_lit[y] == 0 {
                continue;
            }
            if y < margin || y + margin >= self.height {
                return true;
            }
            let row = &self.cells[y * self.width..(y + 1) * self.width];
            let left = margin.min(self.width);
            let right = self.width.saturating_sub(margin).max(left);
            if row[..left].iter().any(|p| p.is_lit()) || row[right..].iter().any(|p| p.is_lit()) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip_preserves_pixels() {
        let raster = ExpandedRaster::from_fn(200, 4, |x, y| (x + y) % 3 == 0 || x > 150);
        let payload = raster.pack_payload();

        let mut decoded = ExpandedRaster::new(200, 4);
        decoded.load_payload(&payload);
        for y in 0..4 {
            for x in 0..200 {
                assert_eq!(raster.is_lit(x, y), decoded.is_lit(x, y), "pixel {x},{y}");
            }
        }
        assert_eq!(decoded.lit_pixels(), raster.lit_pixels());
    }

    #[test]
    fn test_payload_runs_may_cross_rows() {
        // 3 off, 4 lit on a 5-wide grid: lit run wraps into row 1
        let mut raster = ExpandedRaster::new(5, 2);
        raster.load_payload(&[0x03, 0x84, 0x03]);
        assert!(raster.is_lit(3, 0));
        assert!(raster.is_lit(4, 0));
        assert!(raster.is_lit(0, 1));
        assert!(raster.is_lit(1, 1));
        assert!(!raster.is_lit(2, 1));
    }

    #[test]
    fn test_payload_overflow_is_clipped() {
        let mut raster = ExpandedRaster::new(2, 2);
        let overflow = raster.load_payload(&[0x86]);
        assert_eq!(overflow, 2);
        assert_eq!(raster.lit_pixels(), 4);
    }

    #[test]
    fn test_classify_first_layer_all_supported() {
        let mut raster = ExpandedRaster::from_fn(4, 4, |x, _| x == 1);
        raster.classify(None);
        assert_eq!(raster.island_pixels(), 0);
        assert_eq!(raster.get(1, 2), Pixel::Supported);
    }

    #[test]
    fn test_classify_detects_island_region() {
        let below = ExpandedRaster::from_fn(6, 6, |x, y| x < 2 && y < 2);
        let mut mask = Vec::new();
        below.lit_mask_into(&mut mask);

        let mut raster = ExpandedRaster::from_fn(6, 6, |x, y| (x < 2 && y < 2) || (x >= 4 && y >= 4));
        raster.classify(Some(&mask));
        assert_eq!(raster.get(0, 0), Pixel::Supported);
        assert_eq!(raster.get(5, 5), Pixel::Island);
        assert_eq!(raster.island_pixels(), 4);
        assert_eq!(raster.island_regions(), 1);
    }

    #[test]
    fn test_reduce_floods_whole_region() {
        let below = ExpandedRaster::from_fn(8, 1, |x, _| x == 0);
        let mut mask = Vec::new();
        below.lit_mask_into(&mut mask);

        // A long overhang attached to a supported pixel is not an island
        let mut raster = ExpandedRaster::from_fn(8, 1, |_, _| true);
        raster.classify(Some(&mask));
        assert_eq!(raster.island_pixels(), 0);
        assert_eq!(raster.get(7, 0), Pixel::Connected);
    }

    #[test]
    fn test_overlay_round_trip_keeps_classes() {
        let mut raster = ExpandedRaster::new(40, 3);
        raster.set(1, 1, Pixel::Island);
        raster.set(2, 1, Pixel::Connected);
        raster.fill_rect(5, 0, 40, 1);

        let overlay = raster.pack_overlay();
        let mut decoded = ExpandedRaster::new(40, 3);
        decoded.load_overlay(&overlay);
        assert_eq!(decoded.get(1, 1), Pixel::Island);
        assert_eq!(decoded.get(2, 1), Pixel::Connected);
        assert_eq!(decoded.get(39, 0), Pixel::Supported);
        assert_eq!(decoded.island_pixels(), 1);
    }

    #[test]
    fn test_remove_islands_counts_pixels() {
        let mut raster = ExpandedRaster::new(5, 5);
        raster.set(0, 0, Pixel::Island);
        raster.set(4, 4, Pixel::Island);
        raster.set(2, 2, Pixel::Supported);
        assert_eq!(raster.island_regions(), 2);
        assert_eq!(raster.remove_islands(), 2);
        assert_eq!(raster.island_pixels(), 0);
        assert_eq!(raster.lit_pixels(), 1);
    }

    #[test]
    fn test_margin_check() {
        let centre = ExpandedRaster::from_fn(10, 10, |x, y| (4..6).contains(&x) && (4..6).contains(&y));
        assert!(!centre.extends_margin(2));
        assert!(centre.extends_margin(5));

        let edge = ExpandedRaster::from_fn(10, 10, |x, y| x == 9 && y == 5);
        assert!(edge.extends_margin(1));
        assert!(!edge.extends_margin(0));
    }
}
