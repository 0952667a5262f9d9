//! Bounded local island repair
//!
//! For each island pixel with off neighbours, a 5x5 window around it is
//! sampled and smoothed. Off cells in the inner 3x3 that end up with more than
//! three lit neighbours are filled in as island pixels, which lets a following
//! [`ExpandedRaster::reduce`] join the island to nearby supported material.

use super::{ExpandedRaster, Pixel};

/// Neighbour count above which an off cell gets filled.
const FILL_THRESHOLD: u8 = 3;

/// 5x5 sample around an island pixel; inner 3x3 neighbour counts.
#[derive(Debug, Default)]
struct RepairWindow {
    cells: [[u8; 5]; 5],
    counts: [[u8; 3]; 3],
}

impl RepairWindow {
    /// Sample the window centred on `(x0, y0)`. Returns the number of off
    /// cells in the inner 3x3.
    fn sample(&mut self, raster: &ExpandedRaster, x0: usize, y0: usize) -> usize {
        *self = Self::default();
        let mut blanks = 0;
        for wy in 0..5 {
            for wx in 0..5 {
                let Some((x, y)) = offset(raster, x0, y0, wx, wy) else {
                    continue;
                };
                if raster.get(x, y).is_lit() {
                    self.cells[wy][wx] = 1;
                } else if (1..4).contains(&wx) && (1..4).contains(&wy) {
                    blanks += 1;
                }
            }
        }
        blanks
    }

    /// Count lit 8-neighbours for every inner cell.
    fn calc(&mut self) {
        for cy in 0..3 {
            for cx in 0..3 {
                let (wx, wy) = (cx + 1, cy + 1);
                let mut count = 0;
                for ny in wy - 1..=wy + 1 {
                    for nx in wx - 1..=wx + 1 {
                        if (nx, ny) != (wx, wy) {
                            count += self.cells[ny][nx];
                        }
                    }
                }
                self.counts[cy][cx] = count;
            }
        }
    }

    /// Fill inner off cells that are mostly surrounded.
    fn level(&mut self) {
        for cy in 0..3 {
            for cx in 0..3 {
                if self.cells[cy + 1][cx + 1] == 0 && self.counts[cy][cx] > FILL_THRESHOLD {
                    self.cells[cy + 1][cx + 1] = 1;
                }
            }
        }
    }
}

/// Raster coordinate of window cell `(wx, wy)` for a window centred on `(x0, y0)`.
fn offset(raster: &ExpandedRaster, x0: usize, y0: usize, wx: usize, wy: usize) -> Option<(usize, usize)> {
    let x = (x0 + wx).checked_sub(2)?;
    let y = (y0 + wy).checked_sub(2)?;
    (x < raster.width() && y < raster.height()).then_some((x, y))
}

impl ExpandedRaster {
    /// One round of local repair around every island pixel.
    ///
    /// Returns the number of off pixels that were filled.
    pub fn repair_islands(&mut self) -> usize {
        if self.island_pixels == 0 {
            return 0;
        }

        let mut window = RepairWindow::default();
        let mut fills = Vec::new();
        for y in 0..self.height {
            if self.row_islands[y] == 0 {
                continue;
            }
            for x in 0..self.width {
                if self.get(x, y) != Pixel::Island {
                    continue;
                }
                if window.sample(self, x, y) == 0 {
                    continue;
                }
                window.calc();
                window.level();
                window.calc();

                for cy in 0..3 {
                    for cx in 0..3 {
                        let Some((fx, fy)) = offset(self, x, y, cx + 1, cy + 1) else {
                            continue;
                        };
                        if self.get(fx, fy) == Pixel::Off && window.counts[cy][cx] > FILL_THRESHOLD {
                            fills.push((fx, fy));
                        }
                    }
                }
            }
        }

        let mut changed = 0;
        for (x, y) in fills {
            if self.get(x, y) == Pixel::Off {
                self.set(x, y, Pixel::Island);
                changed += 1;
            }
        }
        changed
    }
}
