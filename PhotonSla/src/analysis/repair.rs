//! Island repair escalation
//!
//! Repair passes run until one changes nothing. Islands that survive get a
//! single removal pass, after which repair runs to a fixed point once more.
//! Removal never runs before repair has converged.

use std::sync::atomic::AtomicBool;

use super::{AnalysisScratch, check_cancelled, island_layers, recalculate_pair};
use crate::error::Result;
use crate::formats::photon::CompactLayer;
use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback, report};

/// Repair rounds attempted on one layer within one pass.
pub const MAX_REPAIR_ATTEMPTS: usize = 10;

/// What a single repair or removal pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub layers: usize,
    pub pixels: usize,
}

impl PassOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.pixels > 0
    }
}

/// Summary of a full escalation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Repair passes run, including the final no-change pass of each loop
    pub passes: usize,
    pub layers_repaired: usize,
    pub pixels_added: usize,
    pub removal_ran: bool,
    pub layers_cleared: usize,
    pub pixels_removed: usize,
    /// Layers still holding islands afterwards
    pub islands_left: Vec<usize>,
}

impl RepairReport {
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} passes, {} pixels added in {} layers",
            self.passes, self.pixels_added, self.layers_repaired
        );
        if self.removal_ran {
            text.push_str(&format!(
                ", {} island pixels removed from {} layers",
                self.pixels_removed, self.layers_cleared
            ));
        }
        if self.islands_left.is_empty() {
            text.push_str(", no islands left");
        } else {
            text.push_str(&format!(", islands left in {} layers", self.islands_left.len()));
        }
        text
    }

    fn add_repair(&mut self, outcome: PassOutcome) {
        self.passes += 1;
        self.layers_repaired += outcome.layers;
        self.pixels_added += outcome.pixels;
    }
}

/// One repair pass over every layer that currently has islands.
///
/// Each layer gets at most [`MAX_REPAIR_ATTEMPTS`] rounds of local repair. A
/// changed layer is re-encoded and then it and the layer above are
/// re-analysed before moving on.
pub fn repair_pass(
    layers: &mut [CompactLayer],
    scratch: &mut AnalysisScratch,
    margin: usize,
    progress: Option<ProgressCallback>,
    cancel: Option<&AtomicBool>,
) -> Result<PassOutcome> {
    let targets = island_layers(layers);
    let mut outcome = PassOutcome::default();

    for (n, &index) in targets.iter().enumerate() {
        check_cancelled(cancel)?;
        // Repairing the layer below may already have supported this one
        if layers[index].island_count() == 0 {
            continue;
        }
        report(progress, || {
            PhotonProgress::with_message(
                PhotonPhase::Repairing,
                n + 1,
                targets.len(),
                format!("layer {index}"),
            )
        });

        let layer = &mut layers[index];
        layer.decode_classified_into(&mut scratch.raster);
        let mut filled = 0;
        for _ in 0..MAX_REPAIR_ATTEMPTS {
            let changed = scratch.raster.repair_islands();
            if changed == 0 {
                break;
            }
            filled += changed;
            scratch.raster.reduce();
            layer.update_islands(&mut scratch.raster);
            if layer.island_count() == 0 {
                break;
            }
        }

        if filled == 0 {
            tracing::warn!("Layer {} could not be repaired", index);
            report(progress, || {
                PhotonProgress::with_message(
                    PhotonPhase::Repairing,
                    n + 1,
                    targets.len(),
                    format!("layer {index}, but nothing could be done"),
                )
            });
            continue;
        }
        layer.encode(&scratch.raster);
        recalculate_pair(layers, index, scratch, margin)?;
        outcome.layers += 1;
        outcome.pixels += filled;
    }
    Ok(outcome)
}

/// Delete every island in every layer that currently has islands.
pub fn removal_pass(
    layers: &mut [CompactLayer],
    scratch: &mut AnalysisScratch,
    margin: usize,
    progress: Option<ProgressCallback>,
    cancel: Option<&AtomicBool>,
) -> Result<PassOutcome> {
    let targets = island_layers(layers);
    let mut outcome = PassOutcome::default();

    for (n, &index) in targets.iter().enumerate() {
        check_cancelled(cancel)?;
        if layers[index].island_count() == 0 {
            continue;
        }
        report(progress, || {
            PhotonProgress::with_message(
                PhotonPhase::Removing,
                n + 1,
                targets.len(),
                format!("layer {index}"),
            )
        });

        let layer = &mut layers[index];
        layer.decode_classified_into(&mut scratch.raster);
        let removed = scratch.raster.remove_islands();
        if removed == 0 {
            continue;
        }
        layer.encode(&scratch.raster);
        recalculate_pair(layers, index, scratch, margin)?;
        outcome.layers += 1;
        outcome.pixels += removed;
    }
    Ok(outcome)
}

/// Repair to a fixed point, fall back to one removal pass, then repair again.
pub fn fix_all(
    layers: &mut [CompactLayer],
    scratch: &mut AnalysisScratch,
    margin: usize,
    progress: Option<ProgressCallback>,
    cancel: Option<&AtomicBool>,
) -> Result<RepairReport> {
    let mut summary = RepairReport::default();
    repair_until_stable(layers, scratch, margin, progress, cancel, &mut summary)?;

    if !island_layers(layers).is_empty() {
        let removal = removal_pass(layers, scratch, margin, progress, cancel)?;
        summary.removal_ran = true;
        summary.layers_cleared = removal.layers;
        summary.pixels_removed = removal.pixels;
        if removal.changed() {
            repair_until_stable(layers, scratch, margin, progress, cancel, &mut summary)?;
        }
    }

    summary.islands_left = island_layers(layers);
    if !summary.islands_left.is_empty() {
        tracing::warn!("Islands remain in {} layers after repair", summary.islands_left.len());
    }
    tracing::info!("Island repair finished: {}", summary.summary());
    Ok(summary)
}

fn repair_until_stable(
    layers: &mut [CompactLayer],
    scratch: &mut AnalysisScratch,
    margin: usize,
    progress: Option<ProgressCallback>,
    cancel: Option<&AtomicBool>,
    summary: &mut RepairReport,
) -> Result<()> {
    loop {
        let outcome = repair_pass(layers, scratch, margin, progress, cancel)?;
        summary.add_repair(outcome);
        if !outcome.changed() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::recalculate_all;
    use crate::error::Error;
    use crate::raster::ExpandedRaster;

    fn analysed(rasters: &[ExpandedRaster]) -> (Vec<CompactLayer>, AnalysisScratch) {
        let (w, h) = (rasters[0].width(), rasters[0].height());
        let mut layers: Vec<_> = rasters
            .iter()
            .map(|r| CompactLayer::from_raster(r, 0.0, 1.0, 1.0))
            .collect();
        let mut scratch = AnalysisScratch::new(w, h);
        recalculate_all(&mut layers, &mut scratch, 0, None);
        (layers, scratch)
    }

    #[test]
    fn test_isolated_island_is_removed() {
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::from_fn(12, 12, |x, y| x < 2 && y < 2),
            ExpandedRaster::from_fn(12, 12, |x, y| (x < 2 && y < 2) || (x == 9 && y == 9)),
        ]);
        assert_eq!(layers[1].island_count(), 1);

        let report = fix_all(&mut layers, &mut scratch, 0, None, None).unwrap();
        assert!(report.removal_ran);
        assert_eq!(report.pixels_removed, 1);
        assert!(report.islands_left.is_empty());
        assert_eq!(layers[1].island_count(), 0);
        assert!(!layers[1].decode(12, 12).is_lit(9, 9));
        assert!(layers[1].decode(12, 12).is_lit(1, 1));
    }

    #[test]
    fn test_gap_is_bridged_without_removal() {
        // Supported bar at x 0..2; unsupported bar at x 3 one pixel away
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::from_fn(8, 8, |x, _| x < 2),
            ExpandedRaster::from_fn(8, 8, |x, _| x < 2 || x == 3),
        ]);
        assert_eq!(layers[1].island_count(), 1);

        let report = fix_all(&mut layers, &mut scratch, 0, None, None).unwrap();
        assert!(!report.removal_ran);
        assert!(report.pixels_added > 0);
        assert!(report.islands_left.is_empty());
        // The bar survives, now connected through the filled gap
        assert!(layers[1].decode(8, 8).is_lit(3, 4));
    }

    #[test]
    fn test_repair_rounds_capped_per_pass() {
        // An L-shaped island fills in its inside corner a little each round
        let l_shape = |x: usize, y: usize| (x == 2 && (2..30).contains(&y)) || (y == 2 && (2..30).contains(&x));
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::new(32, 32),
            ExpandedRaster::from_fn(32, 32, l_shape),
        ]);
        assert_eq!(layers[1].island_count(), 1);

        let mut expected = ExpandedRaster::new(32, 32);
        layers[1].decode_classified_into(&mut expected);
        let mut rounds_filled = 0;
        for _ in 0..MAX_REPAIR_ATTEMPTS {
            rounds_filled += expected.repair_islands();
            expected.reduce();
        }
        // Growth has not finished when the cap is reached
        assert!(expected.clone().repair_islands() > 0);

        let outcome = repair_pass(&mut layers, &mut scratch, 0, None, None).unwrap();
        assert_eq!(outcome.pixels, rounds_filled);
        assert_eq!(layers[1].pixels(), expected.lit_pixels());
        assert_eq!(layers[1].island_count(), 1);

        // The next pass picks up where the cap stopped
        let next = repair_pass(&mut layers, &mut scratch, 0, None, None).unwrap();
        assert!(next.changed());
    }

    #[test]
    fn test_removal_runs_once_when_it_exposes_new_islands() {
        // Layer 1's stray pixel is the only support for layer 2's
        let base = |x: usize, y: usize| x < 2 && y < 2;
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::from_fn(12, 12, base),
            ExpandedRaster::from_fn(12, 12, |x, y| base(x, y) || (x, y) == (9, 9)),
            ExpandedRaster::from_fn(12, 12, |x, y| base(x, y) || (x, y) == (9, 9)),
        ]);
        assert_eq!(island_layers(&layers), vec![1]);

        let messages = std::cell::RefCell::new(Vec::new());
        let callback = |p: &PhotonProgress| {
            if let Some(message) = &p.message {
                messages.borrow_mut().push((p.phase, message.clone()));
            }
        };
        let report = fix_all(&mut layers, &mut scratch, 0, Some(&callback), None).unwrap();

        assert!(report.removal_ran);
        assert_eq!(report.layers_cleared, 1);
        assert_eq!(report.pixels_removed, 1);
        assert_eq!(report.islands_left, vec![2]);
        assert!(layers[2].decode(12, 12).is_lit(9, 9));

        let messages = messages.borrow();
        let removals = messages.iter().filter(|(phase, _)| *phase == PhotonPhase::Removing).count();
        assert_eq!(removals, 1);
        assert!(messages.contains(&(
            PhotonPhase::Repairing,
            "layer 2, but nothing could be done".to_string()
        )));
    }

    #[test]
    fn test_layer_fixed_from_below_is_skipped() {
        // Bridging layer 1 at x 2 also supports layer 2's column there
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::from_fn(8, 8, |x, _| x < 2),
            ExpandedRaster::from_fn(8, 8, |x, _| x < 2 || x == 3),
            ExpandedRaster::from_fn(8, 8, |x, _| x == 2),
        ]);
        assert_eq!(island_layers(&layers), vec![1, 2]);

        let messages = std::cell::RefCell::new(Vec::new());
        let callback = |p: &PhotonProgress| messages.borrow_mut().push(p.message.clone());
        let outcome = repair_pass(&mut layers, &mut scratch, 0, Some(&callback), None).unwrap();

        assert_eq!(outcome.layers, 1);
        assert!(island_layers(&layers).is_empty());
        assert_eq!(*messages.borrow(), vec![Some("layer 1".to_string())]);
    }

    #[test]
    fn test_clean_file_single_pass() {
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::from_fn(4, 4, |_, _| true),
            ExpandedRaster::from_fn(4, 4, |x, _| x < 2),
        ]);
        let report = fix_all(&mut layers, &mut scratch, 0, None, None).unwrap();
        assert_eq!(report.passes, 1);
        assert!(!report.removal_ran);
        assert_eq!(report.summary(), "1 passes, 0 pixels added in 0 layers, no islands left");
    }

    #[test]
    fn test_cancelled_before_first_layer() {
        let (mut layers, mut scratch) = analysed(&[
            ExpandedRaster::from_fn(6, 6, |x, _| x == 0),
            ExpandedRaster::from_fn(6, 6, |x, _| x == 5),
        ]);
        let before = layers.clone();
        let cancel = AtomicBool::new(true);
        let err = fix_all(&mut layers, &mut scratch, 0, None, Some(&cancel)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(layers, before);
    }
}
