//! Cross-layer island and margin analysis
//!
//! Every whole-file operation here works through one caller-owned
//! [`AnalysisScratch`], so a scan over hundreds of layers allocates a single
//! raster.

mod margin;
mod repair;

pub use margin::{MarginState, margin_information, margin_state};
pub use repair::{
    MAX_REPAIR_ATTEMPTS, PassOutcome, RepairReport, fix_all, removal_pass, repair_pass,
};

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::formats::photon::CompactLayer;
use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback, report};
use crate::raster::ExpandedRaster;

/// Most layer indices a summary lists before eliding the rest.
pub const SUMMARY_LIMIT: usize = 10;

/// Reusable working memory for whole-file scans.
#[derive(Debug, Clone)]
pub struct AnalysisScratch {
    pub raster: ExpandedRaster,
    /// Lit mask of the layer below the one being classified
    pub below: Vec<bool>,
    /// Anti-aliasing coverage buffer
    pub coverage: Vec<u8>,
}

impl AnalysisScratch {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            raster: ExpandedRaster::new(width, height),
            below: Vec::with_capacity(width * height),
            coverage: Vec::new(),
        }
    }
}

/// Authoritative island and margin analysis of every layer.
pub fn recalculate_all(
    layers: &mut [CompactLayer],
    scratch: &mut AnalysisScratch,
    margin: usize,
    progress: Option<ProgressCallback>,
) {
    let total = layers.len();
    for (index, layer) in layers.iter_mut().enumerate() {
        report(progress, || PhotonProgress::new(PhotonPhase::Analyzing, index + 1, total));
        layer.decode_into(&mut scratch.raster);
        let below = (index > 0).then_some(scratch.below.as_slice());
        scratch.raster.classify(below);
        layer.store_analysis(&mut scratch.raster, margin);
        scratch.raster.lit_mask_into(&mut scratch.below);
    }
    tracing::debug!("Analyzed {} layers", total);
}

/// Authoritative analysis of a single layer against the one below it.
pub fn recalculate_layer(
    layers: &mut [CompactLayer],
    index: usize,
    scratch: &mut AnalysisScratch,
    margin: usize,
) -> Result<()> {
    let count = layers.len();
    if index >= count {
        return Err(Error::LayerIndexOutOfRange { index, count });
    }
    if index > 0 {
        layers[index - 1].decode_into(&mut scratch.raster);
        scratch.raster.lit_mask_into(&mut scratch.below);
    }
    layers[index].decode_into(&mut scratch.raster);
    let below = (index > 0).then_some(scratch.below.as_slice());
    scratch.raster.classify(below);
    layers[index].store_analysis(&mut scratch.raster, margin);
    Ok(())
}

/// Recompute `index` and, if it exists, the layer above it.
pub(crate) fn recalculate_pair(
    layers: &mut [CompactLayer],
    index: usize,
    scratch: &mut AnalysisScratch,
    margin: usize,
) -> Result<()> {
    recalculate_layer(layers, index, scratch, margin)?;
    if index + 1 < layers.len() {
        recalculate_layer(layers, index + 1, scratch, margin)?;
    }
    Ok(())
}

/// Indices of layers whose cached island count is nonzero.
#[must_use]
pub fn island_layers(layers: &[CompactLayer]) -> Vec<usize> {
    layers
        .iter()
        .enumerate()
        .filter(|(_, layer)| layer.island_count() > 0)
        .map(|(index, _)| index)
        .collect()
}

/// Human-readable island summary.
#[must_use]
pub fn island_information(layers: &[CompactLayer]) -> String {
    let indices = island_layers(layers);
    if indices.is_empty() {
        "No islands found".to_string()
    } else {
        format!(
            "{} layers with islands: {}",
            indices.len(),
            bounded_list(&indices)
        )
    }
}

/// Comma-separated indices, at most [`SUMMARY_LIMIT`] of them.
#[must_use]
pub fn bounded_list(indices: &[usize]) -> String {
    let mut text = indices
        .iter()
        .take(SUMMARY_LIMIT)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if indices.len() > SUMMARY_LIMIT {
        text.push_str(", ...");
    }
    text
}

pub(crate) fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<()> {
    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return Err(Error::Cancelled);
    }
    Ok(())
}
