//! The Photon file aggregate
//!
//! SPDX-License-Identifier: MIT

use std::path::Path;
use std::sync::atomic::AtomicBool;

use super::header::{PhotonHeader, check_resolution};
use super::layer::CompactLayer;
use super::preview::PreviewImage;
use super::{MAX_VERSION, reader, writer};
use crate::analysis::{
    self, AnalysisScratch, MarginState, PassOutcome, RepairReport, island_information,
    island_layers, margin_information, margin_state,
};
use crate::error::{Error, FormatError, Result};
use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback, report};
use crate::raster::{AaMatrix, ExpandedRaster};

/// A Photon print job: header, two previews and the layer stack.
///
/// Analysis results (island counts, lit pixels, margin flags) are cached on
/// each layer. Operations that change pixels refresh them; settings changes
/// such as [`PhotonFile::set_aa_levels`] do not, so call
/// [`PhotonFile::recalculate`] afterwards.
#[derive(Debug, Clone)]
pub struct PhotonFile {
    pub(crate) header: PhotonHeader,
    pub(crate) previews: [PreviewImage; 2],
    pub(crate) layers: Vec<CompactLayer>,
    /// Margin in pixels; 0 disables the check.
    margin: usize,
}

impl PhotonFile {
    pub(crate) fn from_parts(
        header: PhotonHeader,
        previews: [PreviewImage; 2],
        layers: Vec<CompactLayer>,
        margin: usize,
    ) -> Self {
        Self {
            header,
            previews,
            layers,
            margin,
        }
    }

    /// Open and analyse a Photon file.
    pub fn open<P: AsRef<Path>>(
        path: P,
        margin: usize,
        progress: Option<ProgressCallback>,
    ) -> Result<Self> {
        reader::read_photon(path, margin, progress)
    }

    /// Parse and analyse a Photon file held in memory.
    pub fn from_bytes(data: &[u8], margin: usize, progress: Option<ProgressCallback>) -> Result<Self> {
        reader::parse_photon_bytes(data, margin, progress)
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P, progress: Option<ProgressCallback>) -> Result<()> {
        writer::write_photon(path, self, progress)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        writer::serialize_photon(self, None)
    }

    /// Release every layer, both previews and the header.
    pub fn close(self) {
        tracing::debug!("Releasing Photon file with {} layers", self.layers.len());
        drop(self);
    }

    fn scratch(&self) -> AnalysisScratch {
        AnalysisScratch::new(
            self.header.resolution_x() as usize,
            self.header.resolution_y() as usize,
        )
    }

    // ==================== Analysis ====================

    /// Authoritative island and margin analysis of every layer.
    pub fn recalculate(&mut self, progress: Option<ProgressCallback>) {
        let mut scratch = self.scratch();
        analysis::recalculate_all(&mut self.layers, &mut scratch, self.margin, progress);
    }

    /// Authoritative analysis of one layer.
    pub fn recalculate_layer(&mut self, index: usize) -> Result<()> {
        let mut scratch = self.scratch();
        analysis::recalculate_layer(&mut self.layers, index, &mut scratch, self.margin)
    }

    /// Full repair escalation: repair, then removal if needed, then repair.
    pub fn fix_all(
        &mut self,
        progress: Option<ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<RepairReport> {
        let mut scratch = self.scratch();
        analysis::fix_all(&mut self.layers, &mut scratch, self.margin, progress, cancel)
    }

    /// A single repair pass over the layers that currently have islands.
    pub fn repair_pass(
        &mut self,
        progress: Option<ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<PassOutcome> {
        let mut scratch = self.scratch();
        analysis::repair_pass(&mut self.layers, &mut scratch, self.margin, progress, cancel)
    }

    /// Delete every island outright.
    pub fn remove_all_islands(
        &mut self,
        progress: Option<ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<PassOutcome> {
        let mut scratch = self.scratch();
        analysis::removal_pass(&mut self.layers, &mut scratch, self.margin, progress, cancel)
    }

    /// Change the margin and re-run the analysis.
    pub fn set_margin(&mut self, margin: usize) {
        self.margin = margin;
        self.recalculate(None);
    }

    #[must_use]
    pub fn margin(&self) -> usize {
        self.margin
    }

    #[must_use]
    pub fn island_layers(&self) -> Vec<usize> {
        island_layers(&self.layers)
    }

    #[must_use]
    pub fn margin_state(&self) -> MarginState {
        margin_state(&self.layers, self.margin)
    }

    /// Island status summary.
    #[must_use]
    pub fn layer_information(&self) -> String {
        island_information(&self.layers)
    }

    /// Margin status summary.
    #[must_use]
    pub fn margin_information(&self) -> String {
        margin_information(&self.margin_state())
    }

    /// Exposure settings summary.
    #[must_use]
    pub fn information(&self) -> String {
        self.header.information()
    }

    /// Lit pixels across all base layers, as of the last analysis.
    #[must_use]
    pub fn total_pixels(&self) -> u64 {
        self.layers.iter().map(CompactLayer::pixels).sum()
    }

    /// Expected top height minus the last layer's recorded Z.
    ///
    /// `None` for a file without layers. Never corrected automatically.
    #[must_use]
    pub fn z_drift(&self) -> Option<f32> {
        let last = self.layers.last()?;
        let expected = self.header.layer_height_mm() * (self.layers.len() - 1) as f32;
        Some(expected - last.z_mm())
    }

    // ==================== Settings ====================

    /// Change the number of AA levels. Analysis is not refreshed.
    pub fn set_aa_levels(&mut self, levels: u32) -> Result<()> {
        self.header.set_aa_levels(levels, &mut self.layers)
    }

    /// Convert a version 1 file to version 2 with default print parameters.
    ///
    /// Newer files are left untouched.
    pub fn upgrade_to_version_2(&mut self) {
        if self.header.version() > 1 {
            return;
        }
        self.header.set_file_version(2);
        for layer in &mut self.layers {
            layer.resize_companions(0);
        }
        tracing::info!("Upgraded to version 2");
    }

    /// Re-render every AA companion from its base layer.
    pub fn calculate_aa_layers(&mut self, matrix: &AaMatrix, progress: Option<ProgressCallback>) {
        let levels = self.header.aa_levels();
        if levels <= 1 {
            return;
        }
        let (width, height) = (
            self.header.resolution_x() as usize,
            self.header.resolution_y() as usize,
        );
        let mut scratch = self.scratch();
        let total = self.layers.len();
        for (index, layer) in self.layers.iter_mut().enumerate() {
            report(progress, || {
                PhotonProgress::new(PhotonPhase::RenderingAntiAliasing, index + 1, total)
            });
            layer.decode_into(&mut scratch.raster);
            scratch.raster.lit_mask_into(&mut scratch.below);
            matrix.convolve(&scratch.below, width, height, &mut scratch.coverage);
            for (level, companion) in layer.companions_mut().iter_mut().enumerate() {
                scratch
                    .raster
                    .load_coverage(&scratch.coverage, AaMatrix::threshold(levels, level));
                companion.encode(&scratch.raster);
            }
        }
    }

    /// Set each layer's Z to its index times the layer height.
    pub fn normalize_layer_heights(&mut self) {
        let height = self.header.layer_height_mm();
        for (index, layer) in self.layers.iter_mut().enumerate() {
            let z = height * index as f32;
            layer.set_z_mm(z);
            for companion in layer.companions_mut() {
                companion.set_z_mm(z);
            }
        }
    }

    /// Apply the header's exposure and off times to every layer.
    pub fn apply_exposure_settings(&mut self) {
        let bottom = self.header.bottom_layers() as usize;
        let (normal, bottom_exposure, off) = (
            self.header.exposure_s(),
            self.header.bottom_exposure_s(),
            self.header.off_time_s(),
        );
        for (index, layer) in self.layers.iter_mut().enumerate() {
            let exposure = if index < bottom { bottom_exposure } else { normal };
            layer.set_timing(exposure, off);
        }
    }

    // ==================== Accessors ====================

    #[must_use]
    pub fn header(&self) -> &PhotonHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut PhotonHeader {
        &mut self.header
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        (self.header.resolution_x(), self.header.resolution_y())
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.header.version()
    }

    #[must_use]
    pub fn has_aa(&self) -> bool {
        self.header.has_aa()
    }

    #[must_use]
    pub fn aa_levels(&self) -> u32 {
        self.header.aa_levels()
    }

    /// Large and small preview.
    #[must_use]
    pub fn previews(&self) -> &[PreviewImage; 2] {
        &self.previews
    }

    pub fn set_preview(&mut self, index: usize, preview: PreviewImage) -> Result<()> {
        let slot = self
            .previews
            .get_mut(index)
            .ok_or(Error::LayerIndexOutOfRange { index, count: 2 })?;
        *slot = preview;
        Ok(())
    }

    #[must_use]
    pub fn layers(&self) -> &[CompactLayer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Result<&CompactLayer> {
        self.layers.get(index).ok_or(Error::LayerIndexOutOfRange {
            index,
            count: self.layers.len(),
        })
    }

    /// Decode one layer into a caller-owned raster.
    pub fn decode_layer_into(&self, index: usize, raster: &mut ExpandedRaster) -> Result<()> {
        self.layer(index)?.decode_into(raster);
        Ok(())
    }

    /// Set a layer's Z position. Analysis is unaffected.
    pub fn set_layer_z(&mut self, index: usize, z_mm: f32) -> Result<()> {
        let count = self.layers.len();
        let layer = self
            .layers
            .get_mut(index)
            .ok_or(Error::LayerIndexOutOfRange { index, count })?;
        layer.set_z_mm(z_mm);
        Ok(())
    }
}

/// Builds a [`PhotonFile`] from rasters.
#[derive(Debug)]
pub struct PhotonFileBuilder {
    header: PhotonHeader,
    previews: [PreviewImage; 2],
    layers: Vec<CompactLayer>,
    margin: usize,
    version: u32,
    /// First added raster whose size differs from the resolution.
    mismatched: Option<(usize, usize, usize)>,
}

impl PhotonFileBuilder {
    /// Start a version 1 file with stock settings.
    #[must_use]
    pub fn new(resolution_x: u32, resolution_y: u32) -> Self {
        Self {
            header: PhotonHeader::new(resolution_x, resolution_y),
            previews: [PreviewImage::empty(), PreviewImage::empty()],
            layers: Vec::new(),
            margin: 0,
            version: 1,
            mismatched: None,
        }
    }

    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn layer_height(mut self, height_mm: f32) -> Self {
        self.header.set_layer_height_mm(height_mm);
        self
    }

    /// Normal exposure, bottom exposure and off time in seconds.
    #[must_use]
    pub fn exposure(mut self, exposure_s: f32, bottom_exposure_s: f32, off_time_s: f32) -> Self {
        self.header.set_exposure_s(exposure_s);
        self.header.set_bottom_exposure_s(bottom_exposure_s);
        self.header.set_off_time_s(off_time_s);
        self
    }

    #[must_use]
    pub fn bottom_layers(mut self, count: u32) -> Self {
        self.header.set_bottom_layers(count);
        self
    }

    #[must_use]
    pub fn margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    #[must_use]
    pub fn previews(mut self, large: PreviewImage, small: PreviewImage) -> Self {
        self.previews = [large, small];
        self
    }

    /// Append a layer; Z and exposure follow from its position.
    #[must_use]
    pub fn add_layer(mut self, raster: &ExpandedRaster) -> Self {
        let index = self.layers.len();
        let expected = (
            self.header.resolution_x() as usize,
            self.header.resolution_y() as usize,
        );
        if self.mismatched.is_none() && (raster.width(), raster.height()) != expected {
            self.mismatched = Some((index, raster.width(), raster.height()));
        }
        let exposure = if index < self.header.bottom_layers() as usize {
            self.header.bottom_exposure_s()
        } else {
            self.header.exposure_s()
        };
        let z = self.header.layer_height_mm() * index as f32;
        self.layers.push(CompactLayer::from_raster(
            raster,
            z,
            exposure,
            self.header.off_time_s(),
        ));
        self
    }

    /// Validate and analyse the file.
    pub fn build(self) -> Result<PhotonFile> {
        let (x, y) = (self.header.resolution_x(), self.header.resolution_y());
        check_resolution(x, y)?;
        if let Some((index, width, height)) = self.mismatched {
            return Err(FormatError::Inconsistent(format!(
                "layer {index} is {width}x{height}, file resolution is {x}x{y}"
            ))
            .into());
        }
        if !(1..=MAX_VERSION).contains(&self.version) {
            return Err(FormatError::UnsupportedVersion(self.version).into());
        }

        let mut header = self.header;
        if self.version > 1 {
            header.set_file_version(self.version);
        }
        header.set_layer_count(self.layers.len() as u32);

        let mut file = PhotonFile::from_parts(header, self.previews, self.layers, self.margin);
        file.recalculate(None);
        Ok(file)
    }
}
