#![allow(non_snake_case)]
//! # PhotonSla
//!
//! A pure-Rust library for Photon / cbddlp mask-projection resin print jobs.
//!
//! ## Features
//!
//! - **Read / write** - Header, previews, print parameters, machine info and
//!   anti-aliased layer stacks, version 1 to 3
//! - **Island analysis** - Finds unsupported regions by comparing each layer
//!   with the one below it
//! - **Repair** - Bridges small gaps to supported material, falling back to
//!   removing islands that cannot be bridged
//! - **Margin checks** - Flags layers that come too close to the build area edge
//! - **Anti-aliasing** - Re-renders AA sub-layers with a 5x5 kernel
//!
//! ## Quick Start
//!
//! ```no_run
//! use photonsla::prelude::*;
//!
//! let mut file = PhotonFile::open("model.photon", 8, None)?;
//! println!("{}", file.layer_information());
//! println!("{}", file.margin_information());
//!
//! let report = file.fix_all(None, None)?;
//! println!("{}", report.summary());
//! file.save("model_fixed.photon", None)?;
//! file.close();
//! # Ok::<(), photonsla::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `photonsla` command-line binary

pub mod analysis;
pub mod config;
pub mod error;
pub mod formats;
pub mod progress;
pub mod raster;

// Re-exports for convenience
pub use error::{Error, FormatError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, FormatError, Result};
    pub use crate::formats::photon::{
        CompactLayer, PhotonFile, PhotonFileBuilder, PhotonHeader, PreviewImage, ProjectionType,
    };
    pub use crate::analysis::{MarginState, PassOutcome, RepairReport};
    pub use crate::raster::{AaMatrix, ExpandedRaster, Pixel};
    pub use crate::config::PhotonConfig;
    pub use crate::progress::{PhotonPhase, PhotonProgress, ProgressCallback};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
