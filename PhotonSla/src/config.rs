//! Analysis settings loaded from TOML
//!
//! ```toml
//! margin = 8
//! aa_kernel = [
//!     [0, 0, 0, 0, 0],
//!     [0, 1, 2, 1, 0],
//!     [0, 2, 4, 2, 0],
//!     [0, 1, 2, 1, 0],
//!     [0, 0, 0, 0, 0],
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::raster::AaMatrix;

/// User settings for analysis and anti-aliasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotonConfig {
    /// Edge margin in pixels; 0 disables the margin check
    pub margin: usize,
    /// 5x5 anti-aliasing kernel; the 3x3 box blur when absent
    pub aa_kernel: Option<[[u32; 5]; 5]>,
}

impl PhotonConfig {
    /// `<config dir>/photonsla/config.toml`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("photonsla").join("config.toml"))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Load the file at [`PhotonConfig::default_path`], or defaults if there is none.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    #[must_use]
    pub fn aa_matrix(&self) -> AaMatrix {
        self.aa_kernel.map(AaMatrix::new).unwrap_or_default()
    }
}
