use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::config::PhotonConfig;

mod execute;

pub mod check;
pub mod info;
pub mod preview;
pub mod repair;
pub mod upgrade;

#[derive(Subcommand)]
pub enum Commands {
    /// Show header fields and layer statistics
    Info {
        /// Photon file
        source: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report islands, margin violations and Z drift
    Check {
        /// Photon file
        source: PathBuf,

        /// Edge margin in pixels (0 disables; overrides the config file)
        #[arg(short, long)]
        margin: Option<usize>,

        /// Config file (defaults to <config dir>/photonsla/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Repair islands, removing those that cannot be bridged
    Repair {
        /// Photon file
        source: PathBuf,

        /// Output file (defaults to <name>_fixed.<ext> next to the source)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Edge margin in pixels (0 disables; overrides the config file)
        #[arg(short, long)]
        margin: Option<usize>,

        /// Config file (defaults to <config dir>/photonsla/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Upgrade to version 2, optionally adding anti-aliasing levels
    Upgrade {
        /// Photon file
        source: PathBuf,

        /// Output file
        output: PathBuf,

        /// Anti-aliasing levels to render (1-16)
        #[arg(long)]
        aa: Option<u32>,

        /// Config file providing the anti-aliasing kernel
        #[arg(long)]
        config: Option<PathBuf>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Export a preview image as PNG
    Preview {
        /// Photon file
        source: PathBuf,

        /// Output PNG file
        output: PathBuf,

        /// Export the small preview instead of the large one
        #[arg(long)]
        small: bool,
    },
}

/// Load `path`, or the default config file when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<PhotonConfig> {
    let config = match path {
        Some(path) => PhotonConfig::load(path)?,
        None => PhotonConfig::load_default()?,
    };
    Ok(config)
}
