//! Command execution implementations

use super::Commands;
use super::{check, info, preview, repair, upgrade};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { source, json } => info::execute(source, *json),
            Commands::Check {
                source,
                margin,
                config,
                quiet,
            } => check::execute(source, *margin, config.as_deref(), *quiet),
            Commands::Repair {
                source,
                output,
                margin,
                config,
                quiet,
            } => repair::execute(
                source,
                output.as_deref(),
                *margin,
                config.as_deref(),
                *quiet,
            ),
            Commands::Upgrade {
                source,
                output,
                aa,
                config,
                quiet,
            } => upgrade::execute(source, output, *aa, config.as_deref(), *quiet),
            Commands::Preview {
                source,
                output,
                small,
            } => preview::execute(source, output, *small),
        }
    }
}
