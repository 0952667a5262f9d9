//! CLI progress display utilities
//!
//! Step indicators with emojis, plus a bar that follows library progress
//! callbacks.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use crate::progress::PhotonProgress;

// =============================================================================
// Emoji Constants (with ASCII fallbacks for terminals without emoji support)
// =============================================================================

/// Magnifying glass - for reading/scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Floppy disk - for writing/saving operations
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Wrench - for repair operations
pub static WRENCH: Emoji<'_, '_> = Emoji("🔧 ", "");
/// Gear - for processing/conversion operations
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
/// Picture - for preview export
pub static PICTURE: Emoji<'_, '_> = Emoji("🖼️  ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

/// Print a step indicator: `[1/3] 🔍 Message...`
///
/// # Example
/// ```ignore
/// print_step(1, 3, LOOKING_GLASS, "Reading file...");
/// print_step(2, 3, WRENCH, "Repairing islands...");
/// print_step(3, 3, DISK, "Writing file...");
/// ```
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Progress bar style for determinate progress
///
/// Format: `Analyzing layers [████████░░░░░░░░] 50/100`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .expect("valid template")
}

/// Create a progress bar that stays hidden until the first update
#[must_use]
pub fn phase_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(bar_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Mirror a library progress update onto a bar.
pub fn update_bar(pb: &ProgressBar, progress: &PhotonProgress) {
    pb.set_length(progress.total as u64);
    pb.set_position(progress.current as u64);
    match &progress.message {
        Some(detail) => pb.set_message(format!("{} ({detail})", progress.phase.as_str())),
        None => pb.set_message(progress.phase.as_str()),
    }
}
