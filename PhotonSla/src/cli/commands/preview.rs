//! CLI command for preview export

use std::path::Path;

use crate::cli::progress::{PICTURE, print_step};
use crate::formats::photon::PhotonFile;

/// Save the large (or small) preview as PNG.
pub fn execute(source: &Path, output: &Path, small: bool) -> anyhow::Result<()> {
    let file = PhotonFile::open(source, 0, None)?;
    let preview = &file.previews()[usize::from(small)];
    let (width, height) = preview.resolution();
    if width == 0 || height == 0 {
        anyhow::bail!("{} has no {} preview", source.display(), if small { "small" } else { "large" });
    }

    print_step(1, 1, PICTURE, &format!("Writing {width}x{height} preview to {}...", output.display()));
    preview.save_png(output)?;
    file.close();
    Ok(())
}
