//! CLI command for showing Photon file information

use std::path::Path;

use serde::Serialize;

use crate::analysis::MarginState;
use crate::formats::photon::PhotonFile;

/// Everything `info` prints, in a form `--json` can serialize.
#[derive(Debug, Serialize)]
struct FileInfo {
    path: String,
    version: u32,
    resolution: (u32, u32),
    bed_size_mm: (f32, f32, f32),
    layer_count: usize,
    layer_height_mm: f32,
    exposure_s: f32,
    bottom_exposure_s: f32,
    off_time_s: f32,
    bottom_layers: u32,
    print_time_s: u32,
    mirrored: bool,
    aa_levels: u32,
    light_pwm: (u16, u16),
    machine_name: Option<String>,
    previews: [(u32, u32); 2],
    total_pixels: u64,
    z_drift_mm: Option<f32>,
    island_layers: Vec<usize>,
    margin: MarginState,
}

impl FileInfo {
    fn collect(path: &Path, file: &PhotonFile) -> Self {
        let header = file.header();
        let [large, small] = file.previews();
        Self {
            path: path.display().to_string(),
            version: header.version(),
            resolution: file.resolution(),
            bed_size_mm: header.bed_size_mm(),
            layer_count: file.layer_count(),
            layer_height_mm: header.layer_height_mm(),
            exposure_s: header.exposure_s(),
            bottom_exposure_s: header.bottom_exposure_s(),
            off_time_s: header.off_time_s(),
            bottom_layers: header.bottom_layers(),
            print_time_s: header.print_time_s(),
            mirrored: header.is_mirrored(),
            aa_levels: file.aa_levels(),
            light_pwm: header.light_pwm(),
            machine_name: header
                .machine_info()
                .filter(|info| !info.is_empty())
                .map(crate::formats::photon::MachineInfo::name),
            previews: [large.resolution(), small.resolution()],
            total_pixels: file.total_pixels(),
            z_drift_mm: file.z_drift(),
            island_layers: file.island_layers(),
            margin: file.margin_state(),
        }
    }
}

/// Print header fields and layer statistics
pub fn execute(source: &Path, json: bool) -> anyhow::Result<()> {
    let file = PhotonFile::open(source, 0, None)?;
    let info = FileInfo::collect(source, &file);
    file.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Photon Information: {}", info.path);
    println!();
    println!("Version: {}", info.version);
    println!("Resolution: {}x{}", info.resolution.0, info.resolution.1);
    println!(
        "Bed size: {:.2} x {:.2} x {:.2} mm",
        info.bed_size_mm.0, info.bed_size_mm.1, info.bed_size_mm.2
    );
    if let Some(name) = &info.machine_name {
        println!("Machine: {name}");
    }
    println!("Projection: {}", if info.mirrored { "LCD mirror" } else { "cast" });
    println!();
    println!("Layers: {} ({} bottom)", info.layer_count, info.bottom_layers);
    println!("Layer height: {:.3} mm", info.layer_height_mm);
    println!(
        "Exposure: {}s (bottom {}s), off time {}s",
        info.exposure_s, info.bottom_exposure_s, info.off_time_s
    );
    println!("Print time: {}s", info.print_time_s);
    println!(
        "Anti-aliasing: {} level{}",
        info.aa_levels,
        if info.aa_levels == 1 { "" } else { "s" }
    );
    println!("Light PWM: {} (bottom {})", info.light_pwm.0, info.light_pwm.1);
    println!(
        "Previews: {}x{}, {}x{}",
        info.previews[0].0, info.previews[0].1, info.previews[1].0, info.previews[1].1
    );
    println!();
    println!("Lit pixels: {}", info.total_pixels);
    if let Some(drift) = info.z_drift_mm {
        println!("Z drift: {drift:.4} mm");
    }
    println!("Island layers: {}", info.island_layers.len());

    Ok(())
}
