use photonsla::analysis::MarginState;
use photonsla::formats::photon::{
    LAYER_RECORD_SIZE, MachineInfo, PhotonFile, PhotonFileBuilder, PreviewImage, compute_offsets,
};
use photonsla::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;

const SIZE: usize = 32;

/// A square pillar that narrows, then a pad floating beside it.
fn pillar(index: usize) -> ExpandedRaster {
    ExpandedRaster::from_fn(SIZE, SIZE, |x, y| {
        let inset = 4 + index.min(4);
        (inset..SIZE - inset).contains(&x) && (inset..SIZE - inset).contains(&y)
    })
}

fn sample_file(version: u32, margin: usize) -> PhotonFile {
    let preview = PreviewImage::from_rgb(&image::RgbImage::from_fn(16, 8, |x, _| {
        image::Rgb([(x * 16) as u8, 64, 200])
    }));
    let mut builder = PhotonFileBuilder::new(SIZE as u32, SIZE as u32)
        .version(version)
        .layer_height(0.05)
        .exposure(8.0, 50.0, 1.5)
        .bottom_layers(2)
        .margin(margin)
        .previews(preview.clone(), PreviewImage::empty());
    for index in 0..6 {
        builder = builder.add_layer(&pillar(index));
    }
    builder.build().unwrap()
}

fn payloads(file: &PhotonFile) -> Vec<Vec<u8>> {
    file.layers()
        .iter()
        .flat_map(|layer| {
            std::iter::once(layer.payload().to_vec())
                .chain(layer.companions().iter().map(|c| c.payload().to_vec()))
        })
        .collect()
}

/// Deterministic scatter of lit pixels for stress tests.
fn speckle(seed: u32, density: u32) -> ExpandedRaster {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let mut raster = ExpandedRaster::new(SIZE, SIZE);
    for y in 0..SIZE {
        for x in 0..SIZE {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            if state % 100 < density {
                raster.set(x, y, Pixel::Supported);
            }
        }
    }
    raster
}

#[test]
fn test_version_one_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pillar.photon");

    let mut original = sample_file(1, 0);
    original.save(&path, None).unwrap();
    let reopened = PhotonFile::open(&path, 0, None).unwrap();

    assert_eq!(reopened.version(), 1);
    assert_eq!(reopened.resolution(), (SIZE as u32, SIZE as u32));
    assert_eq!(reopened.layer_count(), 6);
    assert_eq!(reopened.information(), original.information());
    assert_eq!(reopened.previews(), original.previews());
    assert_eq!(payloads(&reopened), payloads(&original));
    assert_eq!(
        reopened.header().offsets().layer_table,
        original.header().offsets().layer_table
    );
    for (a, b) in reopened.layers().iter().zip(original.layers()) {
        assert_eq!(a.z_mm().to_bits(), b.z_mm().to_bits());
        assert_eq!(a.exposure_s().to_bits(), b.exposure_s().to_bits());
    }
}

#[test]
fn test_version_two_round_trip_with_companions() {
    let mut original = sample_file(2, 0);
    original.header_mut().set_machine_info(MachineInfo::named("Photon Mono"));
    original.set_aa_levels(4).unwrap();
    original.calculate_aa_layers(&AaMatrix::default(), None);

    let bytes = original.to_bytes().unwrap();
    let reopened = PhotonFile::from_bytes(&bytes, 0, None).unwrap();

    assert_eq!(reopened.version(), 2);
    assert!(reopened.has_aa());
    assert_eq!(reopened.aa_levels(), 4);
    assert_eq!(payloads(&reopened), payloads(&original));
    assert_eq!(reopened.header().print_parameters(), original.header().print_parameters());
    assert_eq!(reopened.header().machine_info().unwrap().name(), "Photon Mono");

    // Saving the reopened file reproduces the same bytes
    let mut again = reopened;
    assert_eq!(again.to_bytes().unwrap(), bytes);
}

#[test]
fn test_record_table_lists_base_layers_first() {
    let mut file = sample_file(2, 0);
    file.set_aa_levels(2).unwrap();
    let bytes = file.to_bytes().unwrap();
    let table = file.header().offsets().layer_table as usize;

    // Record n < layer_count points at base layer n
    for (index, layer) in file.layers().iter().enumerate() {
        let at = table + index * LAYER_RECORD_SIZE + 12;
        let address = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        assert_eq!(address, layer.address());
    }
    // Payloads are laid out layer by layer, companions right after their base
    let first = &file.layers()[0];
    assert_eq!(
        first.companions()[0].address(),
        first.address() + first.payload().len() as u32
    );
}

#[test]
fn test_recalculate_is_idempotent() {
    let mut file = sample_file(1, 6);
    file.recalculate(None);
    let first = (file.layer_information(), file.margin_information(), file.total_pixels());
    file.recalculate(None);
    let second = (file.layer_information(), file.margin_information(), file.total_pixels());
    assert_eq!(first, second);
}

#[test]
fn test_margin_disabled_differs_from_clean() {
    let disabled = sample_file(1, 0);
    assert_eq!(disabled.margin_state(), MarginState::Disabled);

    let mut checked = sample_file(1, 2);
    assert_eq!(
        checked.margin_state(),
        MarginState::Checked {
            margin: 2,
            layers: Vec::new()
        }
    );
    assert_ne!(disabled.margin_information(), checked.margin_information());

    // The widest layers start 4 pixels from the edge
    checked.set_margin(5);
    assert_eq!(checked.margin_state().violations(), Some(&[0][..]));
}

#[test]
fn test_floating_layer_island_removed() {
    let corner = ExpandedRaster::from_fn(SIZE, SIZE, |x, y| x < 4 && y < 4);
    let floating = ExpandedRaster::from_fn(SIZE, SIZE, |x, y| (20..24).contains(&x) && (20..24).contains(&y));
    let mut file = PhotonFileBuilder::new(SIZE as u32, SIZE as u32)
        .add_layer(&corner)
        .add_layer(&floating)
        .build()
        .unwrap();

    assert_eq!(file.layers()[1].island_count(), 1);
    assert_eq!(file.island_layers(), vec![1]);

    let removed = file.remove_all_islands(None, None).unwrap();
    assert_eq!(removed.pixels, 16);
    assert_eq!(file.layers()[1].island_count(), 0);
    assert_eq!(file.layers()[1].pixels(), 0);
    assert_eq!(file.layer_information(), "No islands found");
}

#[test]
fn test_repair_escalation_terminates() {
    let mut builder = PhotonFileBuilder::new(SIZE as u32, SIZE as u32);
    for seed in 1..8 {
        builder = builder.add_layer(&speckle(seed, 45));
    }
    let mut file = builder.build().unwrap();
    assert!(!file.island_layers().is_empty());

    let report = file.fix_all(None, None).unwrap();
    assert!(report.passes >= 1);
    assert_eq!(report.islands_left, file.island_layers());
    if !report.removal_ran {
        assert!(report.islands_left.is_empty());
    }

    // Once clean, a second escalation has nothing to do
    if report.islands_left.is_empty() {
        let again = file.fix_all(None, None).unwrap();
        assert_eq!(again.pixels_added, 0);
        assert!(!again.removal_ran);
    }
}

#[test]
fn test_cancelled_repair_leaves_layers_untouched() {
    let mut file = PhotonFileBuilder::new(SIZE as u32, SIZE as u32)
        .add_layer(&pillar(0))
        .add_layer(&ExpandedRaster::from_fn(SIZE, SIZE, |x, y| x < 2 && y < 2))
        .build()
        .unwrap();
    assert_eq!(file.island_layers(), vec![1]);
    let before = payloads(&file);

    let cancel = AtomicBool::new(true);
    let err = file.fix_all(None, Some(&cancel)).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(payloads(&file), before);
}

#[test]
fn test_aa_levels_grow_record_table() {
    let mut file = sample_file(2, 0);
    let before = compute_offsets(&file).unwrap();

    file.set_aa_levels(4).unwrap();
    for layer in file.layers() {
        assert_eq!(layer.companions().len(), 3);
        assert!(layer.companions().iter().all(|c| !c.payload().is_empty()));
    }
    let after = compute_offsets(&file).unwrap();
    assert_eq!(
        after.payload_start - before.payload_start,
        (LAYER_RECORD_SIZE * 3 * file.layer_count()) as u32
    );
}

#[test]
fn test_aa_levels_rejected_on_version_one() {
    let mut file = sample_file(1, 0);
    assert!(matches!(
        file.set_aa_levels(2),
        Err(Error::AntiAliasingUnsupported { version: 1 })
    ));
    assert!(matches!(
        sample_file(2, 0).set_aa_levels(17),
        Err(Error::InvalidAntiAliasingLevel { levels: 17 })
    ));
}

#[test]
fn test_z_drift_reports_missing_layer_height() {
    let mut file = sample_file(1, 0);
    let height = file.header().layer_height_mm();
    let last = file.layer_count() - 1;
    assert!(file.z_drift().unwrap().abs() < 1e-6);

    file.set_layer_z(last, height * (last - 1) as f32).unwrap();
    assert!((file.z_drift().unwrap() - height).abs() < 1e-6);

    // Diagnostic only: nothing was corrected
    assert!((file.layers()[last].z_mm() - height * (last - 1) as f32).abs() < 1e-6);
}

#[test]
fn test_upgrade_then_round_trip() {
    let mut file = sample_file(1, 0);
    file.upgrade_to_version_2();
    let bytes = file.to_bytes().unwrap();
    let reopened = PhotonFile::from_bytes(&bytes, 0, None).unwrap();
    assert_eq!(reopened.version(), 2);
    assert_eq!(reopened.aa_levels(), 1);
    assert_eq!(reopened.header().light_pwm(), (255, 255));
    assert!(reopened.header().machine_info().unwrap().is_empty());
}

#[test]
fn test_truncated_file_is_format_error() {
    let mut file = sample_file(1, 0);
    let bytes = file.to_bytes().unwrap();

    let err = PhotonFile::from_bytes(&bytes[..bytes.len() - 10], 0, None).unwrap_err();
    assert!(matches!(err, Error::Format(_)));

    let err = PhotonFile::from_bytes(&bytes[..40], 0, None).unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::Truncated { .. })));
}

#[test]
fn test_oversized_resolution_is_format_error() {
    let mut file = sample_file(1, 0);
    let mut bytes = file.to_bytes().unwrap();
    bytes[52..56].copy_from_slice(&u32::MAX.to_le_bytes());
    bytes[56..60].copy_from_slice(&u32::MAX.to_le_bytes());

    let err = PhotonFile::from_bytes(&bytes, 0, None).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(FormatError::InvalidResolution { x: u32::MAX, y: u32::MAX })
    ));
}

#[test]
fn test_progress_reports_every_layer() {
    let mut file = sample_file(1, 0);
    let bytes = file.to_bytes().unwrap();

    let seen = std::cell::RefCell::new(Vec::new());
    let callback = |p: &PhotonProgress| {
        if p.phase == PhotonPhase::ReadingLayers {
            seen.borrow_mut().push(p.current);
        }
    };
    PhotonFile::from_bytes(&bytes, 0, Some(&callback)).unwrap().close();
    assert_eq!(*seen.borrow(), vec![1, 2, 3, 4, 5, 6]);
}
