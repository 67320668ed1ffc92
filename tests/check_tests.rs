mod support;

use meshcut::config::BuildVolume;
use meshcut::errors::SegmentationError;
use meshcut::io::IoError;
use meshcut::{check_file, check_mesh};
use support::{block, write_model};

#[test]
fn oversized_block_needs_one_cut() {
    let report = check_mesh(&block(300.0, 200.0, 150.0), &BuildVolume::default()).unwrap();
    assert!(report.needs_segmentation);
    assert_eq!(report.exceeds_by_mm, [44.0, 0.0, 0.0]);
    assert_eq!(report.recommended_cuts, 1);
    assert_eq!(report.build_volume_mm, [256.0, 256.0, 256.0]);
}

#[test]
fn fitting_block_needs_nothing() {
    let report = check_mesh(&block(200.0, 150.0, 100.0), &BuildVolume::default()).unwrap();
    assert!(!report.needs_segmentation);
    assert_eq!(report.recommended_cuts, 0);
    assert_eq!(report.exceeds_by_mm, [0.0, 0.0, 0.0]);
}

#[test]
fn small_printer_needs_a_grid_of_cuts() {
    let report = check_mesh(&block(300.0, 300.0, 50.0), &BuildVolume::new(180.0, 180.0, 180.0)).unwrap();
    assert!(report.needs_segmentation);
    assert_eq!(report.recommended_cuts, 3);
}

#[test]
fn check_reads_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), "block", &block(300.0, 200.0, 150.0));
    let report = check_file(&path, &BuildVolume::default()).unwrap();
    assert!(report.needs_segmentation);
    assert!(support::approx_eq(report.dimensions_mm[0], 300.0, 1e-3));
}

#[test]
fn missing_file_is_reported() {
    let result = check_file("no/such/model.stl", &BuildVolume::default());
    assert!(matches!(
        result,
        Err(SegmentationError::MeshLoad {
            source: IoError::FileNotFound { .. },
            ..
        })
    ));
}
