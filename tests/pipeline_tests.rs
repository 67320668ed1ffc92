mod support;

use meshcut::config::{HollowAlgorithm, HollowStrategy, JointType, SegmentationConfig};
use meshcut::hollow::{HollowSettings, Hollower, ShellHollower};
use meshcut::mesh::polygon::FaceTag;
use meshcut::{Mesh, segment_mesh};
use support::{all_fit, block};

#[test]
fn fitting_model_is_untouched() {
    let mesh = block(200.0, 150.0, 100.0);
    let segmentation = segment_mesh(&mesh, &SegmentationConfig::default()).unwrap();
    assert_eq!(segmentation.parts.len(), 1);
    assert!(segmentation.search.is_none());
    assert!(segmentation.hardware.is_empty());
    assert!(support::approx_eq(segmentation.parts[0].volume(), mesh.volume(), 1e-6));
}

#[test]
fn dowels_are_counted_as_hardware() {
    let mesh = block(300.0, 60.0, 60.0);
    let config = SegmentationConfig::default().with_greedy_search();
    let segmentation = segment_mesh(&mesh, &config).unwrap();

    assert_eq!(segmentation.parts.len(), 2);
    assert!(all_fit(&segmentation.parts, &config.build_volume));
    assert!(!segmentation.joints.is_empty());
    assert_eq!(
        segmentation.hardware.get("dowel Ø6×20mm").copied(),
        Some(segmentation.joints.len())
    );
    assert!(segmentation.assembly_note.contains("dowel"));
    // Holes only remove material.
    let volume: f64 = segmentation.parts.iter().map(Mesh::volume).sum();
    assert!(volume < mesh.volume());
}

#[test]
fn integrated_pins_need_no_hardware() {
    let mesh = block(300.0, 60.0, 60.0);
    let config = SegmentationConfig::default()
        .with_joint(JointType::Integrated)
        .with_greedy_search();
    let segmentation = segment_mesh(&mesh, &config).unwrap();
    assert!(!segmentation.joints.is_empty());
    assert!(segmentation.hardware.is_empty());
    assert!(all_fit(&segmentation.parts, &config.build_volume));
}

#[test]
fn unjointed_parts_keep_their_volume() {
    let mesh = block(520.0, 80.0, 80.0);
    let config = SegmentationConfig::default()
        .with_joint(JointType::None)
        .with_greedy_search();
    let segmentation = segment_mesh(&mesh, &config).unwrap();
    assert!(segmentation.parts.len() >= 3);
    assert!(segmentation.joints.is_empty());
    let volume: f64 = segmentation.parts.iter().map(Mesh::volume).sum();
    assert!(support::approx_eq(volume, mesh.volume(), 1e-3 * mesh.volume()));
}

#[test]
fn segment_then_hollow_leaves_cavities() {
    let mesh = block(300.0, 80.0, 80.0);
    let config = SegmentationConfig {
        voxel_resolution: 60,
        wall_thickness_mm: 6.0,
        ..SegmentationConfig::default()
    }
    .with_hollowing(HollowStrategy::SegmentThenHollow)
    .with_joint(JointType::None)
    .with_greedy_search();
    let segmentation = segment_mesh(&mesh, &config).unwrap();

    assert_eq!(segmentation.hollowed_with, Some(HollowAlgorithm::Voxel));
    let volume: f64 = segmentation.parts.iter().map(Mesh::volume).sum();
    assert!(volume < 0.8 * mesh.volume());
    assert!(all_fit(&segmentation.parts, &config.build_volume));
    assert!(segmentation.assembly_note.contains("hollow"));
}

#[test]
fn shell_inner_surface_is_coarse() {
    let sphere = Mesh::sphere(60.0, 48, 24, FaceTag::Surface);
    let settings = HollowSettings::from_config(&SegmentationConfig {
        wall_thickness_mm: 3.0,
        ..SegmentationConfig::default()
    });
    let report = ShellHollower::new(settings).hollow(&sphere).unwrap();
    let inner = report
        .mesh
        .polygons
        .iter()
        .filter(|p| p.tag == FaceTag::Inner)
        .count();
    assert!(report.cavity);
    assert!(inner as f64 <= 0.15 * sphere.polygons.len() as f64);
    assert!(report.mesh.volume() < sphere.volume());
}

#[test]
fn hollow_then_segment_cuts_the_hollowed_solid() {
    let mesh = block(300.0, 80.0, 80.0);
    let config = SegmentationConfig {
        voxel_resolution: 60,
        wall_thickness_mm: 6.0,
        ..SegmentationConfig::default()
    }
    .with_hollowing(HollowStrategy::HollowThenSegment)
    .with_joint(JointType::None)
    .with_greedy_search();
    let segmentation = segment_mesh(&mesh, &config).unwrap();

    assert_eq!(segmentation.hollowed_with, Some(HollowAlgorithm::Voxel));
    assert!(segmentation.degradations.is_empty(), "{:?}", segmentation.degradations);
    assert!(segmentation.parts.len() >= 2);
    assert!(all_fit(&segmentation.parts, &config.build_volume));
    let volume: f64 = segmentation.parts.iter().map(Mesh::volume).sum();
    assert!(volume < 0.8 * mesh.volume());
}

#[test]
fn surface_shell_hollows_before_cutting() {
    let sphere = Mesh::sphere(150.0, 48, 24, FaceTag::Surface);
    let config = SegmentationConfig {
        wall_thickness_mm: 3.0,
        ..SegmentationConfig::default()
    }
    .with_hollowing(HollowStrategy::SurfaceShell)
    .with_joint(JointType::None)
    .with_greedy_search();
    let segmentation = segment_mesh(&sphere, &config).unwrap();

    assert_eq!(segmentation.hollowed_with, Some(HollowAlgorithm::Shell));
    assert!(
        segmentation
            .degradations
            .iter()
            .all(|d| !d.stage.ends_with("hollowing")),
        "{:?}",
        segmentation.degradations
    );
    assert!(all_fit(&segmentation.parts, &config.build_volume));
    let volume: f64 = segmentation.parts.iter().map(Mesh::volume).sum();
    assert!(volume < 0.5 * sphere.volume());
}

#[test]
fn pyramid_and_dovetail_joints_go_through() {
    let mesh = block(300.0, 60.0, 60.0);
    for joint in [JointType::Pyramid, JointType::Dovetail] {
        let config = SegmentationConfig::default()
            .with_joint(joint)
            .with_greedy_search();
        let segmentation = segment_mesh(&mesh, &config).unwrap();

        assert_eq!(segmentation.parts.len(), 2);
        assert!(!segmentation.joints.is_empty(), "{joint:?}");
        assert!(segmentation.joints.iter().all(|j| j.joint_type == joint));
        assert!(segmentation.hardware.is_empty());
        assert!(segmentation.degradations.is_empty(), "{:?}", segmentation.degradations);
        assert!(all_fit(&segmentation.parts, &config.build_volume));
    }
}
