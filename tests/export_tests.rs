mod support;

use meshcut::config::{JointType, SegmentationConfig};
use meshcut::io::archive::{ASSEMBLY_FILE, MANIFEST_ENTRY};
use meshcut::io::threemf::{read_3mf, read_attachment, read_metadata};
use meshcut::pipeline::SegmentationResult;
use meshcut::segment_file;
use support::{block, write_model};

#[test]
fn segment_file_writes_parts_and_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "bar", &block(400.0, 50.0, 50.0));
    let out = dir.path().join("out");
    let config = SegmentationConfig::default()
        .with_joint(JointType::Integrated)
        .with_greedy_search();

    let result = segment_file(&model, &out, &config).unwrap();
    assert_eq!(result.parts.len(), 2);
    assert!(out.join("part_01.3mf").exists());
    assert!(out.join("part_02.3mf").exists());
    assert_eq!(result.archive, out.join(ASSEMBLY_FILE));

    for part in &result.parts {
        let mesh = read_3mf(&part.file).unwrap();
        assert!(!mesh.is_empty());
        assert!(config.build_volume.fits(&mesh.dimensions()));
        let metadata = read_metadata(&part.file).unwrap();
        assert!(metadata.iter().any(|(k, _)| k == "meshcut:joints"));
    }

    let manifest = read_attachment(&result.archive, MANIFEST_ENTRY).unwrap();
    let parsed: SegmentationResult = serde_json::from_slice(&manifest).unwrap();
    assert_eq!(parsed.parts.len(), 2);
    assert_eq!(parsed.joints, result.joints);
    assert_eq!(parsed.assembly_note, result.assembly_note);
}

#[test]
fn stl_copies_are_optional() {
    let dir = tempfile::tempdir().unwrap();
    let model = write_model(dir.path(), "bar", &block(300.0, 40.0, 40.0));
    let out = dir.path().join("out");
    let config = SegmentationConfig {
        export_stl: true,
        ..SegmentationConfig::default()
    }
    .with_joint(JointType::None)
    .with_greedy_search();

    let result = segment_file(&model, &out, &config).unwrap();
    for part in &result.parts {
        let stl = part.stl_file.as_ref().unwrap();
        assert!(stl.exists());
    }
}
