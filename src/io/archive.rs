//! Segmentation output on disk.
//!
//! Each part becomes `part_NN.3mf` carrying its index, dimensions and joint
//! anchors as model metadata. `assembly.3mf` holds every part in place plus
//! `Metadata/assembly.json` with the full result.

use crate::config::JointType;
use crate::float_types::Real;
use crate::io::IoResult;
use crate::io::threemf::{ModelDocument, ModelObject, write_3mf};
use crate::joints::JointPlacement;
use crate::mesh::Mesh;
use crate::pipeline::SegmentationResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ASSEMBLY_FILE: &str = "assembly.3mf";
pub const MANIFEST_ENTRY: &str = "Metadata/assembly.json";

/// One written part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartFile {
    /// Zero-based position in assembly order.
    pub index: usize,
    pub file: PathBuf,
    pub stl_file: Option<PathBuf>,
    pub dimensions_mm: [Real; 3],
}

/// A joint feature as seen from one part.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct PartJoint {
    cut_id: u32,
    role: &'static str,
    position: [Real; 3],
    axis: [Real; 3],
    mate: usize,
}

pub fn part_name(index: usize) -> String {
    format!("part_{:02}", index + 1)
}

fn joints_of(index: usize, joints: &[JointPlacement]) -> Vec<PartJoint> {
    joints
        .iter()
        .filter_map(|j| {
            let (role, mate) = if j.negative_part == index {
                let role = match j.joint_type {
                    JointType::Dowel => "dowel_hole",
                    _ => "pin",
                };
                (role, j.positive_part)
            } else if j.positive_part == index {
                let role = match j.joint_type {
                    JointType::Dowel => "dowel_hole",
                    _ => "hole",
                };
                (role, j.negative_part)
            } else {
                return None;
            };
            Some(PartJoint {
                cut_id: j.cut_id,
                role,
                position: j.position,
                axis: j.axis,
                mate,
            })
        })
        .collect()
}

/// Write one part as 3MF (and STL when `export_stl` is set).
pub fn write_part(
    out_dir: &Path,
    index: usize,
    count: usize,
    mesh: &Mesh,
    joints: &[JointPlacement],
    export_stl: bool,
) -> IoResult<PartFile> {
    let name = part_name(index);
    let dims = mesh.dimensions();
    let dimensions_mm = [dims.x, dims.y, dims.z];

    let document = ModelDocument {
        objects: vec![ModelObject { name: &name, mesh }],
        metadata: vec![
            ("Title".to_string(), name.clone()),
            ("meshcut:part_index".to_string(), index.to_string()),
            ("meshcut:part_count".to_string(), count.to_string()),
            (
                "meshcut:dimensions_mm".to_string(),
                format!("{:.3} {:.3} {:.3}", dims.x, dims.y, dims.z),
            ),
            (
                "meshcut:joints".to_string(),
                serde_json::to_string(&joints_of(index, joints))?,
            ),
        ],
        attachments: Vec::new(),
    };
    let file = out_dir.join(format!("{name}.3mf"));
    write_3mf(&file, &document)?;

    let stl_file = if export_stl { write_stl_copy(out_dir, &name, mesh)? } else { None };

    Ok(PartFile {
        index,
        file,
        stl_file,
        dimensions_mm,
    })
}

#[cfg(feature = "stl-io")]
fn write_stl_copy(out_dir: &Path, name: &str, mesh: &Mesh) -> IoResult<Option<PathBuf>> {
    let path = out_dir.join(format!("{name}.stl"));
    crate::io::stl::write_stl(mesh, &path, name)?;
    Ok(Some(path))
}

#[cfg(not(feature = "stl-io"))]
fn write_stl_copy(_out_dir: &Path, name: &str, _mesh: &Mesh) -> IoResult<Option<PathBuf>> {
    tracing::warn!(part = name, "STL export requested but the stl-io feature is disabled");
    Ok(None)
}

/// Write the combined preview with `result` as its manifest.
pub fn write_assembly(out_dir: &Path, parts: &[Mesh], result: &SegmentationResult) -> IoResult<PathBuf> {
    let names: Vec<String> = (0..parts.len()).map(part_name).collect();
    let document = ModelDocument {
        objects: names
            .iter()
            .zip(parts)
            .map(|(name, mesh)| ModelObject { name, mesh })
            .collect(),
        metadata: vec![
            ("Title".to_string(), "assembly".to_string()),
            ("meshcut:part_count".to_string(), parts.len().to_string()),
            ("meshcut:hardware".to_string(), serde_json::to_string(&result.hardware)?),
            ("Description".to_string(), result.assembly_note.clone()),
        ],
        attachments: vec![(MANIFEST_ENTRY.to_string(), serde_json::to_vec_pretty(result)?)],
    };
    let path = out_dir.join(ASSEMBLY_FILE);
    write_3mf(&path, &document)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::threemf::read_metadata;
    use crate::mesh::polygon::FaceTag;

    #[test]
    fn part_metadata_lists_its_joints() {
        let dir = tempfile::tempdir().unwrap();
        let joints = vec![JointPlacement {
            cut_id: 0,
            joint_type: JointType::Integrated,
            position: [30.0, 20.0, 20.0],
            axis: [1.0, 0.0, 0.0],
            negative_part: 0,
            positive_part: 1,
        }];
        let mesh = Mesh::cube(10.0, FaceTag::Surface);
        let part = write_part(dir.path(), 1, 2, &mesh, &joints, false).unwrap();
        assert!(part.file.ends_with("part_02.3mf"));
        assert!(part.stl_file.is_none());

        let metadata = read_metadata(&part.file).unwrap();
        let joints_entry = metadata
            .iter()
            .find(|(name, _)| name == "meshcut:joints")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert!(joints_entry.contains("\"role\":\"hole\""));
        assert!(joints_entry.contains("\"mate\":0"));
    }
}
