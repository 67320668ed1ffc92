//! Check-only mode: decide whether a model needs cutting without cutting it.

use crate::config::BuildVolume;
use crate::errors::{Result, SegmentationError};
use crate::float_types::Real;
use crate::io::load_mesh;
use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub needs_segmentation: bool,
    pub dimensions_mm: [Real; 3],
    pub build_volume_mm: [Real; 3],
    /// Overshoot per axis in the model's own orientation.
    pub exceeds_by_mm: [Real; 3],
    pub recommended_cuts: usize,
}

pub fn check_mesh(mesh: &Mesh, build: &BuildVolume) -> Result<CheckReport> {
    if mesh.is_empty() {
        return Err(SegmentationError::EmptyMesh);
    }
    let dims = mesh.dimensions();
    let needs_segmentation = !build.fits(&dims);
    let report = CheckReport {
        needs_segmentation,
        dimensions_mm: dims.into(),
        build_volume_mm: build.as_array(),
        exceeds_by_mm: build.exceeds_by(&dims),
        recommended_cuts: if needs_segmentation { build.estimated_cuts(&dims) } else { 0 },
    };
    info!(
        needs_segmentation,
        recommended_cuts = report.recommended_cuts,
        dims = ?report.dimensions_mm,
        "checked model"
    );
    Ok(report)
}

pub fn check_file(path: impl AsRef<Path>, build: &BuildVolume) -> Result<CheckReport> {
    let mesh = load_mesh(path)?;
    check_mesh(&mesh, build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;
    use crate::traits::CSGOps;

    #[test]
    fn empty_mesh_is_an_error() {
        let result = check_mesh(&Mesh::new(), &BuildVolume::default());
        assert!(matches!(result, Err(SegmentationError::EmptyMesh)));
    }

    #[test]
    fn rotated_fit_needs_no_cut() {
        let build = BuildVolume::new(100.0, 300.0, 100.0);
        let bar = Mesh::cuboid(250.0, 50.0, 50.0, FaceTag::Surface);
        let report = check_mesh(&bar, &build).unwrap();
        assert!(!report.needs_segmentation);
        assert_eq!(report.recommended_cuts, 0);
        assert_eq!(report.exceeds_by_mm, [150.0, 0.0, 0.0]);
    }
}
