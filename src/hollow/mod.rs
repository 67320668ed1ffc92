//! Hollowing: replace a solid with a closed shell of fixed wall thickness.
//!
//! Two algorithms are available. [`ShellHollower`] offsets the surface inward
//! and keeps the original faces untouched; [`VoxelHollower`] rasterizes the
//! solid and re-meshes an eroded band. [`hollow_with_fallback`] chains them
//! so a failure never aborts segmentation.

pub mod shell;
pub mod voxel;

pub use shell::ShellHollower;
pub use voxel::VoxelHollower;

use crate::config::{HollowAlgorithm, SegmentationConfig};
use crate::errors::HollowError;
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::pipeline::Degradation;
use tracing::warn;

/// Parameters shared by both hollowing algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HollowSettings {
    pub wall_thickness: Real,
    pub voxel_resolution: usize,
    pub smoothing_iterations: usize,
    pub simplify_ratio: Real,
    pub inner_face_ratio: Real,
}

impl HollowSettings {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        HollowSettings {
            wall_thickness: config.wall_thickness_mm,
            voxel_resolution: config.voxel_resolution,
            smoothing_iterations: config.smoothing_iterations,
            simplify_ratio: config.voxel_simplify_ratio,
            inner_face_ratio: config.inner_face_ratio,
        }
    }
}

/// Result of one hollowing attempt.
#[derive(Debug, Clone)]
pub struct HollowReport {
    pub mesh: Mesh,
    pub algorithm: HollowAlgorithm,
    /// False when the solid was too thin to hold a cavity and came back as is.
    pub cavity: bool,
    pub removed_volume: Real,
}

impl HollowReport {
    pub fn unchanged(mesh: &Mesh, algorithm: HollowAlgorithm) -> Self {
        HollowReport {
            mesh: mesh.clone(),
            algorithm,
            cavity: false,
            removed_volume: 0.0,
        }
    }
}

/// A hollowing algorithm.
pub trait Hollower {
    fn algorithm(&self) -> HollowAlgorithm;

    fn hollow(&self, mesh: &Mesh) -> Result<HollowReport, HollowError>;
}

pub fn hollower_for(algorithm: HollowAlgorithm, settings: HollowSettings) -> Box<dyn Hollower + Send + Sync> {
    match algorithm {
        HollowAlgorithm::Voxel => Box::new(VoxelHollower::new(settings)),
        HollowAlgorithm::Shell => Box::new(ShellHollower::new(settings)),
    }
}

/// Hollow `mesh` with the requested algorithm, degrading shell → voxel → solid.
///
/// Never fails: every fallback taken is logged and returned alongside the
/// report so the caller can surface it.
pub fn hollow_with_fallback(
    mesh: &Mesh,
    algorithm: HollowAlgorithm,
    settings: HollowSettings,
) -> (HollowReport, Vec<Degradation>) {
    let mut degradations = Vec::new();

    let mut chain = vec![algorithm];
    if algorithm == HollowAlgorithm::Shell {
        chain.push(HollowAlgorithm::Voxel);
    }

    for (i, &current) in chain.iter().enumerate() {
        match hollower_for(current, settings).hollow(mesh) {
            Ok(report) => return (report, degradations),
            Err(error) => {
                let fallback = match chain.get(i + 1) {
                    Some(next) => format!("{next} hollowing"),
                    None => "solid part".to_string(),
                };
                warn!(stage = "hollow", algorithm = %current, fallback = %fallback, reason = %error, "hollowing failed");
                degradations.push(Degradation {
                    stage: format!("{current} hollowing"),
                    fallback,
                    reason: error.to_string(),
                });
            },
        }
    }

    (HollowReport::unchanged(mesh, algorithm), degradations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;

    #[test]
    fn open_surface_degrades_to_solid() {
        let mut open = Mesh::cube(20.0, FaceTag::Surface);
        open.polygons.truncate(3);
        let settings = HollowSettings::from_config(&SegmentationConfig::default());
        let (report, degradations) = hollow_with_fallback(&open, HollowAlgorithm::Shell, settings);
        assert!(!report.cavity);
        assert!(!degradations.is_empty());
        assert_eq!(degradations[0].stage, "shell hollowing");
        assert_eq!(degradations[0].fallback, "voxel hollowing");
        assert_eq!(degradations.len(), 2);
        assert_eq!(degradations[1].stage, "voxel hollowing");
        assert_eq!(degradations[1].fallback, "solid part");
        assert_eq!(report.mesh.polygons.len(), open.polygons.len());
    }
}
