//! Surface-shell hollowing.
//!
//! The outer surface is kept face for face. An inner surface is produced by
//! moving every welded vertex inward along its angle-weighted normal, then
//! decimated so the part does not double its face count.

use crate::config::HollowAlgorithm;
use crate::errors::{BooleanError, HollowError};
use crate::float_types::Real;
use crate::hollow::{HollowReport, HollowSettings, Hollower};
use crate::mesh::Mesh;
use crate::mesh::indexed::IndexedTriangles;
use crate::mesh::polygon::FaceTag;
use nalgebra::Point3;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Offsets are capped at `wall / MIN_ALIGNMENT` around sharp features.
const MIN_ALIGNMENT: Real = 1.0 / 3.0;

#[derive(Debug, Clone)]
pub struct ShellHollower {
    settings: HollowSettings,
}

impl ShellHollower {
    pub const fn new(settings: HollowSettings) -> Self {
        ShellHollower { settings }
    }

    /// Inward offset of `outer`, before decimation.
    fn offset_surface(&self, outer: &IndexedTriangles) -> Result<IndexedTriangles, HollowError> {
        let wall = self.settings.wall_thickness;
        let normals = outer.angle_weighted_normals();

        // Scale each offset so the vertex ends up a full wall away from every
        // incident face plane, not just along its averaged normal.
        let mut alignment = vec![1.0 as Real; outer.positions.len()];
        for (f, face) in outer.faces.iter().enumerate() {
            let Some(n) = outer.face_cross(f).try_normalize(Real::EPSILON) else {
                continue;
            };
            for &i in face {
                alignment[i] = alignment[i].min(normals[i].dot(&n));
            }
        }
        let positions = outer
            .positions
            .iter()
            .zip(normals.iter().zip(&alignment))
            .map(|(p, (n, &a))| p - n * (wall / a.max(MIN_ALIGNMENT)))
            .collect();
        let inner = IndexedTriangles::new(positions, outer.faces.clone());

        let folded = (0..outer.faces.len())
            .filter(|&f| outer.face_cross(f).dot(&inner.face_cross(f)) <= 0.0)
            .count();
        if folded > 0 {
            return Err(BooleanError::SelfIntersection(format!(
                "{folded} of {} faces fold over at a {wall:.2} mm offset",
                outer.faces.len()
            ))
            .into());
        }
        Ok(inner)
    }

    /// Every inner vertex lies inside `mesh`, at least half a wall from its surface.
    fn is_contained(&self, mesh: &Mesh, inner: &IndexedTriangles) -> bool {
        let min_depth = self.settings.wall_thickness * 0.5;
        let inside = |p: &Point3<Real>| mesh.contains_point(p) && mesh.distance_to_surface(p) >= min_depth;

        #[cfg(feature = "parallel")]
        {
            inner.positions.par_iter().all(inside)
        }
        #[cfg(not(feature = "parallel"))]
        {
            inner.positions.iter().all(inside)
        }
    }
}

impl Hollower for ShellHollower {
    fn algorithm(&self) -> HollowAlgorithm {
        HollowAlgorithm::Shell
    }

    fn hollow(&self, mesh: &Mesh) -> Result<HollowReport, HollowError> {
        let outer = mesh.to_indexed();
        if outer.is_empty() {
            return Err(HollowError::Degenerate("mesh has no faces".to_string()));
        }
        if !outer.is_closed() {
            return Err(HollowError::Degenerate("surface is not closed".to_string()));
        }
        if outer.signed_volume() <= 0.0 {
            return Err(HollowError::Degenerate("surface encloses no volume".to_string()));
        }

        let offset = self.offset_surface(&outer)?;
        let mut inner = offset.decimate_to_ratio(self.settings.inner_face_ratio);
        let cavity = inner.signed_volume();
        if cavity <= 0.0 {
            return Err(BooleanError::EmptyResult.into());
        }
        if !self.is_contained(mesh, &inner) {
            return Err(BooleanError::NotContained.into());
        }
        debug!(
            outer_faces = outer.faces.len(),
            inner_faces = inner.faces.len(),
            cavity,
            "inner surface accepted"
        );

        inner.flip();
        let mut polygons = mesh.polygons.clone();
        polygons.extend(inner.to_mesh(FaceTag::Inner).polygons);
        let hollowed = Mesh::from_polygon_vec(polygons);

        info!(
            faces = hollowed.triangle_count(),
            removed_volume = cavity,
            "shell hollowing finished"
        );
        Ok(HollowReport {
            mesh: hollowed,
            algorithm: HollowAlgorithm::Shell,
            cavity: true,
            removed_volume: cavity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings(wall: Real) -> HollowSettings {
        HollowSettings {
            wall_thickness: wall,
            voxel_resolution: 64,
            smoothing_iterations: 0,
            simplify_ratio: 1.0,
            inner_face_ratio: 0.1,
        }
    }

    #[test]
    fn sphere_keeps_outer_faces_and_adds_few_inner_ones() {
        let sphere = Mesh::sphere(40.0, 48, 24, FaceTag::Surface);
        let report = ShellHollower::new(settings(3.0)).hollow(&sphere).unwrap();
        let outer = report.mesh.polygons.iter().filter(|p| p.tag == FaceTag::Surface).count();
        let inner = report.mesh.polygons.iter().filter(|p| p.tag == FaceTag::Inner).count();
        assert_eq!(outer, sphere.polygons.len());
        assert!(inner > 0 && inner as Real <= 0.15 * outer as Real, "{inner} / {outer}");
        assert!(report.mesh.volume() < sphere.volume());
        assert!(report.mesh.volume() > 0.0);
    }

    #[test]
    fn cube_cavity_volume() {
        let cube = Mesh::cube(40.0, FaceTag::Surface);
        let hollower = ShellHollower::new(HollowSettings {
            inner_face_ratio: 1.0,
            ..settings(2.0)
        });
        let report = hollower.hollow(&cube).unwrap();
        assert_relative_eq!(report.removed_volume, 36.0_f64.powi(3), max_relative = 1e-6);
        assert_relative_eq!(
            report.mesh.volume(),
            cube.volume() - report.removed_volume,
            epsilon = 1e-6
        );
    }

    #[test]
    fn wall_thicker_than_the_part_fails() {
        let slab = Mesh::cuboid(50.0, 50.0, 4.0, FaceTag::Surface);
        let result = ShellHollower::new(settings(5.0)).hollow(&slab);
        assert!(result.is_err());
    }

    #[test]
    fn open_surface_is_rejected() {
        let mut open = Mesh::cube(10.0, FaceTag::Surface);
        open.polygons.pop();
        let result = ShellHollower::new(settings(1.0)).hollow(&open);
        assert!(matches!(result, Err(HollowError::Degenerate(_))));
    }
}
