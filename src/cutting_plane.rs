//! Cutting planes: pure values describing where a solid is split.

use crate::float_types::{EPSILON, Real};
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::mesh::plane::Plane;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A world axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vector3<Real> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneKind {
    AxisX,
    AxisY,
    AxisZ,
    Oblique,
}

impl PlaneKind {
    pub const fn axis(self) -> Option<Axis> {
        match self {
            PlaneKind::AxisX => Some(Axis::X),
            PlaneKind::AxisY => Some(Axis::Y),
            PlaneKind::AxisZ => Some(Axis::Z),
            PlaneKind::Oblique => None,
        }
    }

    const fn from_axis(axis: Axis) -> Self {
        match axis {
            Axis::X => PlaneKind::AxisX,
            Axis::Y => PlaneKind::AxisY,
            Axis::Z => PlaneKind::AxisZ,
        }
    }
}

/// A plane through `origin` with unit `normal`. The part behind the plane
/// (opposite the normal) is the "negative" side of a cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CuttingPlane {
    pub origin: Point3<Real>,
    pub normal: Vector3<Real>,
    pub kind: PlaneKind,
}

impl CuttingPlane {
    /// Plane perpendicular to `axis` at coordinate `position`.
    pub fn axis(axis: Axis, position: Real) -> Self {
        let normal = axis.unit();
        CuttingPlane {
            origin: Point3::from(normal * position),
            normal,
            kind: PlaneKind::from_axis(axis),
        }
    }

    /// Plane through `origin` whose normal has the given azimuth (from +X
    /// towards +Y) and elevation (towards +Z), both in degrees.
    pub fn from_angles(origin: Point3<Real>, azimuth_deg: Real, elevation_deg: Real) -> Self {
        let (az, el) = (azimuth_deg.to_radians(), elevation_deg.to_radians());
        let normal = Vector3::new(el.cos() * az.cos(), el.cos() * az.sin(), el.sin());
        Self::with_normal(origin, normal.normalize())
    }

    /// Plane through `origin` with an explicit (not necessarily unit) normal.
    /// Returns `None` for a zero-length normal.
    pub fn from_normal(origin: Point3<Real>, normal: Vector3<Real>) -> Option<Self> {
        let len = normal.norm();
        if !len.is_finite() || len < EPSILON {
            return None;
        }
        Some(Self::with_normal(origin, normal / len))
    }

    /// Normals within a hair of a world axis are classified as that axis.
    fn with_normal(origin: Point3<Real>, normal: Vector3<Real>) -> Self {
        let kind = Axis::ALL
            .into_iter()
            .find(|axis| normal.dot(&axis.unit()).abs() > 1.0 - 1e-9)
            .map_or(PlaneKind::Oblique, PlaneKind::from_axis);
        CuttingPlane {
            origin,
            normal,
            kind,
        }
    }

    /// Offset of the plane along its normal.
    pub fn offset(&self) -> Real {
        self.normal.dot(&self.origin.coords)
    }

    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&(point - self.origin))
    }

    /// The BSP classification plane used by cuts and statistics.
    pub fn to_plane(&self) -> Plane {
        Plane::from_point_normal(&self.origin, &self.normal)
    }

    /// True if the plane passes strictly through the interior of `bounds`.
    pub fn intersects_aabb(&self, bounds: &Aabb) -> bool {
        let (mut below, mut above) = (false, false);
        for corner in bounds.vertices() {
            let d = self.signed_distance(&corner);
            below |= d < -EPSILON;
            above |= d > EPSILON;
        }
        below && above
    }
}

impl fmt::Display for CuttingPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.axis() {
            Some(axis) => write!(f, "{axis} @ {:.2} mm", self.origin[axis.index()]),
            None => write!(
                f,
                "oblique n=({:.3}, {:.3}, {:.3}) through ({:.2}, {:.2}, {:.2})",
                self.normal.x, self.normal.y, self.normal.z, self.origin.x, self.origin.y, self.origin.z
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axis_plane() {
        let plane = CuttingPlane::axis(Axis::Y, 42.0);
        assert_eq!(plane.kind, PlaneKind::AxisY);
        assert_relative_eq!(plane.offset(), 42.0);
        assert_eq!(plane.to_string(), "Y @ 42.00 mm");
    }

    #[test]
    fn angles_and_normals() {
        let up = CuttingPlane::from_angles(Point3::origin(), 0.0, 90.0);
        assert_eq!(up.kind, PlaneKind::AxisZ);
        let diagonal = CuttingPlane::from_angles(Point3::origin(), 45.0, 0.0);
        assert_eq!(diagonal.kind, PlaneKind::Oblique);
        assert_relative_eq!(diagonal.normal.x, diagonal.normal.y, epsilon = 1e-12);
        assert!(CuttingPlane::from_normal(Point3::origin(), Vector3::zeros()).is_none());
        let scaled = CuttingPlane::from_normal(Point3::origin(), Vector3::new(0.0, 0.0, -3.0));
        assert_eq!(scaled.map(|p| p.kind), Some(PlaneKind::AxisZ));
    }

    #[test]
    fn aabb_crossing() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
        assert!(CuttingPlane::axis(Axis::X, 5.0).intersects_aabb(&bounds));
        assert!(!CuttingPlane::axis(Axis::X, 10.0).intersects_aabb(&bounds));
        assert!(!CuttingPlane::axis(Axis::Z, -1.0).intersects_aabb(&bounds));
    }
}
