//! Primitive solids used by joints, half-space cuts and tests.
//!
//! Every constructor returns a closed, outward-oriented [`Mesh`] whose faces
//! all carry the given [`FaceTag`].

use crate::float_types::{PI, Real, TAU};
use crate::mesh::Mesh;
use crate::mesh::polygon::{FaceTag, Polygon};
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};

impl Mesh {
    /// Axis-aligned box with one corner at the origin.
    ///
    /// ```text
    ///     4-------5
    ///    /|      /|
    ///   0-------1 |
    ///   | |     | |
    ///   | 7-----|-6
    ///   |/      |/
    ///   3-------2
    /// ```
    pub fn cuboid(width: Real, length: Real, height: Real, tag: FaceTag) -> Mesh {
        let bottom = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(width, 0.0, 0.0),
            Point3::new(width, length, 0.0),
            Point3::new(0.0, length, 0.0),
        ];
        let top = bottom
            .iter()
            .map(|p| Point3::new(p.x, p.y, height))
            .collect();
        Self::loft(bottom, top, tag)
    }

    pub fn cube(width: Real, tag: FaceTag) -> Mesh {
        Self::cuboid(width, width, width, tag)
    }

    /// UV sphere centred at the origin, poles on the Y axis.
    pub fn sphere(radius: Real, segments: usize, stacks: usize, tag: FaceTag) -> Mesh {
        let segments = segments.max(3);
        let stacks = stacks.max(2);
        let point = |i: usize, j: usize| {
            let theta = i as Real / segments as Real * TAU;
            let phi = j as Real / stacks as Real * PI;
            Point3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.cos(),
                radius * phi.sin() * theta.sin(),
            )
        };

        let mut polygons = Vec::with_capacity(segments * stacks * 2);
        for j in 0..stacks {
            for i in 0..segments {
                let p00 = point(i, j);
                let p10 = point(i + 1, j);
                let p01 = point(i, j + 1);
                let p11 = point(i + 1, j + 1);
                // Winding chosen so normals face away from the centre.
                if j > 0 {
                    polygons.push(Polygon::triangle(p00, p10, p01, tag));
                }
                if j + 1 < stacks {
                    polygons.push(Polygon::triangle(p10, p11, p01, tag));
                }
            }
        }
        let mut mesh = Mesh::from_polygon_vec(polygons);
        mesh.smooth_sphere_normals();
        mesh
    }

    /// Cylinder along +Z from `z = 0` to `z = height`.
    pub fn cylinder(radius: Real, height: Real, segments: usize, tag: FaceTag) -> Mesh {
        Self::frustum(radius, radius, height, segments, tag)
    }

    /// Circular frustum along +Z: `radius1` at `z = 0`, `radius2` at `z = height`.
    pub fn frustum(
        radius1: Real,
        radius2: Real,
        height: Real,
        segments: usize,
        tag: FaceTag,
    ) -> Mesh {
        let segments = segments.max(3);
        let ring = |radius: Real, z: Real| -> Vec<Point3<Real>> {
            (0..segments)
                .map(|i| {
                    let angle = i as Real / segments as Real * TAU;
                    Point3::new(radius * angle.cos(), radius * angle.sin(), z)
                })
                .collect()
        };
        Self::loft(ring(radius1, 0.0), ring(radius2, height), tag)
    }

    /// Square frustum along +Z centred on the axis: a square of side `bottom`
    /// at `z = 0` tapering to a square of side `top` at `z = height`.
    pub fn square_frustum(bottom: Real, top: Real, height: Real, tag: FaceTag) -> Mesh {
        let square = |side: Real, z: Real| -> Vec<Point3<Real>> {
            let h = side * 0.5;
            vec![
                Point3::new(-h, -h, z),
                Point3::new(h, -h, z),
                Point3::new(h, h, z),
                Point3::new(-h, h, z),
            ]
        };
        Self::loft(square(bottom, 0.0), square(top, height), tag)
    }

    /// Prism with a trapezoid profile in the XZ plane extruded along Y and
    /// centred on the Z axis: width `base` at `z = 0`, width `tip` at
    /// `z = height`, depth `depth` along Y.
    pub fn trapezoid_prism(
        base: Real,
        tip: Real,
        height: Real,
        depth: Real,
        tag: FaceTag,
    ) -> Mesh {
        let profile = |y: Real| -> Vec<Point3<Real>> {
            vec![
                Point3::new(-base * 0.5, y, 0.0),
                Point3::new(base * 0.5, y, 0.0),
                Point3::new(tip * 0.5, y, height),
                Point3::new(-tip * 0.5, y, height),
            ]
        };
        Self::loft(profile(-depth * 0.5), profile(depth * 0.5), tag)
    }

    /// Closed solid spanned by two convex rings with matching vertex counts.
    /// Orientation is fixed up afterwards so the result always has positive volume.
    pub(crate) fn loft(bottom: Vec<Point3<Real>>, top: Vec<Point3<Real>>, tag: FaceTag) -> Mesh {
        let n = bottom.len();
        let mut polygons = Vec::with_capacity(n + 2);

        let flat = |points: Vec<Point3<Real>>| {
            let mut polygon = Polygon::new(
                points
                    .into_iter()
                    .map(|p| Vertex::new(p, Vector3::zeros()))
                    .collect(),
                tag,
            );
            polygon.set_new_normal();
            polygon
        };

        polygons.push(flat(bottom.iter().rev().copied().collect()));
        polygons.push(flat(top.clone()));
        for i in 0..n {
            let j = (i + 1) % n;
            polygons.push(flat(vec![bottom[i], bottom[j], top[j], top[i]]));
        }

        let mut mesh = Mesh::from_polygon_vec(polygons);
        if mesh.volume() < 0.0 {
            for polygon in &mut mesh.polygons {
                polygon.flip();
            }
        }
        mesh
    }

    fn smooth_sphere_normals(&mut self) {
        for polygon in &mut self.polygons {
            for v in &mut polygon.vertices {
                let n = v.pos.coords;
                if n.norm() > Real::EPSILON {
                    v.normal = n.normalize();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CSGOps;
    use approx::assert_relative_eq;

    #[test]
    fn cuboid_volume_and_bounds() {
        let cuboid = Mesh::cuboid(2.0, 3.0, 4.0, FaceTag::Surface);
        assert_relative_eq!(cuboid.volume(), 24.0, epsilon = 1e-9);
        assert_eq!(cuboid.polygons.len(), 6);
        let dims = cuboid.dimensions();
        assert_relative_eq!(dims.y, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn frustum_volume_is_positive() {
        let cylinder = Mesh::cylinder(2.0, 5.0, 64, FaceTag::Joint);
        let exact = PI * 4.0 * 5.0;
        assert!(cylinder.volume() > 0.0);
        assert_relative_eq!(cylinder.volume(), exact, max_relative = 0.01);

        let pyramid = Mesh::square_frustum(4.0, 2.0, 3.0, FaceTag::Joint);
        // (h/3)(A1 + A2 + sqrt(A1*A2))
        assert_relative_eq!(pyramid.volume(), 1.0 * (16.0 + 4.0 + 8.0), epsilon = 1e-9);
    }

    #[test]
    fn trapezoid_prism_is_closed_and_oriented() {
        let tenon = Mesh::trapezoid_prism(4.0, 6.0, 5.0, 10.0, FaceTag::Joint);
        assert_relative_eq!(tenon.volume(), 5.0 * 5.0 * 10.0, epsilon = 1e-9);
        let bb = tenon.bounding_box();
        assert_relative_eq!(bb.maxs.x, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn sphere_approximates_volume() {
        let sphere = Mesh::sphere(10.0, 48, 24, FaceTag::Surface);
        let exact = 4.0 / 3.0 * PI * 1000.0;
        assert_relative_eq!(sphere.volume(), exact, max_relative = 0.02);
    }
}
