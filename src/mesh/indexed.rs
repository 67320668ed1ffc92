//! Welded, index-based triangle meshes.
//!
//! The polygon soup in [`Mesh`] is convenient for BSP booleans but carries no
//! connectivity. Hollowing, smoothing, decimation and export all need shared
//! vertices, so they work on this representation instead.

use crate::float_types::{EPSILON, Real};
use crate::mesh::Mesh;
use crate::mesh::polygon::{FaceTag, Polygon};
use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

/// Triangle mesh with shared vertex positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedTriangles {
    pub positions: Vec<Point3<Real>>,
    pub faces: Vec<[usize; 3]>,
}

/// Integer grid key used to weld positions that agree within a tolerance.
#[inline]
pub(crate) fn weld_key(p: &Point3<Real>, tolerance: Real) -> [i64; 3] {
    [
        (p.x / tolerance).round() as i64,
        (p.y / tolerance).round() as i64,
        (p.z / tolerance).round() as i64,
    ]
}

impl IndexedTriangles {
    pub const fn new(positions: Vec<Point3<Real>>, faces: Vec<[usize; 3]>) -> Self {
        IndexedTriangles { positions, faces }
    }

    /// Fan-triangulate every polygon of `mesh` and merge coincident vertices.
    /// Triangles that collapse onto fewer than three distinct vertices are dropped.
    pub fn weld(mesh: &Mesh, tolerance: Real) -> Self {
        let tolerance = tolerance.max(Real::EPSILON);
        let mut index_of: HashMap<[i64; 3], usize> = HashMap::new();
        let mut positions = Vec::new();
        let mut faces = Vec::new();

        let mut intern = |p: &Point3<Real>| -> usize {
            *index_of.entry(weld_key(p, tolerance)).or_insert_with(|| {
                positions.push(*p);
                positions.len() - 1
            })
        };

        for polygon in &mesh.polygons {
            for [a, b, c] in polygon.triangulate() {
                let face = [intern(&a.pos), intern(&b.pos), intern(&c.pos)];
                if face[0] != face[1] && face[1] != face[2] && face[0] != face[2] {
                    faces.push(face);
                }
            }
        }

        IndexedTriangles { positions, faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// True if every undirected edge is shared by exactly two faces.
    pub fn is_closed(&self) -> bool {
        let mut edges: HashMap<(usize, usize), u32> = HashMap::new();
        for &[a, b, c] in &self.faces {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edges.entry((u.min(v), u.max(v))).or_default() += 1;
            }
        }
        !edges.is_empty() && edges.values().all(|&count| count == 2)
    }

    pub fn triangle(&self, face: usize) -> [Point3<Real>; 3] {
        let [a, b, c] = self.faces[face];
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    /// Unnormalised face normal; its length is twice the triangle area.
    pub fn face_cross(&self, face: usize) -> Vector3<Real> {
        let [a, b, c] = self.triangle(face);
        (b - a).cross(&(c - a))
    }

    /// Area-weighted vertex normals (unit length, zero for isolated vertices).
    pub fn vertex_normals(&self) -> Vec<Vector3<Real>> {
        let mut normals = vec![Vector3::zeros(); self.positions.len()];
        for (f, face) in self.faces.iter().enumerate() {
            let n = self.face_cross(f);
            for &i in face {
                normals[i] += n;
            }
        }
        for n in &mut normals {
            let len = n.norm();
            if len > Real::EPSILON {
                *n /= len;
            }
        }
        normals
    }

    /// Vertex normals weighted by the corner angle of each incident face.
    /// Unlike area weighting these do not depend on how a flat region was
    /// triangulated.
    pub fn angle_weighted_normals(&self) -> Vec<Vector3<Real>> {
        let mut normals = vec![Vector3::zeros(); self.positions.len()];
        for (f, face) in self.faces.iter().enumerate() {
            let Some(n) = self.face_cross(f).try_normalize(Real::EPSILON) else {
                continue;
            };
            let corners = self.triangle(f);
            for k in 0..3 {
                let e1 = corners[(k + 1) % 3] - corners[k];
                let e2 = corners[(k + 2) % 3] - corners[k];
                normals[face[k]] += n * e1.angle(&e2);
            }
        }
        for n in &mut normals {
            let len = n.norm();
            if len > Real::EPSILON {
                *n /= len;
            }
        }
        normals
    }

    /// Sorted, de-duplicated one-ring neighbours of every vertex.
    pub fn neighbors(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.positions.len()];
        for &[a, b, c] in &self.faces {
            adjacency[a].extend([b, c]);
            adjacency[b].extend([a, c]);
            adjacency[c].extend([a, b]);
        }
        for ring in &mut adjacency {
            ring.sort_unstable();
            ring.dedup();
        }
        adjacency
    }

    pub fn signed_volume(&self) -> Real {
        (0..self.faces.len())
            .map(|f| {
                let [a, b, c] = self.triangle(f);
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }

    pub fn surface_area(&self) -> Real {
        (0..self.faces.len())
            .map(|f| self.face_cross(f).norm() * 0.5)
            .sum()
    }

    /// Length of the summed face area vectors over the total area. Zero for
    /// any closed surface, including ones with T-junctions that
    /// [`is_closed`](Self::is_closed) rejects.
    pub fn open_area_ratio(&self) -> Real {
        let total = self.surface_area();
        if total <= EPSILON {
            return 0.0;
        }
        let net = (0..self.faces.len()).fold(Vector3::zeros(), |acc, f| acc + self.face_cross(f) * 0.5);
        net.norm() / total
    }

    /// Reverse the winding of every face.
    pub fn flip(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }

    /// Drop vertices that no face references and renumber the rest.
    pub fn compact(&mut self) {
        let mut remap = vec![usize::MAX; self.positions.len()];
        let mut positions = Vec::with_capacity(self.positions.len());
        for face in &mut self.faces {
            for i in face.iter_mut() {
                if remap[*i] == usize::MAX {
                    remap[*i] = positions.len();
                    positions.push(self.positions[*i]);
                }
                *i = remap[*i];
            }
        }
        self.positions = positions;
    }

    /// Convert back into a polygon mesh, one flat-shaded triangle per face.
    pub fn to_mesh(&self, tag: FaceTag) -> Mesh {
        let polygons = (0..self.faces.len())
            .filter(|&f| self.face_cross(f).norm() > EPSILON * EPSILON)
            .map(|f| {
                let [a, b, c] = self.triangle(f);
                Polygon::triangle(a, b, c, tag)
            })
            .collect();
        Mesh::from_polygon_vec(polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn welding_a_cube_shares_corners() {
        let cube = Mesh::cube(2.0, FaceTag::Surface);
        let indexed = IndexedTriangles::weld(&cube, 1e-6);
        assert_eq!(indexed.positions.len(), 8);
        assert_eq!(indexed.faces.len(), 12);
        assert_relative_eq!(indexed.signed_volume(), 8.0, epsilon = 1e-9);
        assert_relative_eq!(indexed.surface_area(), 24.0, epsilon = 1e-9);
        assert!(indexed.neighbors().iter().all(|ring| ring.len() >= 3));
    }

    #[test]
    fn vertex_normals_point_outwards() {
        let cube = Mesh::cube(2.0, FaceTag::Surface);
        let indexed = IndexedTriangles::weld(&cube, 1e-6);
        let center = Point3::new(1.0, 1.0, 1.0);
        for (p, n) in indexed.positions.iter().zip(indexed.vertex_normals()) {
            assert!((p - center).dot(&n) > 0.0);
        }
    }

    #[test]
    fn compact_renumbers_vertices() {
        let mut indexed = IndexedTriangles::new(
            vec![
                Point3::origin(),
                Point3::new(9.0, 9.0, 9.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 2, 3]],
        );
        indexed.compact();
        assert_eq!(indexed.positions.len(), 3);
        assert_eq!(indexed.faces, vec![[0, 1, 2]]);
    }
}
