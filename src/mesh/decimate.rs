//! Vertex-clustering decimation.
//!
//! Vertices are snapped to a uniform grid, every occupied cell collapses to
//! the mean of its members, and faces that lose a corner disappear. Crude
//! but fast, and stable enough for surfaces nobody will ever see.

use crate::float_types::Real;
use crate::mesh::indexed::{IndexedTriangles, weld_key};
use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};

/// Upper bound on cell growth rounds in [`IndexedTriangles::decimate_to_ratio`].
const MAX_ROUNDS: usize = 16;

impl IndexedTriangles {
    /// Collapse all vertices sharing a grid cell of edge `cell_size`.
    pub fn cluster_vertices(&self, cell_size: Real) -> IndexedTriangles {
        if cell_size <= 0.0 || self.positions.is_empty() {
            return self.clone();
        }

        let mut cell_of: HashMap<[i64; 3], usize> = HashMap::new();
        let mut sums: Vec<(Vector3<Real>, usize)> = Vec::new();
        let remap: Vec<usize> = self
            .positions
            .iter()
            .map(|p| {
                let cell = *cell_of.entry(weld_key(p, cell_size)).or_insert_with(|| {
                    sums.push((Vector3::zeros(), 0));
                    sums.len() - 1
                });
                sums[cell].0 += p.coords;
                sums[cell].1 += 1;
                cell
            })
            .collect();

        let positions = sums
            .iter()
            .map(|(sum, count)| Point3::from(sum / *count as Real))
            .collect();

        let mut seen = HashSet::new();
        let faces = self
            .faces
            .iter()
            .map(|f| [remap[f[0]], remap[f[1]], remap[f[2]]])
            .filter(|&[a, b, c]| a != b && b != c && a != c)
            .filter(|face| {
                let mut key = *face;
                key.sort_unstable();
                seen.insert(key)
            })
            .collect();

        let mut clustered = IndexedTriangles::new(positions, faces);
        clustered.compact();
        clustered
    }

    /// Grow the clustering cell until at most `ratio` of the faces remain.
    /// Returns the input unchanged if it is already small enough.
    pub fn decimate_to_ratio(&self, ratio: Real) -> IndexedTriangles {
        let target = ((self.faces.len() as Real * ratio).ceil() as usize).max(4);
        if self.faces.len() <= target {
            return self.clone();
        }

        let (mins, maxs) = self.positions.iter().fold(
            (
                Point3::new(Real::MAX, Real::MAX, Real::MAX),
                Point3::new(-Real::MAX, -Real::MAX, -Real::MAX),
            ),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        let diagonal = (maxs - mins).norm();
        // A closed surface has about half as many vertices as faces, spread
        // over an area that scales with the square of the cell count.
        let mut cell = diagonal / ((target as Real / 2.0).sqrt().max(1.0));

        let mut best = self.clone();
        for _ in 0..MAX_ROUNDS {
            let candidate = self.cluster_vertices(cell);
            if candidate.faces.len() < 4 {
                break;
            }
            best = candidate;
            if best.faces.len() <= target {
                break;
            }
            cell *= 1.25;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::mesh::polygon::FaceTag;

    #[test]
    fn decimation_reaches_the_target_ratio() {
        let sphere = IndexedTriangles::weld(&Mesh::sphere(20.0, 48, 24, FaceTag::Surface), 1e-6);
        let reduced = sphere.decimate_to_ratio(0.1);
        assert!(reduced.faces.len() <= sphere.faces.len() / 10 + 1);
        assert!(reduced.faces.len() >= 4);
        assert!(reduced.signed_volume() > 0.0);
    }

    #[test]
    fn tiny_cells_keep_the_mesh() {
        let cube = IndexedTriangles::weld(&Mesh::cube(10.0, FaceTag::Surface), 1e-6);
        let same = cube.cluster_vertices(1e-3);
        assert_eq!(same.faces.len(), cube.faces.len());
    }
}
