//! Voxel hollowing: rasterize, erode by the wall thickness, re-mesh.
//!
//! The input surface is replaced by an iso-surface, so fine detail below the
//! voxel size is lost. Cost grows with the cube of the resolution.

use crate::config::HollowAlgorithm;
use crate::errors::HollowError;
use crate::float_types::Real;
use crate::hollow::{HollowReport, HollowSettings, Hollower};
use crate::mesh::Mesh;
use crate::mesh::indexed::IndexedTriangles;
use crate::mesh::polygon::FaceTag;
use crate::traits::CSGOps;
use fast_surface_nets::{SurfaceNetsBuffer, surface_nets};
use nalgebra::Point3;
use tracing::{debug, info};

/// Empty voxels kept around the solid on every side.
const PADDING: usize = 2;

/// Largest net area vector, relative to total area, of a closed surface.
const OPEN_AREA_TOLERANCE: Real = 1e-6;

/// Chamfer 3-4-5 weights for face, edge and corner neighbours.
const CHAMFER: [f32; 4] = [0.0, 3.0, 4.0, 5.0];

/// The shape describing our discrete voxel grid for Surface Nets:
#[derive(Clone, Copy, Debug)]
pub struct VoxelShape {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl fast_surface_nets::ndshape::Shape<3> for VoxelShape {
    type Coord = u32;

    #[inline]
    fn as_array(&self) -> [Self::Coord; 3] {
        [self.nx, self.ny, self.nz]
    }

    fn size(&self) -> Self::Coord {
        self.nx * self.ny * self.nz
    }

    fn usize(&self) -> usize {
        (self.nx * self.ny * self.nz) as usize
    }

    fn linearize(&self, [x, y, z]: [Self::Coord; 3]) -> u32 {
        (z * self.ny + y) * self.nx + x
    }

    fn delinearize(&self, i: u32) -> [Self::Coord; 3] {
        let x = i % self.nx;
        let yz = i / self.nx;
        [x, yz % self.ny, yz / self.ny]
    }
}

/// Sample lattice covering the solid plus padding.
#[derive(Debug, Clone)]
struct Lattice {
    origin: Point3<Real>,
    spacing: Real,
    dims: [usize; 3],
}

impl Lattice {
    fn covering(mesh: &Mesh, resolution: usize) -> Self {
        let bb = mesh.bounding_box();
        let extents = bb.extents();
        let longest = extents.max().max(Real::EPSILON);
        let spacing = longest / resolution.max(1) as Real;
        let dims = [0, 1, 2].map(|i| (extents[i] / spacing).ceil() as usize + 2 * PADDING + 1);
        let origin = bb.mins - nalgebra::Vector3::repeat(PADDING as Real * spacing);
        Lattice {
            origin,
            spacing,
            dims,
        }
    }

    fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    #[inline]
    fn coord(&self, axis: usize, i: usize) -> Real {
        self.origin[axis] + i as Real * self.spacing
    }
}

/// Ray parity result. A closed surface is crossed an even number of times
/// by every column.
struct Occupancy {
    inside: Vec<bool>,
    crossed_columns: usize,
    odd_columns: usize,
}

/// Inside/outside per lattice point by ray parity along +Z, one ray per column.
fn occupancy(surface: &IndexedTriangles, lattice: &Lattice) -> Occupancy {
    let [nx, ny, nz] = lattice.dims;
    let h = lattice.spacing;
    // Offsetting rays off the lattice keeps them clear of axis-aligned edges.
    let jitter = [h * 3.7e-4, h * 6.1e-4];
    let column_x = |i: usize| lattice.coord(0, i) + jitter[0];
    let column_y = |j: usize| lattice.coord(1, j) + jitter[1];

    let mut columns: Vec<Vec<u32>> = vec![Vec::new(); nx * ny];
    for (f, _) in surface.faces.iter().enumerate() {
        let [a, b, c] = surface.triangle(f);
        let lo = a.inf(&b).inf(&c);
        let hi = a.sup(&b).sup(&c);
        let first = |axis: usize, value: Real, jit: Real| {
            (((value - lattice.origin[axis] - jit) / h).ceil().max(0.0)) as usize
        };
        let last = |axis: usize, value: Real, jit: Real, n: usize| {
            ((((value - lattice.origin[axis] - jit) / h).floor()).max(-1.0) as isize).min(n as isize - 1)
        };
        let (i0, i1) = (first(0, lo.x, jitter[0]), last(0, hi.x, jitter[0], nx));
        let (j0, j1) = (first(1, lo.y, jitter[1]), last(1, hi.y, jitter[1], ny));
        for j in j0 as isize..=j1 {
            for i in i0 as isize..=i1 {
                columns[j as usize * nx + i as usize].push(f as u32);
            }
        }
    }

    let mut inside = vec![false; lattice.len()];
    let (mut crossed_columns, mut odd_columns) = (0, 0);
    let mut hits = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let (px, py) = (column_x(i), column_y(j));
            hits.clear();
            for &f in &columns[j * nx + i] {
                let [a, b, c] = surface.triangle(f as usize);
                let d0 = (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x);
                let d1 = (c.x - b.x) * (py - b.y) - (c.y - b.y) * (px - b.x);
                let d2 = (a.x - c.x) * (py - c.y) - (a.y - c.y) * (px - c.x);
                let all_pos = d0 >= 0.0 && d1 >= 0.0 && d2 >= 0.0;
                let all_neg = d0 <= 0.0 && d1 <= 0.0 && d2 <= 0.0;
                let area = d0 + d1 + d2;
                if !(all_pos || all_neg) || area.abs() <= Real::EPSILON {
                    continue;
                }
                // Barycentric weights: d1 ↔ a, d2 ↔ b, d0 ↔ c.
                hits.push((d1 * a.z + d2 * b.z + d0 * c.z) / area);
            }
            hits.sort_by(|x, y| x.total_cmp(y));
            hits.dedup_by(|x, y| (*x - *y).abs() < h * 1e-6);
            if !hits.is_empty() {
                crossed_columns += 1;
                odd_columns += hits.len() % 2;
            }

            for pair in hits.chunks_exact(2) {
                let k0 = ((pair[0] - lattice.origin.z) / h).ceil().max(0.0) as usize;
                let k1 = ((pair[1] - lattice.origin.z) / h).floor();
                if k1 < 0.0 {
                    continue;
                }
                for k in k0..=(k1 as usize).min(nz - 1) {
                    inside[lattice.index(i, j, k)] = true;
                }
            }
        }
    }
    Occupancy {
        inside,
        crossed_columns,
        odd_columns,
    }
}

/// Chamfer distance (in voxels) from every inside point to the nearest outside point.
fn inward_depth(inside: &[bool], lattice: &Lattice) -> Vec<f32> {
    let [nx, ny, nz] = lattice.dims;
    let mut dist: Vec<f32> = inside
        .iter()
        .map(|&solid| if solid { f32::MAX } else { 0.0 })
        .collect();

    let mut forward = Vec::with_capacity(13);
    for dz in -1isize..=0 {
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                if (dz, dy, dx) >= (0, 0, 0) {
                    continue;
                }
                let weight = CHAMFER[(dx != 0) as usize + (dy != 0) as usize + (dz != 0) as usize];
                forward.push((dx, dy, dz, weight));
            }
        }
    }
    let backward: Vec<_> = forward.iter().map(|&(x, y, z, w)| (-x, -y, -z, w)).collect();

    let mut relax = |x: usize, y: usize, z: usize, offsets: &[(isize, isize, isize, f32)]| {
        let here = lattice.index(x, y, z);
        if dist[here] == 0.0 {
            return;
        }
        for &(dx, dy, dz, w) in offsets {
            let (qx, qy, qz) = (x as isize + dx, y as isize + dy, z as isize + dz);
            if qx < 0 || qy < 0 || qz < 0 || qx >= nx as isize || qy >= ny as isize || qz >= nz as isize {
                continue;
            }
            let candidate = dist[lattice.index(qx as usize, qy as usize, qz as usize)] + w;
            if candidate < dist[here] {
                dist[here] = candidate;
            }
        }
    };

    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                relax(x, y, z, &forward);
            }
        }
    }
    for z in (0..nz).rev() {
        for y in (0..ny).rev() {
            for x in (0..nx).rev() {
                relax(x, y, z, &backward);
            }
        }
    }

    dist.iter().map(|d| d / CHAMFER[1]).collect()
}

/// Rasterizes the solid, keeps a shell `wall_thickness` deep and re-meshes it.
#[derive(Debug, Clone)]
pub struct VoxelHollower {
    settings: HollowSettings,
}

impl VoxelHollower {
    pub const fn new(settings: HollowSettings) -> Self {
        VoxelHollower { settings }
    }
}

impl Hollower for VoxelHollower {
    fn algorithm(&self) -> HollowAlgorithm {
        HollowAlgorithm::Voxel
    }

    fn hollow(&self, mesh: &Mesh) -> Result<HollowReport, HollowError> {
        let surface = mesh.to_indexed();
        if surface.is_empty() {
            return Err(HollowError::Degenerate("mesh has no faces".to_string()));
        }
        if surface.open_area_ratio() > OPEN_AREA_TOLERANCE {
            return Err(HollowError::Degenerate("surface is not closed".to_string()));
        }
        let original_volume = mesh.volume();
        let lattice = Lattice::covering(mesh, self.settings.voxel_resolution);
        let wall_voxels = (self.settings.wall_thickness / lattice.spacing) as f32;

        let Occupancy {
            inside,
            crossed_columns,
            odd_columns,
        } = occupancy(&surface, &lattice);
        if odd_columns * 100 > crossed_columns {
            return Err(HollowError::Degenerate(format!(
                "surface is not closed ({odd_columns} of {crossed_columns} columns cross it an odd number of times)"
            )));
        }
        let depth = inward_depth(&inside, &lattice);
        let deepest = depth.iter().copied().fold(0.0_f32, f32::max);
        debug!(
            dims = ?lattice.dims,
            voxel_mm = lattice.spacing,
            wall_voxels,
            deepest,
            "voxelized solid"
        );

        if deepest <= wall_voxels + 0.5 {
            info!(
                wall_mm = self.settings.wall_thickness,
                "solid is thinner than two walls, left unhollowed"
            );
            return Ok(HollowReport::unchanged(mesh, HollowAlgorithm::Voxel));
        }

        // Negative inside the wall band, positive outside and in the cavity.
        let field: Vec<f32> = depth
            .iter()
            .map(|&d| (0.5 - d).max(d - (wall_voxels + 0.5)))
            .collect();

        let [nx, ny, nz] = lattice.dims.map(|n| n as u32);
        let shape = VoxelShape { nx, ny, nz };
        let mut buffer = SurfaceNetsBuffer::default();
        surface_nets(&field, &shape, [0; 3], [nx - 1, ny - 1, nz - 1], &mut buffer);

        let positions = buffer
            .positions
            .iter()
            .map(|p| {
                Point3::new(
                    lattice.origin.x + p[0] as Real * lattice.spacing,
                    lattice.origin.y + p[1] as Real * lattice.spacing,
                    lattice.origin.z + p[2] as Real * lattice.spacing,
                )
            })
            .collect();
        let faces = buffer
            .indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
            .collect();
        let mut shell = IndexedTriangles::new(positions, faces);

        if self.settings.smoothing_iterations > 0 {
            shell = shell.taubin_smooth(0.5, -0.53, self.settings.smoothing_iterations);
        }
        if self.settings.simplify_ratio < 1.0 {
            shell = shell.decimate_to_ratio(self.settings.simplify_ratio);
        }
        if shell.signed_volume() < 0.0 {
            shell.flip();
        }

        let hollowed = shell.to_mesh(FaceTag::Surface);
        if hollowed.is_empty() {
            return Err(HollowError::Degenerate("iso-surface extraction produced no faces".to_string()));
        }
        let volume = hollowed.volume();
        info!(
            faces = hollowed.triangle_count(),
            volume_before = original_volume,
            volume_after = volume,
            "voxel hollowing finished"
        );
        Ok(HollowReport {
            removed_volume: (original_volume - volume).max(0.0),
            mesh: hollowed,
            algorithm: HollowAlgorithm::Voxel,
            cavity: true,
        })
    }
}
