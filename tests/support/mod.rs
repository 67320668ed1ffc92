//! Test support library
//! Provides various helper functions & utilities for tests.
#![allow(dead_code)]

use meshcut::{
    config::BuildVolume,
    float_types::Real,
    mesh::{Mesh, polygon::FaceTag},
};
use std::path::{Path, PathBuf};

/// Axis-aligned block with one corner at the origin.
pub fn block(x: Real, y: Real, z: Real) -> Mesh {
    Mesh::cuboid(x, y, z, FaceTag::Surface)
}

/// True if every part fits `build` in at least one 90° orientation.
pub fn all_fit(parts: &[Mesh], build: &BuildVolume) -> bool {
    parts.iter().all(|part| build.fits(&part.dimensions()))
}

/// Total volume of a set of parts.
pub fn total_volume(parts: &[Mesh]) -> Real {
    parts.iter().map(Mesh::volume).sum()
}

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Write `mesh` as a binary STL into `dir` and return its path.
pub fn write_model(dir: &Path, name: &str, mesh: &Mesh) -> PathBuf {
    let path = dir.join(format!("{name}.stl"));
    meshcut::io::stl::write_stl(mesh, &path, name).expect("writing test model");
    path
}
