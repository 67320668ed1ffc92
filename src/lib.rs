//! Split solids that exceed a printer's build volume into printable parts.
//!
//! The engine searches for a sequence of planar cuts (greedy or beam search
//! over scored candidates), optionally hollows the model or its parts, adds
//! alignment joints across every cut face and writes each part as 3MF next
//! to a combined assembly archive.
//!
//! Geometry is a polygon-soup [`Mesh`](mesh::Mesh) with BSP-tree booleans
//! exposed through [`CSGOps`](traits::CSGOps).
//!
//! # Features
//! #### Default
//! - [**stl-io**](https://en.wikipedia.org/wiki/STL_(file_format)): `.stl` import/export
//!
//! #### Optional
//! - **parallel**: use rayon for candidate scoring and containment checks

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod candidates;
pub mod check;
pub mod config;
pub mod cutting_plane;
pub mod errors;
pub mod float_types;
pub mod hollow;
pub mod io;
pub mod joints;
pub mod mesh;
pub mod pipeline;
pub mod scoring;
pub mod search;
pub mod traits;

pub use check::{CheckReport, check_file, check_mesh};
pub use config::{BuildVolume, HollowAlgorithm, HollowStrategy, JointType, SegmentationConfig};
pub use cutting_plane::CuttingPlane;
pub use errors::{Result, SegmentationError};
pub use mesh::Mesh;
pub use pipeline::{Segmentation, SegmentationResult, segment_file, segment_mesh};
pub use traits::CSGOps;
