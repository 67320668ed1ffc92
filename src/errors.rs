//! Error taxonomy for the segmentation engine

use crate::float_types::Real;
use crate::io::IoError;
use std::path::PathBuf;

/// Result alias used by every fallible public operation.
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Fatal failures surfaced to the caller.
///
/// Recoverable conditions (a failed boolean, a search that ran out of time)
/// never appear here: the pipeline substitutes a fallback and records a
/// [`Degradation`](crate::pipeline::Degradation) instead.
#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    /// The input solid could not be read or parsed.
    #[error("failed to load mesh from {path}: {source}")]
    MeshLoad {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    /// The input contains no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// Configuration rejected before any geometry work began.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The search needed more parts than allowed.
    #[error("segmentation needs more than {max_parts} parts (reached {achieved} with oversized parts left)")]
    MaxPartsExceeded { achieved: usize, max_parts: usize },

    /// An oversized part admits no cut candidate at all.
    #[error("no viable cut for part {part_index} with dimensions {dimensions:?}")]
    NoViableCut {
        part_index: usize,
        dimensions: [Real; 3],
    },

    /// Writing part files or the combined archive failed.
    #[error("export failed: {0}")]
    Export(#[from] IoError),
}

/// A boolean subtraction/union that produced unusable geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BooleanError {
    /// The operation returned no polygons.
    #[error("boolean operation produced an empty mesh")]
    EmptyResult,

    /// The volume change is outside what the tool volume allows.
    #[error("volume change {actual:.3} mm³ outside expected range (tool volume {expected:.3} mm³)")]
    VolumeMismatch { expected: Real, actual: Real },

    /// An offset surface folded over itself.
    #[error("offset surface self-intersects: {0}")]
    SelfIntersection(String),

    /// The subtracted volume is not fully inside the outer solid.
    #[error("inner surface is not contained by the outer surface")]
    NotContained,
}

/// Hollowing failures; all of them are recoverable at the pipeline level.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HollowError {
    #[error(transparent)]
    Boolean(#[from] BooleanError),

    /// Input unsuitable for the chosen algorithm.
    #[error("cannot hollow mesh: {0}")]
    Degenerate(String),
}
