//! Cut-sequence search.
//!
//! Both segmenters share the same candidate generator and tie-breaking, so a
//! beam of width one reproduces the greedy cut sequence exactly.

pub mod beam;
pub mod greedy;
pub mod path;

pub use beam::BeamSegmenter;
pub use greedy::GreedySegmenter;
pub use path::{CutRecord, PathArena, PathId, SegmentationPath};

use crate::candidates::CandidateGenerator;
use crate::config::{BuildVolume, ValidatedConfig};
use crate::errors::Result;
use crate::float_types::Real;
use crate::mesh::Mesh;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Why the beam search handed over to the greedy result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The wall-clock budget ran out between depth steps.
    Timeout,
    /// `max_depth` steps passed without a complete path.
    DepthLimit,
    /// Every path in the beam ran out of viable cuts or parts.
    DeadEnd,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FallbackReason::Timeout => "search timeout elapsed before any path completed",
            FallbackReason::DepthLimit => "depth limit reached before any path completed",
            FallbackReason::DeadEnd => "every beam path ran out of viable cuts",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    Greedy,
    Beam,
}

/// The chosen cut sequence and how it was found.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub path: SegmentationPath,
    /// Algorithm that produced `path`.
    pub algorithm: SearchAlgorithm,
    /// Set when the beam search degraded to the greedy result.
    pub fallback: Option<FallbackReason>,
    /// Number of paths materialised.
    pub explored: usize,
    pub elapsed: Duration,
}

/// A strategy that turns one solid into a complete cut sequence.
pub trait Segmenter {
    fn segment(&self, mesh: Arc<Mesh>) -> Result<SearchOutcome>;
}

/// `max(8, 4 × estimated parts)` for models of the given size.
pub fn auto_max_parts(build: &BuildVolume, dims: &Vector3<Real>) -> usize {
    (4 * (build.estimated_cuts(dims) + 1)).max(8)
}

/// The part limit in effect: the configured value, or the automatic one for 0.
pub fn resolve_max_parts(config: &ValidatedConfig, dims: &Vector3<Real>) -> usize {
    match config.max_parts {
        0 => auto_max_parts(&config.build_volume, dims),
        n => n,
    }
}

/// Build the segmenter selected by the configuration.
pub fn segmenter_for(config: &ValidatedConfig, max_parts: usize) -> Box<dyn Segmenter> {
    let generator = CandidateGenerator::new(config);
    if config.use_beam_search {
        Box::new(BeamSegmenter::new(
            generator,
            max_parts,
            config.beam_width,
            config.max_depth,
            Duration::from_secs_f64(config.search_timeout_secs),
        ))
    } else {
        Box::new(GreedySegmenter::new(generator, max_parts))
    }
}
