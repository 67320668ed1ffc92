//! Greedy segmenter: always take the single best cut of the largest oversized part.

use crate::candidates::CandidateGenerator;
use crate::errors::{Result, SegmentationError};
use crate::mesh::Mesh;
use crate::search::path::{PathArena, SegmentationPath};
use crate::search::{SearchAlgorithm, SearchOutcome, Segmenter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct GreedySegmenter {
    generator: CandidateGenerator,
    max_parts: usize,
}

impl GreedySegmenter {
    pub const fn new(generator: CandidateGenerator, max_parts: usize) -> Self {
        GreedySegmenter {
            generator,
            max_parts,
        }
    }
}

impl Segmenter for GreedySegmenter {
    fn segment(&self, mesh: Arc<Mesh>) -> Result<SearchOutcome> {
        let start = Instant::now();
        let build = *self.generator.build_volume();
        let mut arena = PathArena::new();
        let mut current = arena.push(SegmentationPath::root(mesh, &build));

        loop {
            let path = arena.get(current);
            let Some(part_index) = path.largest_oversized(&build) else {
                break;
            };
            if path.parts.len() + 1 > self.max_parts {
                return Err(SegmentationError::MaxPartsExceeded {
                    achieved: path.parts.len(),
                    max_parts: self.max_parts,
                });
            }

            let part = &path.parts[part_index];
            let candidates = self.generator.generate(part);
            let child = candidates
                .iter()
                .find_map(|candidate| path.extend(current, part_index, candidate));
            let Some(child) = child else {
                let dims = part.dimensions();
                return Err(SegmentationError::NoViableCut {
                    part_index,
                    dimensions: [dims.x, dims.y, dims.z],
                });
            };

            if let Some(cut) = child.cuts.last() {
                debug!(
                    cut = %cut.candidate.plane,
                    score = cut.candidate.total_score,
                    parts = child.parts.len(),
                    "greedy cut"
                );
            }
            current = arena.push(child);
        }

        let explored = arena.len();
        let path = arena.take(current);
        info!(
            cuts = path.cuts.len(),
            parts = path.parts.len(),
            score = path.score,
            "greedy search finished"
        );
        Ok(SearchOutcome {
            path,
            algorithm: SearchAlgorithm::Greedy,
            fallback: None,
            explored,
            elapsed: start.elapsed(),
        })
    }
}
