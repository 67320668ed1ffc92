//! Beam search over cut sequences.

use crate::candidates::CandidateGenerator;
use crate::errors::Result;
use crate::mesh::Mesh;
use crate::search::greedy::GreedySegmenter;
use crate::search::path::{PathArena, PathId, SegmentationPath};
use crate::search::{FallbackReason, SearchAlgorithm, SearchOutcome, Segmenter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Keeps the `beam_width` best partial segmentations at every depth.
///
/// The greedy result is always computed as well. The better of the best
/// complete beam path and the greedy path is returned, and when no beam path
/// completes the greedy path is returned with a [`FallbackReason`].
#[derive(Debug, Clone)]
pub struct BeamSegmenter {
    generator: CandidateGenerator,
    max_parts: usize,
    beam_width: usize,
    max_depth: usize,
    timeout: Duration,
}

impl BeamSegmenter {
    pub fn new(
        generator: CandidateGenerator,
        max_parts: usize,
        beam_width: usize,
        max_depth: usize,
        timeout: Duration,
    ) -> Self {
        BeamSegmenter {
            generator,
            max_parts,
            beam_width: beam_width.max(1),
            max_depth,
            timeout,
        }
    }

    /// Children of one incomplete path: the top `beam_width` candidates for
    /// its largest oversized part that cut successfully.
    fn expand(&self, arena: &PathArena, id: PathId) -> Vec<SegmentationPath> {
        let build = self.generator.build_volume();
        let path = arena.get(id);
        let Some(part_index) = path.largest_oversized(build) else {
            return Vec::new();
        };
        if path.parts.len() + 1 > self.max_parts {
            return Vec::new();
        }
        self.generator
            .generate(&path.parts[part_index])
            .iter()
            .filter_map(|candidate| path.extend(id, part_index, candidate))
            .take(self.beam_width)
            .collect()
    }
}

impl Segmenter for BeamSegmenter {
    fn segment(&self, mesh: Arc<Mesh>) -> Result<SearchOutcome> {
        let start = Instant::now();
        let build = *self.generator.build_volume();
        let greedy = GreedySegmenter::new(self.generator.clone(), self.max_parts).segment(mesh.clone());

        let mut arena = PathArena::new();
        let mut beam = vec![arena.push(SegmentationPath::root(mesh, &build))];
        let mut stopped = None;

        for depth in 0..self.max_depth {
            if beam.iter().all(|&id| arena.get(id).is_complete(&build)) {
                break;
            }
            if start.elapsed() >= self.timeout {
                stopped = Some(FallbackReason::Timeout);
                break;
            }

            let mut next: Vec<PathId> = Vec::new();
            for &id in &beam {
                if arena.get(id).is_complete(&build) {
                    next.push(id);
                    continue;
                }
                for child in self.expand(&arena, id) {
                    next.push(arena.push(child));
                }
            }

            if next.is_empty() {
                beam.clear();
                stopped = Some(FallbackReason::DeadEnd);
                break;
            }
            next.sort_by(|&a, &b| arena.get(b).score.total_cmp(&arena.get(a).score));
            next.truncate(self.beam_width);
            beam = next;

            debug!(
                depth = depth + 1,
                beam = beam.len(),
                best = arena.get(beam[0]).score,
                explored = arena.len(),
                "beam step"
            );
        }

        let best_complete = beam
            .iter()
            .copied()
            .filter(|&id| arena.get(id).is_complete(&build))
            .fold(None, |best: Option<PathId>, id| match best {
                Some(b) if arena.get(b).score >= arena.get(id).score => Some(b),
                _ => Some(id),
            });

        let explored = arena.len();
        match (best_complete, greedy) {
            (Some(id), Ok(greedy)) if greedy.path.score > arena.get(id).score => {
                info!(
                    beam_score = arena.get(id).score,
                    greedy_score = greedy.path.score,
                    "greedy sequence outscored the beam"
                );
                Ok(SearchOutcome {
                    explored: explored + greedy.explored,
                    elapsed: start.elapsed(),
                    ..greedy
                })
            },
            (Some(id), _) => {
                let path = arena.take(id);
                info!(
                    cuts = path.cuts.len(),
                    parts = path.parts.len(),
                    score = path.score,
                    explored,
                    "beam search finished"
                );
                Ok(SearchOutcome {
                    path,
                    algorithm: SearchAlgorithm::Beam,
                    fallback: None,
                    explored,
                    elapsed: start.elapsed(),
                })
            },
            (None, greedy) => {
                let reason = stopped.unwrap_or(FallbackReason::DepthLimit);
                let greedy = greedy?;
                warn!(
                    stage = "search",
                    fallback = "greedy",
                    reason = %reason,
                    "beam search found no complete path"
                );
                Ok(SearchOutcome {
                    fallback: Some(reason),
                    explored: explored + greedy.explored,
                    elapsed: start.elapsed(),
                    ..greedy
                })
            },
        }
    }
}
