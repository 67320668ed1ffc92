//! Immutable search state: a sequence of cuts and the parts it produced.

use crate::config::BuildVolume;
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::scoring::CutCandidate;
use std::sync::Arc;

/// Index of a path inside a [`PathArena`].
pub type PathId = usize;

/// One executed cut.
#[derive(Debug, Clone, PartialEq)]
pub struct CutRecord {
    /// Identifier carried by the cap faces of this cut (`FaceTag::Cut(id)`).
    pub id: u32,
    /// Index of the negative-side part right after the cut; the positive
    /// side was inserted at `part_index + 1`.
    pub part_index: usize,
    pub candidate: CutCandidate,
}

/// A partial or complete segmentation. Never mutated: applying a cut
/// produces a new path that shares the untouched parts.
#[derive(Debug, Clone)]
pub struct SegmentationPath {
    pub parts: Vec<Arc<Mesh>>,
    pub cuts: Vec<CutRecord>,
    /// Running average of the chosen candidates' total scores.
    pub score: Real,
    pub parent: Option<PathId>,
}

impl SegmentationPath {
    /// The uncut solid. Scores 1.0 if it already fits, 0.0 otherwise.
    pub fn root(mesh: Arc<Mesh>, build: &BuildVolume) -> Self {
        let score = if build.fits(&mesh.dimensions()) { 1.0 } else { 0.0 };
        SegmentationPath {
            parts: vec![mesh],
            cuts: Vec::new(),
            score,
            parent: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.cuts.len()
    }

    /// Every part fits the build volume in some orientation.
    pub fn is_complete(&self, build: &BuildVolume) -> bool {
        self.parts.iter().all(|p| build.fits(&p.dimensions()))
    }

    /// The oversized part with the largest bounding box volume, first on ties.
    pub fn largest_oversized(&self, build: &BuildVolume) -> Option<usize> {
        let mut best: Option<(usize, Real)> = None;
        for (i, part) in self.parts.iter().enumerate() {
            let dims = part.dimensions();
            if build.fits(&dims) {
                continue;
            }
            let volume = dims.x * dims.y * dims.z;
            if best.is_none_or(|(_, v)| volume > v) {
                best = Some((i, volume));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Apply `candidate` to part `part_index`, returning the child path.
    /// `None` if the executed cut left either side empty.
    pub fn extend(
        &self,
        parent: PathId,
        part_index: usize,
        candidate: &CutCandidate,
    ) -> Option<SegmentationPath> {
        let part = self.parts.get(part_index)?;
        let id = self.cuts.len() as u32;
        let (back, front) = part.split(&candidate.plane.to_plane(), id);
        if back.is_empty() || front.is_empty() {
            return None;
        }

        let mut parts = self.parts.clone();
        parts[part_index] = Arc::new(back);
        parts.insert(part_index + 1, Arc::new(front));

        let mut cuts = self.cuts.clone();
        cuts.push(CutRecord {
            id,
            part_index,
            candidate: *candidate,
        });

        let k = self.cuts.len() as Real;
        let score = (self.score * k + candidate.total_score) / (k + 1.0);

        Some(SegmentationPath {
            parts,
            cuts,
            score,
            parent: Some(parent),
        })
    }
}

/// Append-only storage for every path a search creates.
#[derive(Debug, Default)]
pub struct PathArena {
    paths: Vec<SegmentationPath>,
}

impl PathArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: SegmentationPath) -> PathId {
        self.paths.push(path);
        self.paths.len() - 1
    }

    pub fn get(&self, id: PathId) -> &SegmentationPath {
        &self.paths[id]
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Move a path out of the arena at the end of a search.
    pub fn take(mut self, id: PathId) -> SegmentationPath {
        self.paths.swap_remove(id)
    }
}
