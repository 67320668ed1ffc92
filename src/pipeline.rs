//! End-to-end orchestration: validate, hollow, cut, joint, export.

use crate::config::{ConfigAdjustment, HollowAlgorithm, HollowStrategy, JointType, SegmentationConfig, ValidatedConfig};
use crate::cutting_plane::CuttingPlane;
use crate::errors::{Result, SegmentationError};
use crate::float_types::Real;
use crate::hollow::{HollowSettings, hollow_with_fallback};
use crate::io::archive::{self, PartFile};
use crate::io::load_mesh;
use crate::joints::{JointPlacement, add_joints};
use crate::mesh::Mesh;
use crate::search::{CutRecord, FallbackReason, SearchAlgorithm, resolve_max_parts, segmenter_for};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// A stage that did not run as requested and what ran instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub stage: String,
    pub fallback: String,
    pub reason: String,
}

/// One executed cut, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutSummary {
    pub id: u32,
    pub plane: CuttingPlane,
    pub score: Real,
}

impl From<&CutRecord> for CutSummary {
    fn from(record: &CutRecord) -> Self {
        CutSummary {
            id: record.id,
            plane: record.candidate.plane,
            score: record.candidate.total_score,
        }
    }
}

/// How the cut sequence was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub algorithm: SearchAlgorithm,
    pub fallback: Option<FallbackReason>,
    pub explored: usize,
    pub elapsed_secs: Real,
}

/// In-memory segmentation output, before anything is written.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub parts: Vec<Mesh>,
    pub cuts: Vec<CutSummary>,
    pub joints: Vec<JointPlacement>,
    pub hardware: BTreeMap<String, usize>,
    /// Path score of the chosen cut sequence.
    pub score: Real,
    pub search: Option<SearchSummary>,
    /// Algorithm that actually hollowed the parts, if any did.
    pub hollowed_with: Option<HollowAlgorithm>,
    pub degradations: Vec<Degradation>,
    pub adjustments: Vec<ConfigAdjustment>,
    pub assembly_note: String,
}

/// What [`segment_file`] and [`Segmentation::export`] leave on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    pub parts: Vec<PartFile>,
    /// Combined preview with every part in place.
    pub archive: PathBuf,
    pub hardware: BTreeMap<String, usize>,
    pub assembly_note: String,
    pub cuts: Vec<CutSummary>,
    pub joints: Vec<JointPlacement>,
    pub score: Real,
    pub search: Option<SearchSummary>,
    pub degradations: Vec<Degradation>,
    pub adjustments: Vec<ConfigAdjustment>,
}

fn hollow_all(
    parts: &mut [Mesh],
    algorithm: HollowAlgorithm,
    settings: HollowSettings,
    degradations: &mut Vec<Degradation>,
) -> (Option<HollowAlgorithm>, Real) {
    let mut used = None;
    let mut voxel_size: Real = 0.0;
    for part in parts.iter_mut() {
        let (report, mut fallbacks) = hollow_with_fallback(part, algorithm, settings);
        degradations.append(&mut fallbacks);
        if report.cavity {
            used = Some(report.algorithm);
            if report.algorithm == HollowAlgorithm::Voxel {
                voxel_size = voxel_size.max(part.dimensions().max() / settings.voxel_resolution as Real);
            }
        }
        *part = report.mesh;
    }
    (used, voxel_size)
}

/// Cut `mesh` into parts that fit the configured build volume.
///
/// A model that already fits comes back as a single untouched part unless
/// `force_hollow` is set.
pub fn segment_mesh(mesh: &Mesh, config: &SegmentationConfig) -> Result<Segmentation> {
    let config = config.validate()?;
    if mesh.is_empty() {
        return Err(SegmentationError::EmptyMesh);
    }
    for adjustment in &config.adjustments {
        info!(%adjustment, "configuration adjusted");
    }

    let build = config.build_volume;
    let needs_segmentation = !build.fits(&mesh.dimensions());
    let strategy = config.effective_hollow_strategy();

    if !needs_segmentation && (!config.force_hollow || strategy == HollowStrategy::None) {
        info!("model fits the build volume, passing it through");
        let mut segmentation = Segmentation {
            parts: vec![mesh.clone()],
            cuts: Vec::new(),
            joints: Vec::new(),
            hardware: BTreeMap::new(),
            score: 1.0,
            search: None,
            hollowed_with: None,
            degradations: Vec::new(),
            adjustments: config.adjustments.clone(),
            assembly_note: String::new(),
        };
        segmentation.assembly_note = assembly_note(&segmentation, &config);
        return Ok(segmentation);
    }

    let settings = HollowSettings::from_config(&config);
    let mut degradations = Vec::new();
    let mut hollowed_with = None;
    let mut solid = mesh.clone();

    let before_cut = match strategy {
        HollowStrategy::HollowThenSegment => Some(config.hollow_algorithm),
        HollowStrategy::SurfaceShell => Some(HollowAlgorithm::Shell),
        HollowStrategy::SegmentThenHollow | HollowStrategy::None => None,
    };
    if let Some(algorithm) = before_cut {
        let (report, mut fallbacks) = hollow_with_fallback(&solid, algorithm, settings);
        degradations.append(&mut fallbacks);
        if report.cavity {
            hollowed_with = Some(report.algorithm);
        }
        solid = report.mesh;
    }

    let (mut parts, cuts, score, search) = if needs_segmentation {
        let max_parts = resolve_max_parts(&config, &solid.dimensions());
        let outcome = segmenter_for(&config, max_parts).segment(Arc::new(solid))?;
        if let Some(reason) = outcome.fallback {
            degradations.push(Degradation {
                stage: "beam search".to_string(),
                fallback: "greedy cut sequence".to_string(),
                reason: reason.to_string(),
            });
        }
        let search = SearchSummary {
            algorithm: outcome.algorithm,
            fallback: outcome.fallback,
            explored: outcome.explored,
            elapsed_secs: outcome.elapsed.as_secs_f64(),
        };
        let path = outcome.path;
        let parts: Vec<Mesh> = path.parts.into_iter().map(Arc::unwrap_or_clone).collect();
        (parts, path.cuts, path.score, Some(search))
    } else {
        (vec![solid], Vec::new(), 1.0, None)
    };

    let mut cap_tolerance = 0.0;
    if strategy == HollowStrategy::SegmentThenHollow {
        let (used, voxel_size) = hollow_all(&mut parts, config.hollow_algorithm, settings, &mut degradations);
        hollowed_with = used.or(hollowed_with);
        cap_tolerance = voxel_size;
    }

    let joints = add_joints(&mut parts, &cuts, &config, cap_tolerance);
    degradations.extend(joints.degradations);

    let mut segmentation = Segmentation {
        parts,
        cuts: cuts.iter().map(CutSummary::from).collect(),
        joints: joints.placements,
        hardware: joints.hardware,
        score,
        search,
        hollowed_with,
        degradations,
        adjustments: config.adjustments.clone(),
        assembly_note: String::new(),
    };
    segmentation.assembly_note = assembly_note(&segmentation, &config);

    if !segmentation.degradations.is_empty() {
        warn!(count = segmentation.degradations.len(), "segmentation finished with fallbacks");
    }
    info!(
        parts = segmentation.parts.len(),
        cuts = segmentation.cuts.len(),
        joints = segmentation.joints.len(),
        score = segmentation.score,
        "segmentation finished"
    );
    Ok(segmentation)
}

/// Load `input`, segment it and write the parts and preview archive into `out_dir`.
pub fn segment_file(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &SegmentationConfig,
) -> Result<SegmentationResult> {
    let mesh = load_mesh(input)?;
    let segmentation = segment_mesh(&mesh, config)?;
    segmentation.export(out_dir, config.export_stl)
}

impl Segmentation {
    /// Write `part_NN.3mf` (plus `part_NN.stl` if asked) for every part and
    /// the combined `assembly.3mf`.
    pub fn export(&self, out_dir: impl AsRef<Path>, export_stl: bool) -> Result<SegmentationResult> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir).map_err(crate::io::IoError::from)?;

        let parts = self
            .parts
            .iter()
            .enumerate()
            .map(|(index, mesh)| archive::write_part(out_dir, index, self.parts.len(), mesh, &self.joints, export_stl))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut result = SegmentationResult {
            parts,
            archive: out_dir.join(archive::ASSEMBLY_FILE),
            hardware: self.hardware.clone(),
            assembly_note: self.assembly_note.clone(),
            cuts: self.cuts.clone(),
            joints: self.joints.clone(),
            score: self.score,
            search: self.search.clone(),
            degradations: self.degradations.clone(),
            adjustments: self.adjustments.clone(),
        };
        result.archive = archive::write_assembly(out_dir, &self.parts, &result)?;
        info!(archive = %result.archive.display(), parts = result.parts.len(), "exported");
        Ok(result)
    }
}

/// Human-readable assembly instructions: parts, materials, joints and any
/// automatic changes or fallbacks.
pub fn assembly_note(segmentation: &Segmentation, config: &ValidatedConfig) -> String {
    let mut note = String::new();
    let count = segmentation.parts.len();
    if count == 1 {
        note.push_str("Print the model as a single part; no assembly needed.\n");
    } else {
        let _ = writeln!(
            note,
            "Print {count} parts and assemble them in part order along {} cut{}.",
            segmentation.cuts.len(),
            if segmentation.cuts.len() == 1 { "" } else { "s" }
        );
        match config.joint_type {
            JointType::None => note.push_str("Joints: none, adhesive-only assembly.\n"),
            JointType::Dowel => {
                let _ = writeln!(note, "Joints: {} dowel hole pairs; glue dowels into both sides.", segmentation.joints.len());
            },
            joint => {
                let _ = writeln!(
                    note,
                    "Joints: {} printed {joint} joints; press each pin into its hole, adhesive optional.",
                    segmentation.joints.len()
                );
            },
        }
        if segmentation.hardware.is_empty() {
            note.push_str("Materials: adhesive.\n");
        } else {
            let items: Vec<String> = segmentation
                .hardware
                .iter()
                .map(|(item, n)| format!("{n} × {item}"))
                .collect();
            let _ = writeln!(note, "Materials: {}, adhesive.", items.join(", "));
        }
    }
    if let Some(algorithm) = segmentation.hollowed_with {
        let _ = writeln!(
            note,
            "Parts are hollow ({algorithm} hollowing, {:.2} mm walls).",
            config.wall_thickness_mm
        );
    }
    for adjustment in &segmentation.adjustments {
        let _ = writeln!(note, "Note: {adjustment}.");
    }
    for degradation in &segmentation.degradations {
        let _ = writeln!(
            note,
            "Fallback: {} replaced by {} ({}).",
            degradation.stage, degradation.fallback, degradation.reason
        );
    }
    note.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;

    #[test]
    fn fitting_model_passes_through() {
        let mesh = Mesh::cuboid(200.0, 150.0, 100.0, FaceTag::Surface);
        let config = SegmentationConfig::default().with_hollowing(HollowStrategy::HollowThenSegment);
        let segmentation = segment_mesh(&mesh, &config).unwrap();
        assert_eq!(segmentation.parts.len(), 1);
        assert!(segmentation.cuts.is_empty() && segmentation.joints.is_empty());
        assert_eq!(segmentation.parts[0].polygons.len(), mesh.polygons.len());
        assert!(segmentation.assembly_note.contains("single part"));
    }

    #[test]
    fn invalid_config_stops_before_geometry() {
        let mesh = Mesh::cube(10.0, FaceTag::Surface);
        let config = SegmentationConfig::default().with_wall_thickness(-2.0);
        assert!(matches!(
            segment_mesh(&mesh, &config),
            Err(SegmentationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn wall_adjustment_reaches_the_note() {
        let mesh = Mesh::cuboid(300.0, 60.0, 60.0, FaceTag::Surface);
        let config = SegmentationConfig {
            wall_thickness_mm: 5.0,
            pin_diameter_mm: 5.0,
            ..SegmentationConfig::default()
        }
        .with_joint(JointType::Integrated)
        .with_greedy_search();
        let segmentation = segment_mesh(&mesh, &config).unwrap();
        assert!(segmentation.parts.len() >= 2);
        assert!(
            segmentation
                .assembly_note
                .contains("wall thickness increased from 5.00 mm to 7.00 mm"),
            "{}",
            segmentation.assembly_note
        );
    }
}
