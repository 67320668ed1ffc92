//! Alignment joints on mating cut faces.
//!
//! For every executed cut, each pair of parts that still shares a piece of
//! that cut's face gets one or more joints. A joint whose boolean fails
//! validation is left out and reported; it never aborts the run.

pub mod anchors;
pub mod builders;

pub use anchors::{AnchorSettings, CapRegion, find_anchors};
pub use builders::{
    DovetailJoint, DowelJoint, IntegratedJoint, JointBuilder, JointFrame, NoJoint, PyramidJoint,
    joint_builder_for,
};

use crate::config::{BuildVolume, JointType, PIN_WALL_MARGIN_MM, SegmentationConfig};
use crate::errors::BooleanError;
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::pipeline::Degradation;
use crate::search::CutRecord;
use crate::traits::CSGOps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One joint as built, recorded for export metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointPlacement {
    pub cut_id: u32,
    pub joint_type: JointType,
    /// Centre of the feature on the cut face.
    pub position: [Real; 3],
    /// Cut normal, pointing from `negative_part` into `positive_part`.
    pub axis: [Real; 3],
    pub negative_part: usize,
    pub positive_part: usize,
}

/// Everything the joint stage produced besides the modified parts.
#[derive(Debug, Clone, Default)]
pub struct JointReport {
    pub placements: Vec<JointPlacement>,
    /// External parts to buy, keyed by description.
    pub hardware: BTreeMap<String, usize>,
    pub degradations: Vec<Degradation>,
}

/// Why a single joint was left out.
#[derive(Debug, thiserror::Error)]
enum JointRejection {
    #[error(transparent)]
    Boolean(#[from] BooleanError),
    #[error("feature would push part {0} past the build volume")]
    Oversized(usize),
}

/// Build one joint between `parts[neg]` and `parts[pos]`. A part that fitted
/// the build volume must still fit afterwards.
fn place_joint(
    builder: &dyn JointBuilder,
    parts: &[Mesh],
    (neg, pos): (usize, usize),
    frame: &JointFrame,
    build: &BuildVolume,
) -> Result<(Mesh, Mesh), JointRejection> {
    let (negative, positive) = builder.apply(&parts[neg], &parts[pos], frame)?;
    for (index, after) in [(neg, &negative), (pos, &positive)] {
        if build.fits(&parts[index].dimensions()) && !build.fits(&after.dimensions()) {
            return Err(JointRejection::Oversized(index));
        }
    }
    Ok((negative, positive))
}

/// Add joints for every cut in `cuts` to `parts`, in place.
///
/// `cap_tolerance` enables locating cut faces by geometry on parts whose
/// face tags were lost; pass 0 when every part still carries them.
pub fn add_joints(
    parts: &mut [Mesh],
    cuts: &[CutRecord],
    config: &SegmentationConfig,
    cap_tolerance: Real,
) -> JointReport {
    let mut report = JointReport::default();
    if config.joint_type == JointType::None || parts.len() < 2 {
        return report;
    }
    let builder = joint_builder_for(config);
    let settings = AnchorSettings {
        radius: builder.footprint_radius(),
        margin: PIN_WALL_MARGIN_MM * 0.5,
        diameter: builder.spacing_diameter(),
        large_face_threshold: config.large_face_threshold_mm,
    };

    for cut in cuts {
        let cutting_plane = cut.candidate.plane;
        let plane = cutting_plane.to_plane();
        let touching = |part: &Mesh| {
            let bounds = part.bounding_box();
            let (lo, hi) = bounds.vertices().iter().fold((Real::MAX, Real::MIN), |(lo, hi), c| {
                let d = plane.signed_distance(c);
                (lo.min(d), hi.max(d))
            });
            lo <= cap_tolerance.max(1e-6) && hi >= -cap_tolerance.max(1e-6)
        };

        let caps: Vec<(Option<CapRegion>, Option<CapRegion>)> = parts
            .iter()
            .map(|part| {
                if !touching(part) {
                    return (None, None);
                }
                (
                    CapRegion::of_part(part, &plane, cut.id, 1.0, cap_tolerance),
                    CapRegion::of_part(part, &plane, cut.id, -1.0, cap_tolerance),
                )
            })
            .collect();

        for (neg, (below, _)) in caps.iter().enumerate() {
            let Some(below) = below else { continue };
            for (pos, (_, above)) in caps.iter().enumerate() {
                let Some(above) = above else { continue };
                if pos == neg {
                    continue;
                }
                let anchors = find_anchors(below, above, &settings);
                if anchors.is_empty() {
                    warn!(
                        stage = "joints",
                        fallback = "joint omitted",
                        reason = "no room on the cut face",
                        cut = cut.id,
                        negative_part = neg,
                        positive_part = pos,
                        "no joint location"
                    );
                    report.degradations.push(Degradation {
                        stage: format!("{} joint on cut {}", builder.joint_type(), cut.id),
                        fallback: "joint omitted".to_string(),
                        reason: format!("cut face between parts {neg} and {pos} has no room for the joint"),
                    });
                    continue;
                }

                for origin in anchors::to_world(&plane, &anchors) {
                    let frame = JointFrame {
                        origin,
                        axis: cutting_plane.normal,
                    };
                    match place_joint(builder.as_ref(), parts, (neg, pos), &frame, &config.build_volume) {
                        Ok((negative, positive)) => {
                            parts[neg] = negative;
                            parts[pos] = positive;
                            if let Some(item) = builder.hardware() {
                                *report.hardware.entry(item).or_default() += 1;
                            }
                            debug!(cut = cut.id, negative_part = neg, positive_part = pos, ?origin, "joint added");
                            report.placements.push(JointPlacement {
                                cut_id: cut.id,
                                joint_type: builder.joint_type(),
                                position: origin.coords.into(),
                                axis: cutting_plane.normal.into(),
                                negative_part: neg,
                                positive_part: pos,
                            });
                        },
                        Err(error) => {
                            warn!(
                                stage = "joints",
                                fallback = "joint omitted",
                                reason = %error,
                                cut = cut.id,
                                "joint rejected"
                            );
                            report.degradations.push(Degradation {
                                stage: format!("{} joint on cut {}", builder.joint_type(), cut.id),
                                fallback: "joint omitted".to_string(),
                                reason: error.to_string(),
                            });
                        },
                    }
                }
            }
        }
    }
    report
}
