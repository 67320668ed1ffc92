//! Segmentation configuration, validation and automatic adjustments.

use crate::errors::{Result, SegmentationError};
use crate::float_types::{Real, tolerance};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Extra wall needed around a printed pin, in millimetres.
pub const PIN_WALL_MARGIN_MM: Real = 2.0;

/// The six axis permutations a part may be rotated into by 90° turns.
const ORIENTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Printable region of the target printer, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildVolume {
    pub x: Real,
    pub y: Real,
    pub z: Real,
}

impl Default for BuildVolume {
    fn default() -> Self {
        BuildVolume::new(256.0, 256.0, 256.0)
    }
}

impl BuildVolume {
    pub const fn new(x: Real, y: Real, z: Real) -> Self {
        BuildVolume { x, y, z }
    }

    pub const fn as_array(&self) -> [Real; 3] {
        [self.x, self.y, self.z]
    }

    pub fn volume(&self) -> Real {
        self.x * self.y * self.z
    }

    /// Index permutation `p` such that `dims[p[i]]` fits along build axis `i`,
    /// trying the identity orientation first.
    pub fn orientation_for(&self, dims: &Vector3<Real>) -> Option<[usize; 3]> {
        let build = self.as_array();
        let slack = tolerance();
        ORIENTATIONS
            .into_iter()
            .find(|p| (0..3).all(|i| dims[p[i]] <= build[i] + slack))
    }

    /// True if a box of `dims` fits in any of the six axis-aligned orientations.
    pub fn fits(&self, dims: &Vector3<Real>) -> bool {
        self.orientation_for(dims).is_some()
    }

    /// Per-axis overshoot without rotating the part.
    pub fn exceeds_by(&self, dims: &Vector3<Real>) -> [Real; 3] {
        let build = self.as_array();
        [0, 1, 2].map(|i| (dims[i] - build[i]).max(0.0))
    }

    /// Fewest cuts that could make a box of `dims` fit, assuming straight
    /// axis cuts and the best orientation.
    pub fn estimated_cuts(&self, dims: &Vector3<Real>) -> usize {
        let build = self.as_array();
        ORIENTATIONS
            .into_iter()
            .map(|p| {
                (0..3)
                    .map(|i| {
                        let pieces = (dims[p[i]] / build[i] - tolerance()).ceil();
                        pieces.max(1.0) as usize
                    })
                    .product::<usize>()
                    - 1
            })
            .min()
            .unwrap_or(0)
    }
}

macro_rules! tag_enum_from_str {
    ($ty:ident { $($name:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(format!(
                        "unknown {} '{other}', expected one of: {}",
                        stringify!($ty),
                        [$($name),+].join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($ty::$variant => $name,)+
                };
                f.write_str(name)
            }
        }
    };
}

/// When (and how) hollowing runs relative to cutting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HollowStrategy {
    /// Hollow the whole solid, then cut it (panel-like cross sections).
    HollowThenSegment,
    /// Cut first, then hollow each part (closed hollow boxes).
    SegmentThenHollow,
    /// Shell hollowing of the whole solid before cutting.
    SurfaceShell,
    #[default]
    None,
}

tag_enum_from_str!(HollowStrategy {
    "hollow_then_segment" => HollowThenSegment,
    "segment_then_hollow" => SegmentThenHollow,
    "surface_shell" => SurfaceShell,
    "none" => None,
});

/// Hollowing algorithm for the ordering strategies that do not imply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HollowAlgorithm {
    #[default]
    Voxel,
    Shell,
}

tag_enum_from_str!(HollowAlgorithm {
    "voxel" => Voxel,
    "shell" => Shell,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    #[default]
    Dowel,
    Integrated,
    Dovetail,
    Pyramid,
    None,
}

tag_enum_from_str!(JointType {
    "dowel" => Dowel,
    "integrated" => Integrated,
    "dovetail" => Dovetail,
    "pyramid" => Pyramid,
    "none" => None,
});

impl JointType {
    /// Joint types that print a pin out of the part's own wall.
    pub const fn needs_pin_wall(self) -> bool {
        matches!(
            self,
            JointType::Integrated | JointType::Dovetail | JointType::Pyramid
        )
    }
}

/// Everything the segmentation engine can be told.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub build_volume: BuildVolume,

    pub wall_thickness_mm: Real,
    pub enable_hollowing: bool,
    pub hollow_strategy: HollowStrategy,
    pub hollow_algorithm: HollowAlgorithm,
    /// Voxels along the longest bounding box axis.
    pub voxel_resolution: usize,
    /// Taubin smoothing passes applied to voxel hollowing output.
    pub smoothing_iterations: usize,
    /// Face fraction kept after voxel hollowing; 1.0 keeps every face.
    pub voxel_simplify_ratio: Real,
    /// Target inner/outer face ratio for shell hollowing.
    pub inner_face_ratio: Real,
    /// Hollow even when the model already fits and no cut is needed.
    pub force_hollow: bool,

    pub joint_type: JointType,
    pub joint_tolerance_mm: Real,
    pub pin_diameter_mm: Real,
    pub pin_height_mm: Real,
    pub dowel_diameter_mm: Real,
    pub dowel_length_mm: Real,
    /// Cut faces at least this long get extra anchors against torsion.
    pub large_face_threshold_mm: Real,

    pub overhang_threshold_deg: Real,
    pub enable_oblique_cuts: bool,
    pub oblique_fallback_threshold: Real,
    pub positions_per_axis: usize,
    pub min_part_thickness_mm: Real,

    pub use_beam_search: bool,
    pub beam_width: usize,
    pub max_depth: usize,
    pub search_timeout_secs: Real,
    /// Upper bound on output parts; 0 derives one from the model size.
    pub max_parts: usize,

    /// Write an STL next to every part 3MF.
    pub export_stl: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            build_volume: BuildVolume::default(),
            wall_thickness_mm: 2.0,
            enable_hollowing: false,
            hollow_strategy: HollowStrategy::None,
            hollow_algorithm: HollowAlgorithm::Voxel,
            voxel_resolution: 200,
            smoothing_iterations: 0,
            voxel_simplify_ratio: 1.0,
            inner_face_ratio: 0.1,
            force_hollow: false,
            joint_type: JointType::Dowel,
            joint_tolerance_mm: 0.2,
            pin_diameter_mm: 5.0,
            pin_height_mm: 8.0,
            dowel_diameter_mm: 6.0,
            dowel_length_mm: 20.0,
            large_face_threshold_mm: 80.0,
            overhang_threshold_deg: 30.0,
            enable_oblique_cuts: true,
            oblique_fallback_threshold: 0.5,
            positions_per_axis: 9,
            min_part_thickness_mm: 10.0,
            use_beam_search: true,
            beam_width: 3,
            max_depth: 10,
            search_timeout_secs: 30.0,
            max_parts: 0,
            export_stl: false,
        }
    }
}

/// A change the validator made to the requested configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAdjustment {
    pub field: String,
    pub requested: Real,
    pub applied: Real,
    pub reason: String,
}

impl fmt::Display for ConfigAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} increased from {:.2} mm to {:.2} mm ({})",
            self.field.replace('_', " "),
            self.requested,
            self.applied,
            self.reason
        )
    }
}

/// A configuration that passed [`SegmentationConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    config: SegmentationConfig,
    pub adjustments: Vec<ConfigAdjustment>,
}

impl Deref for ValidatedConfig {
    type Target = SegmentationConfig;

    fn deref(&self) -> &SegmentationConfig {
        &self.config
    }
}

impl ValidatedConfig {
    pub const fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// The hollowing strategy that actually applies.
    pub fn effective_hollow_strategy(&self) -> HollowStrategy {
        if self.enable_hollowing {
            self.hollow_strategy
        } else {
            HollowStrategy::None
        }
    }
}

fn require(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(SegmentationError::InvalidConfig(message()))
    }
}

fn positive(value: Real) -> bool {
    value.is_finite() && value > 0.0
}

impl SegmentationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SegmentationError::InvalidConfig(format!("malformed configuration: {e}")))
    }

    pub fn with_build_volume(mut self, x: Real, y: Real, z: Real) -> Self {
        self.build_volume = BuildVolume::new(x, y, z);
        self
    }

    pub fn with_joint(mut self, joint_type: JointType) -> Self {
        self.joint_type = joint_type;
        self
    }

    /// Enables hollowing with the given strategy (`None` disables it).
    pub fn with_hollowing(mut self, strategy: HollowStrategy) -> Self {
        self.enable_hollowing = strategy != HollowStrategy::None;
        self.hollow_strategy = strategy;
        self
    }

    pub fn with_wall_thickness(mut self, wall_mm: Real) -> Self {
        self.wall_thickness_mm = wall_mm;
        self
    }

    pub fn with_beam_search(mut self, width: usize, max_depth: usize, timeout_secs: Real) -> Self {
        self.use_beam_search = true;
        self.beam_width = width;
        self.max_depth = max_depth;
        self.search_timeout_secs = timeout_secs;
        self
    }

    pub fn with_greedy_search(mut self) -> Self {
        self.use_beam_search = false;
        self
    }

    pub fn with_max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = max_parts;
        self
    }

    /// Check every field before any geometry work starts, applying the
    /// automatic wall-thickness increase for pin-style joints.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let mut config = self.clone();
        let mut adjustments = Vec::new();

        let build = config.build_volume.as_array();
        require(build.iter().all(|&d| positive(d)), || {
            format!("build volume must be positive on every axis, got {build:?}")
        })?;
        require(positive(config.wall_thickness_mm), || {
            format!("wall thickness must be positive, got {}", config.wall_thickness_mm)
        })?;
        require(
            config.joint_tolerance_mm.is_finite() && config.joint_tolerance_mm >= 0.0,
            || format!("joint tolerance must be non-negative, got {}", config.joint_tolerance_mm),
        )?;
        require(
            config.overhang_threshold_deg.is_finite()
                && (0.0..90.0).contains(&config.overhang_threshold_deg),
            || format!("overhang threshold must lie in [0, 90) degrees, got {}", config.overhang_threshold_deg),
        )?;
        require((0.0..=1.0).contains(&config.oblique_fallback_threshold), || {
            format!(
                "oblique fallback threshold must lie in [0, 1], got {}",
                config.oblique_fallback_threshold
            )
        })?;
        require(config.positions_per_axis >= 1, || {
            "positions per axis must be at least 1".to_string()
        })?;
        require(
            config.min_part_thickness_mm.is_finite() && config.min_part_thickness_mm >= 0.0,
            || format!("minimum part thickness must be non-negative, got {}", config.min_part_thickness_mm),
        )?;
        require(positive(config.search_timeout_secs), || {
            format!("search timeout must be positive, got {}", config.search_timeout_secs)
        })?;
        if config.use_beam_search {
            require(config.beam_width >= 1, || "beam width must be at least 1".to_string())?;
            require(config.max_depth >= 1, || "max depth must be at least 1".to_string())?;
        }
        if config.enable_hollowing {
            require(config.voxel_resolution >= 8, || {
                format!("voxel resolution must be at least 8, got {}", config.voxel_resolution)
            })?;
            require(
                config.inner_face_ratio > 0.0 && config.inner_face_ratio <= 1.0,
                || format!("inner face ratio must lie in (0, 1], got {}", config.inner_face_ratio),
            )?;
            require(
                config.voxel_simplify_ratio > 0.0 && config.voxel_simplify_ratio <= 1.0,
                || format!("voxel simplify ratio must lie in (0, 1], got {}", config.voxel_simplify_ratio),
            )?;
        }

        match config.joint_type {
            JointType::Dowel => {
                require(
                    positive(config.dowel_diameter_mm) && positive(config.dowel_length_mm),
                    || "dowel diameter and length must be positive".to_string(),
                )?;
            },
            joint if joint.needs_pin_wall() => {
                require(
                    positive(config.pin_diameter_mm) && positive(config.pin_height_mm),
                    || "pin diameter and height must be positive".to_string(),
                )?;
                let required = config.pin_diameter_mm + PIN_WALL_MARGIN_MM;
                if config.wall_thickness_mm < required {
                    adjustments.push(ConfigAdjustment {
                        field: "wall_thickness".to_string(),
                        requested: config.wall_thickness_mm,
                        applied: required,
                        reason: format!(
                            "{joint} joints need pin diameter {:.2} mm + {PIN_WALL_MARGIN_MM:.0} mm",
                            config.pin_diameter_mm
                        ),
                    });
                    config.wall_thickness_mm = required;
                }
                require(
                    config.pin_diameter_mm <= config.wall_thickness_mm - PIN_WALL_MARGIN_MM,
                    || {
                        format!(
                            "pin diameter {} mm does not fit a {} mm wall",
                            config.pin_diameter_mm, config.wall_thickness_mm
                        )
                    },
                )?;
            },
            _ => {},
        }

        Ok(ValidatedConfig {
            config,
            adjustments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_unchanged() {
        let validated = SegmentationConfig::default().validate();
        assert!(validated.is_ok());
        assert!(validated.is_ok_and(|v| v.adjustments.is_empty()));
    }

    #[test]
    fn negative_wall_is_rejected() {
        let result = SegmentationConfig::default().with_wall_thickness(-1.0).validate();
        assert!(matches!(result, Err(SegmentationError::InvalidConfig(_))));
    }

    #[test]
    fn integrated_joint_raises_wall() {
        let config = SegmentationConfig {
            wall_thickness_mm: 5.0,
            pin_diameter_mm: 5.0,
            joint_type: JointType::Integrated,
            ..Default::default()
        };
        let validated = config.validate().unwrap();
        assert_eq!(validated.wall_thickness_mm, 7.0);
        assert_eq!(validated.adjustments.len(), 1);
        assert!(validated.adjustments[0].to_string().contains("7.00 mm"));
    }

    #[test]
    fn orientation_search() {
        let build = BuildVolume::new(100.0, 200.0, 50.0);
        assert!(build.fits(&Vector3::new(190.0, 40.0, 90.0)));
        assert!(!build.fits(&Vector3::new(190.0, 190.0, 10.0)));
        assert_eq!(build.exceeds_by(&Vector3::new(120.0, 10.0, 10.0)), [20.0, 0.0, 0.0]);
    }

    #[test]
    fn tags_parse_from_cli_spelling() {
        assert_eq!("surface-shell".parse(), Ok(HollowStrategy::SurfaceShell));
        assert_eq!("Dovetail".parse(), Ok(JointType::Dovetail));
        assert!("glue".parse::<JointType>().is_err());
        assert_eq!(JointType::Pyramid.to_string(), "pyramid");
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = SegmentationConfig::from_json(r#"{"joint_type": "pyramid", "beam_width": 5}"#).unwrap();
        assert_eq!(config.joint_type, JointType::Pyramid);
        assert_eq!(config.beam_width, 5);
        assert_eq!(config.max_depth, 10);
    }
}
