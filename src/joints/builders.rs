//! Joint geometry for each [`JointType`].
//!
//! Tools are modelled in a local frame with the cut face at `z = 0` and the
//! positive part above it, then placed with a [`JointFrame`].

use crate::config::{JointType, SegmentationConfig};
use crate::errors::BooleanError;
use crate::float_types::{EPSILON, PI, Real};
use crate::mesh::Mesh;
use crate::mesh::polygon::FaceTag;
use crate::traits::CSGOps;
use nalgebra::{Isometry3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};

/// Facets on round pins and holes.
const SEGMENTS: usize = 24;

/// Tools start this far behind the cut face so no tool face is coplanar with a cap.
pub const OVERLAP_MM: Real = 0.5;

/// Where a joint sits: a point on the cut face and the cut normal, which
/// points from the negative part into the positive part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointFrame {
    pub origin: Point3<Real>,
    pub axis: Vector3<Real>,
}

impl JointFrame {
    /// Local → world: `+Z` onto `axis`, the origin onto `origin`.
    pub fn to_world(&self) -> Matrix4<Real> {
        let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &self.axis)
            .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI));
        Isometry3::from_parts(Translation3::from(self.origin.coords), rotation).to_homogeneous()
    }

    /// Same frame looking the other way, for features pointing into the negative part.
    pub fn reversed(&self) -> Self {
        JointFrame {
            origin: self.origin,
            axis: -self.axis,
        }
    }

    pub fn place(&self, tool: &Mesh) -> Mesh {
        tool.transform(&self.to_world())
    }
}

/// Union `tool` into `target`; the gain must be positive and bounded by the tool.
pub fn add_feature(target: &Mesh, tool: &Mesh) -> Result<Mesh, BooleanError> {
    let before = target.volume();
    let result = target.union(tool);
    if result.is_empty() {
        return Err(BooleanError::EmptyResult);
    }
    check_change(result.volume() - before, tool.volume())?;
    Ok(result)
}

/// Subtract `tool` from `target`; the loss must be positive and bounded by the tool.
pub fn cut_feature(target: &Mesh, tool: &Mesh) -> Result<Mesh, BooleanError> {
    let before = target.volume();
    let result = target.difference(tool);
    if result.is_empty() {
        return Err(BooleanError::EmptyResult);
    }
    check_change(before - result.volume(), tool.volume())?;
    Ok(result)
}

fn check_change(actual: Real, tool_volume: Real) -> Result<(), BooleanError> {
    let slack = tool_volume * 1e-6 + EPSILON;
    if actual <= EPSILON || actual > tool_volume + slack {
        return Err(BooleanError::VolumeMismatch {
            expected: tool_volume,
            actual,
        });
    }
    Ok(())
}

/// Side length of a linear taper extended `OVERLAP_MM` below `z = 0`.
fn below_face(bottom: Real, top: Real, height: Real) -> Real {
    (bottom - (top - bottom) * OVERLAP_MM / height).max(EPSILON)
}

/// Builds the features for one joint type.
pub trait JointBuilder {
    fn joint_type(&self) -> JointType;

    /// Radius of the footprint the feature needs on both cut faces.
    fn footprint_radius(&self) -> Real;

    /// Diameter used to space additional anchors.
    fn spacing_diameter(&self) -> Real {
        2.0 * self.footprint_radius()
    }

    /// External part needed per joint, e.g. `dowel Ø6×20mm`.
    fn hardware(&self) -> Option<String> {
        None
    }

    /// Returns the modified `(negative, positive)` pair.
    fn apply(&self, negative: &Mesh, positive: &Mesh, frame: &JointFrame) -> Result<(Mesh, Mesh), BooleanError>;
}

/// Holes on both mating faces for a separately sourced dowel pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DowelJoint {
    pub diameter: Real,
    pub length: Real,
    pub tolerance: Real,
}

impl DowelJoint {
    fn hole(&self) -> Mesh {
        let depth = self.length * 0.5 + self.tolerance;
        Mesh::cylinder((self.diameter + self.tolerance) * 0.5, depth + OVERLAP_MM, SEGMENTS, FaceTag::Joint)
            .translate(0.0, 0.0, -OVERLAP_MM)
    }
}

impl JointBuilder for DowelJoint {
    fn joint_type(&self) -> JointType {
        JointType::Dowel
    }

    fn footprint_radius(&self) -> Real {
        (self.diameter + self.tolerance) * 0.5
    }

    fn spacing_diameter(&self) -> Real {
        self.diameter
    }

    fn hardware(&self) -> Option<String> {
        Some(format!("dowel Ø{}×{}mm", self.diameter, self.length))
    }

    fn apply(&self, negative: &Mesh, positive: &Mesh, frame: &JointFrame) -> Result<(Mesh, Mesh), BooleanError> {
        let hole = self.hole();
        let negative = cut_feature(negative, &frame.reversed().place(&hole))?;
        let positive = cut_feature(positive, &frame.place(&hole))?;
        Ok((negative, positive))
    }
}

/// A printed cylindrical pin on the negative part and a clearance hole opposite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegratedJoint {
    pub diameter: Real,
    pub height: Real,
    pub tolerance: Real,
}

impl JointBuilder for IntegratedJoint {
    fn joint_type(&self) -> JointType {
        JointType::Integrated
    }

    fn footprint_radius(&self) -> Real {
        (self.diameter + self.tolerance) * 0.5
    }

    fn spacing_diameter(&self) -> Real {
        self.diameter
    }

    fn apply(&self, negative: &Mesh, positive: &Mesh, frame: &JointFrame) -> Result<(Mesh, Mesh), BooleanError> {
        let pin = Mesh::cylinder(self.diameter * 0.5, self.height + OVERLAP_MM, SEGMENTS, FaceTag::Joint)
            .translate(0.0, 0.0, -OVERLAP_MM);
        let hole = Mesh::cylinder(
            (self.diameter + self.tolerance) * 0.5,
            self.height + self.tolerance + OVERLAP_MM,
            SEGMENTS,
            FaceTag::Joint,
        )
        .translate(0.0, 0.0, -OVERLAP_MM);

        let negative = add_feature(negative, &frame.place(&pin))?;
        let positive = cut_feature(positive, &frame.place(&hole))?;
        Ok((negative, positive))
    }
}

/// A square-frustum pin tapering to half its base, with a matching pocket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidJoint {
    pub base: Real,
    pub height: Real,
    pub tolerance: Real,
}

impl PyramidJoint {
    fn frustum(bottom: Real, top: Real, height: Real) -> Mesh {
        Mesh::square_frustum(below_face(bottom, top, height), top, height + OVERLAP_MM, FaceTag::Joint)
            .translate(0.0, 0.0, -OVERLAP_MM)
    }
}

impl JointBuilder for PyramidJoint {
    fn joint_type(&self) -> JointType {
        JointType::Pyramid
    }

    fn footprint_radius(&self) -> Real {
        (self.base + self.tolerance) * std::f64::consts::FRAC_1_SQRT_2
    }

    fn apply(&self, negative: &Mesh, positive: &Mesh, frame: &JointFrame) -> Result<(Mesh, Mesh), BooleanError> {
        let top = self.base * 0.5;
        let pin = Self::frustum(self.base, top, self.height);
        let pocket = Self::frustum(
            self.base + self.tolerance,
            top + self.tolerance,
            self.height + self.tolerance,
        );
        let negative = add_feature(negative, &frame.place(&pin))?;
        let positive = cut_feature(positive, &frame.place(&pocket))?;
        Ok((negative, positive))
    }
}

/// A trapezoid tenon narrowing towards its tip, pressed into a clearance
/// mortise. The taper lets the parts slide together along the cut normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DovetailJoint {
    pub width: Real,
    pub height: Real,
    pub tolerance: Real,
}

impl DovetailJoint {
    /// Tip width over face width.
    const TAPER: Real = 0.6;

    fn tenon(base: Real, tip: Real, height: Real, depth: Real) -> Mesh {
        Mesh::trapezoid_prism(below_face(base, tip, height), tip, height + OVERLAP_MM, depth, FaceTag::Joint)
            .translate(0.0, 0.0, -OVERLAP_MM)
    }
}

impl JointBuilder for DovetailJoint {
    fn joint_type(&self) -> JointType {
        JointType::Dovetail
    }

    fn footprint_radius(&self) -> Real {
        let w = self.width + self.tolerance;
        (w * w * 2.0).sqrt() * 0.5
    }

    fn apply(&self, negative: &Mesh, positive: &Mesh, frame: &JointFrame) -> Result<(Mesh, Mesh), BooleanError> {
        let tenon = Self::tenon(self.width, self.width * Self::TAPER, self.height, self.width);
        let mortise = Self::tenon(
            self.width + self.tolerance,
            self.width * Self::TAPER + self.tolerance,
            self.height + self.tolerance,
            self.width + self.tolerance,
        );
        let negative = add_feature(negative, &frame.place(&tenon))?;
        let positive = cut_feature(positive, &frame.place(&mortise))?;
        Ok((negative, positive))
    }
}

/// Glue only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoJoint;

impl JointBuilder for NoJoint {
    fn joint_type(&self) -> JointType {
        JointType::None
    }

    fn footprint_radius(&self) -> Real {
        0.0
    }

    fn apply(&self, negative: &Mesh, positive: &Mesh, _frame: &JointFrame) -> Result<(Mesh, Mesh), BooleanError> {
        Ok((negative.clone(), positive.clone()))
    }
}

pub fn joint_builder_for(config: &SegmentationConfig) -> Box<dyn JointBuilder + Send + Sync> {
    let tolerance = config.joint_tolerance_mm;
    match config.joint_type {
        JointType::Dowel => Box::new(DowelJoint {
            diameter: config.dowel_diameter_mm,
            length: config.dowel_length_mm,
            tolerance,
        }),
        JointType::Integrated => Box::new(IntegratedJoint {
            diameter: config.pin_diameter_mm,
            height: config.pin_height_mm,
            tolerance,
        }),
        JointType::Pyramid => Box::new(PyramidJoint {
            base: config.pin_diameter_mm,
            height: config.pin_height_mm,
            tolerance,
        }),
        JointType::Dovetail => Box::new(DovetailJoint {
            width: config.pin_diameter_mm,
            height: config.pin_height_mm,
            tolerance,
        }),
        JointType::None => Box::new(NoJoint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn halves() -> (Mesh, Mesh, JointFrame) {
        let lower = Mesh::cuboid(40.0, 40.0, 30.0, FaceTag::Surface);
        let upper = lower.translate(0.0, 0.0, 30.0);
        let frame = JointFrame {
            origin: Point3::new(20.0, 20.0, 30.0),
            axis: Vector3::z(),
        };
        (lower, upper, frame)
    }

    #[test]
    fn frame_maps_z_onto_axis() {
        let frame = JointFrame {
            origin: Point3::new(1.0, 2.0, 3.0),
            axis: -Vector3::x(),
        };
        let tip = frame.to_world().transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(tip, Point3::new(-4.0, 2.0, 3.0), epsilon = 1e-9);
        let down = frame.reversed().to_world().transform_point(&Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(down, Point3::new(2.0, 2.0, 3.0), epsilon = 1e-9);
    }

    #[test]
    fn integrated_pin_and_hole() {
        let (lower, upper, frame) = halves();
        let joint = IntegratedJoint {
            diameter: 5.0,
            height: 8.0,
            tolerance: 0.2,
        };
        let (with_pin, with_hole) = joint.apply(&lower, &upper, &frame).unwrap();
        assert!(with_pin.volume() > lower.volume());
        assert!(with_hole.volume() < upper.volume());
        assert!(with_pin.bounding_box().maxs.z > 37.9);
        assert!(with_pin.polygons.iter().any(|p| p.tag == FaceTag::Joint));
        // Clearance: the hole removes more than the pin adds.
        let added = with_pin.volume() - lower.volume();
        let removed = upper.volume() - with_hole.volume();
        assert!(removed > added);
    }

    #[test]
    fn dowel_drills_both_sides() {
        let (lower, upper, frame) = halves();
        let joint = DowelJoint {
            diameter: 6.0,
            length: 20.0,
            tolerance: 0.2,
        };
        let (a, b) = joint.apply(&lower, &upper, &frame).unwrap();
        assert!(a.volume() < lower.volume());
        assert!(b.volume() < upper.volume());
        assert_eq!(joint.hardware().as_deref(), Some("dowel Ø6×20mm"));
    }

    #[test]
    fn feature_outside_target_is_rejected() {
        let (lower, _, _) = halves();
        let far = Mesh::cube(5.0, FaceTag::Joint).translate(100.0, 0.0, 0.0);
        assert!(matches!(
            cut_feature(&lower, &far),
            Err(BooleanError::VolumeMismatch { .. })
        ));
    }

    #[test]
    fn dovetail_slides_in_along_the_cut_normal() {
        let (lower, upper, frame) = halves();
        let joint = DovetailJoint {
            width: 10.0,
            height: 8.0,
            tolerance: 0.2,
        };
        let (with_tenon, with_mortise) = joint.apply(&lower, &upper, &frame).unwrap();
        let tenon_volume = with_tenon.volume() - lower.volume();
        assert!(tenon_volume > 0.0);
        // Anywhere on the way in, the tenon overlaps no material of the other part.
        for gap in [1.0, 3.0, 6.0] {
            let approaching = with_tenon.translate(0.0, 0.0, -gap);
            let overlap = approaching.intersection(&with_mortise).volume();
            assert!(overlap < tenon_volume * 1e-3, "gap {gap}: overlap {overlap}");
        }
    }

    #[test]
    fn self_aligning_joints_need_no_hardware() {
        let config = SegmentationConfig::default().with_joint(JointType::Pyramid);
        let builder = joint_builder_for(&config);
        assert_eq!(builder.joint_type(), JointType::Pyramid);
        assert!(builder.hardware().is_none());
    }
}
