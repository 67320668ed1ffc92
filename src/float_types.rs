// Scalar type and tolerances shared by every geometry routine in the crate.
pub use parry3d_f64 as parry3d;

/// Our Real scalar type. Models are measured in millimetres.
pub type Real = f64;

/// Classification epsilon used by plane/point orientation tests.
pub const EPSILON: Real = 1e-5;

use core::str::FromStr;
use std::sync::OnceLock;

/// Lazily-initialized tolerance used when comparing measured dimensions.
/// Defaults to `1e-6`, but can be overridden:
///  1) **Build-time**: set env var `MESHCUT_TOLERANCE` (e.g. `MESHCUT_TOLERANCE=1e-4 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-6
}

/// Returns the current tolerance value.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("MESHCUT_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Archimedes' constant (π)
pub const PI: Real = core::f64::consts::PI;
/// π/2
pub const FRAC_PI_2: Real = core::f64::consts::FRAC_PI_2;
/// The full circle constant (τ)
pub const TAU: Real = core::f64::consts::TAU;

// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// Unit conversion
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
pub const MM: Real = 1.0;
pub const CM: Real = 10.0;
pub const INCH: Real = 25.4;
