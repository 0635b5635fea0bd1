mod circle;
mod line;
mod polyline;

pub use circle::Circle;
pub use line::Line;
pub use polyline::Polyline;

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

/// Parameter domain for a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveDomain {
    /// Start of the parameter range.
    pub t_min: f64,
    /// End of the parameter range.
    pub t_max: f64,
}

impl CurveDomain {
    /// Creates a new curve domain.
    #[must_use]
    pub fn new(t_min: f64, t_max: f64) -> Self {
        Self { t_min, t_max }
    }
}

/// Trait for parametric curves in 3D space.
///
/// Every curve in this crate is defined for all real parameters; closed
/// curves repeat with their period.
pub trait Curve {
    /// Evaluates the curve at parameter `t`.
    fn evaluate(&self, t: f64) -> Point3;

    /// First derivative with respect to `t`.
    fn derivative(&self, t: f64) -> Vector3;

    /// Returns the natural parameter domain of the curve.
    fn domain(&self) -> CurveDomain;

    /// Returns whether the curve is closed (periodic).
    fn is_closed(&self) -> bool;

    /// Closest parameter to `point` within `[t_min, t_max]` and its distance.
    fn project(&self, point: &Point3, t_min: f64, t_max: f64) -> (f64, f64);

    /// Computes the unit tangent vector at parameter `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if the derivative vanishes at `t`.
    fn tangent(&self, t: f64) -> Result<Vector3> {
        let d = self.derivative(t);
        let len = d.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(d / len)
    }
}
