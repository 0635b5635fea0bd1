mod cylinder;
mod plane;

pub use cylinder::Cylinder;
pub use plane::Plane;

use crate::math::{Point3, Vector3};

/// Parameter domain for a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDomain {
    /// Start of the U parameter range.
    pub u_min: f64,
    /// End of the U parameter range.
    pub u_max: f64,
    /// Start of the V parameter range.
    pub v_min: f64,
    /// End of the V parameter range.
    pub v_max: f64,
}

impl SurfaceDomain {
    /// Creates a new surface domain.
    #[must_use]
    pub fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }
}

/// Trait for parametric surfaces in 3D space.
///
/// Surfaces are also implicit: [`signed_distance`](Surface::signed_distance)
/// is positive on the side the normal points to.
pub trait Surface {
    /// Evaluates the surface at parameters `(u, v)`.
    fn evaluate(&self, u: f64, v: f64) -> Point3;

    /// Partial derivatives `(dP/du, dP/dv)`.
    fn derivatives(&self, u: f64, v: f64) -> (Vector3, Vector3);

    /// Unit normal `dP/du x dP/dv` at `(u, v)`.
    fn normal(&self, u: f64, v: f64) -> Vector3;

    /// Returns the parameter domain of the surface.
    fn domain(&self) -> SurfaceDomain;

    /// Parameters of the closest surface point to `point`.
    fn project(&self, point: &Point3) -> (f64, f64);

    /// Signed distance from `point` to the surface.
    fn signed_distance(&self, point: &Point3) -> f64;

    /// Unit gradient of [`signed_distance`](Surface::signed_distance) at `point`.
    fn gradient(&self, point: &Point3) -> Vector3;
}
