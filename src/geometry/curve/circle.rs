use std::f64::consts::TAU;

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A full circle in 3D space.
///
/// Defined by a center, radius, normal axis, and a reference direction
/// for the zero-angle. The parameter is the angle in radians; the curve is
/// periodic with period `2*pi`.
///
/// `P(t) = center + radius * cos(t) * ref_dir + radius * sin(t) * binormal`
/// where `binormal = normal x ref_dir`.
#[derive(Debug, Clone)]
pub struct Circle {
    center: Point3,
    radius: f64,
    normal: Vector3,
    ref_dir: Vector3,
}

impl Circle {
    /// Creates a new circle.
    ///
    /// # Arguments
    ///
    /// * `center` - Center of the circle
    /// * `radius` - Radius (must be positive)
    /// * `normal` - Normal vector defining the circle plane
    /// * `ref_dir` - Reference direction for angle = 0 (must be perpendicular to normal)
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, the normal is zero-length,
    /// or the reference direction is not perpendicular to the normal.
    pub fn new(center: Point3, radius: f64, normal: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(GeometryError::Degenerate("circle radius must be positive".into()).into());
        }

        let normal_len = normal.norm();
        if normal_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / normal_len;

        let ref_len = ref_dir.norm();
        if ref_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let ref_dir = ref_dir / ref_len;

        if normal.dot(&ref_dir).abs() > 1e-9 {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to normal".into(),
            )
            .into());
        }

        Ok(Self {
            center,
            radius,
            normal,
            ref_dir,
        })
    }

    /// Returns the center of the circle.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius of the circle.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns the normal vector of the circle plane.
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Returns the reference direction (t=0 direction).
    #[must_use]
    pub fn ref_dir(&self) -> &Vector3 {
        &self.ref_dir
    }

    /// Computes the binormal direction (`normal x ref_dir`).
    #[must_use]
    pub fn binormal(&self) -> Vector3 {
        self.normal.cross(&self.ref_dir)
    }

    /// Angle of `point` around the circle axis, in `(-pi, pi]`.
    #[must_use]
    pub fn angle_of(&self, point: &Point3) -> f64 {
        let d = point - self.center;
        d.dot(&self.binormal()).atan2(d.dot(&self.ref_dir))
    }
}

impl Curve for Circle {
    fn evaluate(&self, t: f64) -> Point3 {
        let x = self.radius * t.cos();
        let y = self.radius * t.sin();
        self.center + self.ref_dir * x + self.binormal() * y
    }

    fn derivative(&self, t: f64) -> Vector3 {
        let dx = -self.radius * t.sin();
        let dy = self.radius * t.cos();
        self.ref_dir * dx + self.binormal() * dy
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(0.0, TAU)
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn project(&self, point: &Point3, t_min: f64, t_max: f64) -> (f64, f64) {
        let angle = t_min + (self.angle_of(point) - t_min).rem_euclid(TAU);
        if angle <= t_max {
            return (angle, (point - self.evaluate(angle)).norm());
        }
        let d_min = (point - self.evaluate(t_min)).norm();
        let d_max = (point - self.evaluate(t_max)).norm();
        if d_min <= d_max {
            (t_min, d_min)
        } else {
            (t_max, d_max)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn xy_circle(radius: f64) -> Circle {
        Circle::new(Point3::origin(), radius, Vector3::z(), Vector3::x()).unwrap()
    }

    #[test]
    fn evaluate_at_pi_over_2() {
        let c = xy_circle(3.0);
        let p = c.evaluate(FRAC_PI_2);
        assert!((p - Point3::new(0.0, 3.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn tangent_at_zero() {
        let c = xy_circle(1.0);
        let t = c.tangent(0.0).unwrap();
        // counter-clockwise around +Z
        assert!((t - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn projection_wraps_into_range() {
        let c = xy_circle(1.0);
        // angle -pi/2 is 3pi/2 inside [pi, 2pi]
        let (t, d) = c.project(&Point3::new(0.0, -2.0, 0.0), PI, TAU);
        assert!((t - 1.5 * PI).abs() < 1e-12, "t = {t}");
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn projection_outside_arc_snaps_to_nearest_end() {
        let c = xy_circle(1.0);
        let (t, _) = c.project(&Point3::new(0.1, -1.0, 0.0), 0.0, PI);
        assert!(t.abs() < 1e-12, "t = {t}");
    }

    #[test]
    fn offset_center() {
        let c = Circle::new(Point3::new(1.0, 2.0, 3.0), 1.0, Vector3::z(), Vector3::x()).unwrap();
        assert!((c.evaluate(0.0) - Point3::new(2.0, 2.0, 3.0)).norm() < TOLERANCE);
        assert!(c.is_closed());
    }

    #[test]
    fn invalid_circles() {
        assert!(Circle::new(Point3::origin(), 0.0, Vector3::z(), Vector3::x()).is_err());
        assert!(Circle::new(
            Point3::origin(),
            1.0,
            Vector3::z(),
            Vector3::new(1.0, 0.0, 1.0)
        )
        .is_err());
    }
}
