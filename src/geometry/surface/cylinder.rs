use std::f64::consts::{PI, TAU};

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceDomain};

/// A cylindrical surface in 3D space.
///
/// Defined by a center point on the axis, radius, axis direction, and
/// a reference direction for u=0.
///
/// `P(u, v) = center + radius * cos(u) * ref_dir + radius * sin(u) * binormal + v * axis`
/// where `binormal = axis x ref_dir`.
///
/// The outward normal is `cos(u) * ref_dir + sin(u) * binormal`.
#[derive(Debug, Clone)]
pub struct Cylinder {
    center: Point3,
    radius: f64,
    axis: Vector3,
    ref_dir: Vector3,
}

impl Cylinder {
    /// Creates a new cylinder.
    ///
    /// # Arguments
    ///
    /// * `center` - A point on the cylinder axis
    /// * `radius` - Radius (must be positive)
    /// * `axis` - Axis direction (will be normalized)
    /// * `ref_dir` - Reference direction for u=0 (must be perpendicular to axis)
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, axis is zero-length,
    /// or the reference direction is not perpendicular to the axis.
    pub fn new(center: Point3, radius: f64, axis: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(GeometryError::Degenerate("cylinder radius must be positive".into()).into());
        }

        let axis_len = axis.norm();
        if axis_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let axis = axis / axis_len;

        let ref_len = ref_dir.norm();
        if ref_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let ref_dir = ref_dir / ref_len;

        if axis.dot(&ref_dir).abs() > 1e-9 {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to axis".into(),
            )
            .into());
        }

        Ok(Self {
            center,
            radius,
            axis,
            ref_dir,
        })
    }

    /// Returns the center point on the axis.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns the axis direction (unit vector).
    #[must_use]
    pub fn axis(&self) -> &Vector3 {
        &self.axis
    }

    /// Returns the reference direction (u=0).
    #[must_use]
    pub fn ref_dir(&self) -> &Vector3 {
        &self.ref_dir
    }

    /// Computes the binormal direction (`axis x ref_dir`).
    #[must_use]
    pub fn binormal(&self) -> Vector3 {
        self.axis.cross(&self.ref_dir)
    }

    /// Component of `point - center` perpendicular to the axis.
    fn radial(&self, point: &Point3) -> Vector3 {
        let d = point - self.center;
        d - self.axis * d.dot(&self.axis)
    }

    /// Parameters of `point` with `u` chosen in `(u_ref - pi, u_ref + pi]`.
    ///
    /// Faces on a cylinder span less than a full turn, so picking `u_ref`
    /// inside the face gives a continuous parameterization over it.
    #[must_use]
    pub fn project_near(&self, point: &Point3, u_ref: f64) -> (f64, f64) {
        let (u, v) = self.project(point);
        let shifted = u_ref - PI + (u - (u_ref - PI)).rem_euclid(TAU);
        let u = if shifted <= u_ref - PI { shifted + TAU } else { shifted };
        (u, v)
    }
}

impl Surface for Cylinder {
    fn evaluate(&self, u: f64, v: f64) -> Point3 {
        let x = self.radius * u.cos();
        let y = self.radius * u.sin();
        self.center + self.ref_dir * x + self.binormal() * y + self.axis * v
    }

    fn derivatives(&self, u: f64, _v: f64) -> (Vector3, Vector3) {
        let du = (self.binormal() * u.cos() - self.ref_dir * u.sin()) * self.radius;
        (du, self.axis)
    }

    fn normal(&self, u: f64, _v: f64) -> Vector3 {
        self.ref_dir * u.cos() + self.binormal() * u.sin()
    }

    fn domain(&self) -> SurfaceDomain {
        SurfaceDomain::new(0.0, TAU, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// `u` is the atan2 angle in `(-pi, pi]`, `v` the axial coordinate.
    fn project(&self, point: &Point3) -> (f64, f64) {
        let dp = point - self.center;
        let v = dp.dot(&self.axis);
        let u = dp.dot(&self.binormal()).atan2(dp.dot(&self.ref_dir));
        (u, v)
    }

    fn signed_distance(&self, point: &Point3) -> f64 {
        self.radial(point).norm() - self.radius
    }

    fn gradient(&self, point: &Point3) -> Vector3 {
        let r = self.radial(point);
        let len = r.norm();
        if len < TOLERANCE {
            self.ref_dir
        } else {
            r / len
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn z_cylinder(radius: f64) -> Cylinder {
        Cylinder::new(p(0.0, 0.0, 0.0), radius, Vector3::z(), Vector3::x()).unwrap()
    }

    #[test]
    fn normal_is_outward_and_matches_derivatives() {
        let cyl = z_cylinder(2.0);
        for u in [0.0, 1.0, 2.5, 4.0] {
            let (du, dv) = cyl.derivatives(u, 0.3);
            let n = cyl.normal(u, 0.3);
            assert!((du.cross(&dv).normalize() - n).norm() < 1e-12);
            let pt = cyl.evaluate(u, 0.3);
            assert!((cyl.gradient(&pt) - n).norm() < 1e-12);
        }
    }

    #[test]
    fn signed_distance_is_radial() {
        let cyl = z_cylinder(1.0);
        assert!((cyl.signed_distance(&p(3.0, 0.0, 7.0)) - 2.0).abs() < 1e-12);
        assert!((cyl.signed_distance(&p(0.0, 0.5, -1.0)) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn project_near_unwraps_around_reference() {
        let cyl = z_cylinder(1.0);
        let pt = cyl.evaluate(1.5 * PI, 2.0);
        let (u, v) = cyl.project_near(&pt, 1.5 * PI);
        assert!((u - 1.5 * PI).abs() < 1e-12, "u = {u}");
        assert!((v - 2.0).abs() < 1e-12);
        let (u, _) = cyl.project_near(&cyl.evaluate(0.1, 0.0), 1.5 * PI);
        assert!((u - (TAU + 0.1)).abs() < 1e-12, "u = {u}");
    }
}
