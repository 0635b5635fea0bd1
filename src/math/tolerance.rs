//! Coincidence tests shared by every stage of the Boolean pipeline.
//!
//! Each topological entity carries its own tolerance. Two entities are
//! considered coincident when their distance does not exceed the sum of
//! both tolerances plus the operation's fuzzy value.

use super::{Point3, Vector3, TOLERANCE};

/// Default tolerance assigned to newly created vertices, edges and faces.
pub const CONFUSION: f64 = 1e-7;

/// Angular tolerance (radians) for parallelism tests.
pub const ANGULAR: f64 = 1e-9;

/// Combined tolerance of two entities under a fuzzy value.
#[must_use]
pub fn combined(tol_a: f64, tol_b: f64, fuzzy: f64) -> f64 {
    tol_a + tol_b + fuzzy
}

/// Returns `true` if the two points are within `tol` of each other.
#[must_use]
pub fn points_coincide(a: &Point3, b: &Point3, tol: f64) -> bool {
    (a - b).norm_squared() <= tol * tol
}

/// Returns `true` if two directions are parallel or anti-parallel.
#[must_use]
pub fn is_parallel(a: &Vector3, b: &Vector3) -> bool {
    let (la, lb) = (a.norm(), b.norm());
    if la < TOLERANCE || lb < TOLERANCE {
        return false;
    }
    a.cross(b).norm() / (la * lb) <= ANGULAR.max(1e-12)
}

/// Returns `true` if two directions are perpendicular.
#[must_use]
pub fn is_perpendicular(a: &Vector3, b: &Vector3) -> bool {
    let (la, lb) = (a.norm(), b.norm());
    if la < TOLERANCE || lb < TOLERANCE {
        return false;
    }
    (a.dot(b) / (la * lb)).abs() <= ANGULAR.max(1e-12)
}

/// Length tolerance converted to a parameter tolerance for a curve moving
/// at `speed` length units per parameter unit.
#[must_use]
pub fn parametric(tol: f64, speed: f64) -> f64 {
    if speed < TOLERANCE {
        tol
    } else {
        tol / speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_adds_fuzzy() {
        assert!((combined(1e-7, 2e-7, 1e-6) - 1.3e-6).abs() < 1e-15);
    }

    #[test]
    fn coincidence_is_inclusive() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1e-7, 0.0, 0.0);
        assert!(points_coincide(&a, &b, 1e-7 + 1e-15));
        assert!(!points_coincide(&a, &b, 5e-8));
    }

    #[test]
    fn parallel_and_antiparallel() {
        assert!(is_parallel(&Vector3::x(), &(-Vector3::x() * 3.0)));
        assert!(!is_parallel(&Vector3::x(), &Vector3::new(1.0, 1e-3, 0.0)));
        assert!(is_perpendicular(&Vector3::x(), &Vector3::z()));
    }
}
