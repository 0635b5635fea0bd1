use crate::geometry::curve::Circle;
use crate::geometry::surface::{Cylinder, Plane};

use super::{Point3, Vector3, TOLERANCE};

/// Relationship between two planes.
#[derive(Debug)]
pub enum PlanePairRelation {
    /// Planes intersect along a line.
    IntersectionLine {
        origin: Point3,
        direction: Vector3,
    },
    /// Planes are parallel but not coincident.
    Parallel { distance: f64 },
    /// Planes are the same (coincident).
    Coincident,
}

/// Computes the intersection of two planes.
///
/// Planes whose normals are parallel and whose separation is below `tol`
/// are reported as [`Coincident`](PlanePairRelation::Coincident).
#[must_use]
pub fn plane_plane_intersect(a: &Plane, b: &Plane, tol: f64) -> PlanePairRelation {
    let na = a.plane_normal();
    let nb = b.plane_normal();

    let dir = na.cross(nb);
    let dir_len = dir.norm();

    if dir_len < super::tolerance::ANGULAR {
        let dist = (b.origin() - a.origin()).dot(na).abs();
        if dist <= tol {
            PlanePairRelation::Coincident
        } else {
            PlanePairRelation::Parallel { distance: dist }
        }
    } else {
        let dir = dir / dir_len;

        // p = oa + s * na + t * nb lies on both planes when
        //   s + t * (na.nb) = 0 and s * (na.nb) + t = nb.(ob - oa)
        let d2 = nb.dot(&(b.origin() - a.origin()));
        let dot_nn = na.dot(nb);
        let denom = 1.0 - dot_nn * dot_nn;
        let s = -dot_nn * d2 / denom;
        let t = d2 / denom;
        let origin = a.origin() + na * s + nb * t;

        PlanePairRelation::IntersectionLine {
            origin,
            direction: dir,
        }
    }
}

/// Relationship of a line with a plane.
#[derive(Debug)]
pub enum LinePlaneRelation {
    /// Line intersects the plane at a single point.
    Point { point: Point3, t: f64 },
    /// Line is parallel to the plane (does not intersect).
    Parallel,
    /// Line lies entirely on the plane.
    OnPlane,
}

/// Computes the intersection of a line `origin + t * dir` with a plane.
#[must_use]
pub fn line_plane_intersect(
    origin: &Point3,
    dir: &Vector3,
    plane: &Plane,
    tol: f64,
) -> LinePlaneRelation {
    let normal = plane.plane_normal();
    let denom = normal.dot(dir);
    let numer = normal.dot(&(plane.origin() - origin));

    if denom.abs() < TOLERANCE {
        if numer.abs() <= tol {
            LinePlaneRelation::OnPlane
        } else {
            LinePlaneRelation::Parallel
        }
    } else {
        let t = numer / denom;
        let point = origin + dir * t;
        LinePlaneRelation::Point { point, t }
    }
}

/// Parameters where the line `origin + t * dir` crosses a cylinder, sorted.
///
/// A line parallel to the axis yields no crossings; a tangent line yields
/// a single parameter.
#[must_use]
pub fn line_cylinder_intersect(origin: &Point3, dir: &Vector3, cylinder: &Cylinder) -> Vec<f64> {
    let axis = cylinder.axis();
    let w = origin - cylinder.center();
    let w_perp = w - axis * w.dot(axis);
    let d_perp = dir - axis * dir.dot(axis);

    let a = d_perp.norm_squared();
    if a < TOLERANCE * TOLERANCE {
        return Vec::new();
    }
    let b = 2.0 * w_perp.dot(&d_perp);
    let c = w_perp.norm_squared() - cylinder.radius() * cylinder.radius();
    let disc = b * b - 4.0 * a * c;
    if disc < -TOLERANCE {
        return Vec::new();
    }
    if disc <= TOLERANCE {
        return vec![-b / (2.0 * a)];
    }
    let root = disc.sqrt();
    vec![(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
}

/// Parameters `(s, t)` of the mutually closest points of two lines
/// `o1 + s * d1` and `o2 + t * d2`, or `None` when they are parallel.
#[must_use]
pub fn line_line_closest(
    o1: &Point3,
    d1: &Vector3,
    o2: &Point3,
    d2: &Vector3,
) -> Option<(f64, f64)> {
    let w = o1 - o2;
    let a = d1.dot(d1);
    let b = d1.dot(d2);
    let c = d2.dot(d2);
    let d = d1.dot(&w);
    let e = d2.dot(&w);
    let denom = a * c - b * b;
    if denom.abs() <= TOLERANCE * a.max(c).max(1.0) {
        return None;
    }
    let s = (b * e - c * d) / denom;
    let t = (a * e - b * d) / denom;
    Some((s, t))
}

/// Relationship of a circle with a plane.
#[derive(Debug)]
pub enum CirclePlaneRelation {
    /// Angles (in `[0, 2pi)`) where the circle crosses the plane.
    Angles(Vec<f64>),
    /// Circle lies in a plane parallel to the given one.
    Parallel,
    /// Circle lies in the plane.
    OnPlane,
}

/// Computes where a circle crosses a plane.
#[must_use]
pub fn circle_plane_intersect(circle: &Circle, plane: &Plane, tol: f64) -> CirclePlaneRelation {
    let n = plane.plane_normal();
    let e1 = circle.ref_dir();
    let e2 = circle.normal().cross(e1);
    let k = n.dot(&(circle.center() - plane.origin()));
    let a = circle.radius() * n.dot(e1);
    let b = circle.radius() * n.dot(&e2);
    let amplitude = a.hypot(b);

    if amplitude <= tol {
        return if k.abs() <= tol {
            CirclePlaneRelation::OnPlane
        } else {
            CirclePlaneRelation::Parallel
        };
    }

    // a cos t + b sin t = R cos(t - phi) = -k
    let c = -k / amplitude;
    if c.abs() > 1.0 + TOLERANCE {
        return CirclePlaneRelation::Angles(Vec::new());
    }
    let phi = b.atan2(a);
    let delta = c.clamp(-1.0, 1.0).acos();
    let wrap = |t: f64| t.rem_euclid(std::f64::consts::TAU);
    if delta < TOLERANCE {
        CirclePlaneRelation::Angles(vec![wrap(phi)])
    } else {
        CirclePlaneRelation::Angles(vec![wrap(phi - delta), wrap(phi + delta)])
    }
}

/// Signed distance from a point to a plane.
/// Positive = on the normal side, negative = opposite.
#[must_use]
pub fn signed_distance_to_plane(point: &Point3, plane: &Plane) -> f64 {
    plane.plane_normal().dot(&(point - plane.origin()))
}
