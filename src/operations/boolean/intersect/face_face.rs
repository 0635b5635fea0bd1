use std::f64::consts::TAU;

use crate::geometry::curve::{Circle, Line};
use crate::geometry::surface::{Cylinder, Plane};
use crate::math::aabb::Aabb;
use crate::math::intersect_3d::{plane_plane_intersect, PlanePairRelation};
use crate::math::tolerance::{is_parallel, is_perpendicular};
use crate::math::{Point3, Vector3};
use crate::topology::{EdgeCurve, FaceData, FaceSurface};

use super::marching::march;
use super::{Issue, Outcome};

/// Untrimmed piece of a surface/surface intersection, limited to the
/// common box of the two faces.
#[derive(Debug, Clone)]
pub(crate) struct SectionGeom {
    pub curve: EdgeCurve,
    pub t_start: f64,
    pub t_end: f64,
    pub tolerance: f64,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum FaceFace {
    /// Both faces lie on one surface.
    SameDomain,
    Curves(Outcome<SectionGeom>),
}

/// Intersects the surfaces of two faces inside `bbox`.
#[must_use]
pub(crate) fn face_face(fa: &FaceData, fb: &FaceData, bbox: &Aabb, tol: f64, max_iterations: usize) -> FaceFace {
    if fa.surface.same_domain(&fb.surface, tol) {
        return FaceFace::SameDomain;
    }
    let bbox = bbox.enlarged(tol);
    let out = match (&fa.surface, &fb.surface) {
        (FaceSurface::Plane(a), FaceSurface::Plane(b)) => plane_plane(a, b, &bbox, tol),
        (FaceSurface::Plane(p), FaceSurface::Cylinder(c)) | (FaceSurface::Cylinder(c), FaceSurface::Plane(p)) => {
            plane_cylinder(p, c, &fa.surface, &fb.surface, &bbox, tol, max_iterations)
        }
        (FaceSurface::Cylinder(a), FaceSurface::Cylinder(b)) => {
            if is_parallel(a.axis(), b.axis()) {
                parallel_cylinders(a, b, &bbox, tol)
            } else {
                march(&fa.surface, &fb.surface, &bbox, tol, max_iterations)
            }
        }
    };
    FaceFace::Curves(out)
}

fn plane_plane(a: &Plane, b: &Plane, bbox: &Aabb, tol: f64) -> Outcome<SectionGeom> {
    let mut out = Outcome::default();
    match plane_plane_intersect(a, b, tol) {
        PlanePairRelation::IntersectionLine { origin, direction } => {
            out.hits.extend(clipped_line(&origin, &direction, bbox, tol));
        }
        // same_domain has already caught coincident planes
        PlanePairRelation::Parallel { .. } | PlanePairRelation::Coincident => {}
    }
    out
}

fn plane_cylinder(
    plane: &Plane,
    cyl: &Cylinder,
    sa: &FaceSurface,
    sb: &FaceSurface,
    bbox: &Aabb,
    tol: f64,
    max_iterations: usize,
) -> Outcome<SectionGeom> {
    let n = plane.plane_normal();
    let axis = cyl.axis();
    let r = cyl.radius();

    if is_parallel(axis, n) {
        let mut out = Outcome::default();
        let h = n.dot(&(plane.origin() - cyl.center())) / n.dot(axis);
        let center = cyl.center() + axis * h;
        let reach = Aabb::from_points(&[center]).enlarged(r);
        if !reach.overlaps(bbox) {
            return out;
        }
        if let Ok(circle) = Circle::new(center, r, *axis, *cyl.ref_dir()) {
            out.hits.push(SectionGeom {
                curve: EdgeCurve::Circle(circle),
                t_start: 0.0,
                t_end: TAU,
                tolerance: tol,
                closed: true,
            });
        }
        return out;
    }

    if is_perpendicular(axis, n) {
        let mut out = Outcome::default();
        let d = n.dot(&(cyl.center() - plane.origin()));
        if d.abs() > r + tol {
            return out;
        }
        let foot = cyl.center() - n * d;
        let across = axis.cross(n);
        let half = (r * r - d * d).max(0.0).sqrt();
        if half <= tol {
            out.issues
                .push(Issue::Degenerate("plane tangent to cylinder".into()));
            out.hits.extend(clipped_line(&foot, axis, bbox, tol));
            return out;
        }
        for side in [1.0, -1.0] {
            let origin = foot + across * (side * half);
            out.hits.extend(clipped_line(&origin, axis, bbox, tol));
        }
        return out;
    }

    march(sa, sb, bbox, tol, max_iterations)
}

/// Generator lines shared by two cylinders with parallel axes.
fn parallel_cylinders(a: &Cylinder, b: &Cylinder, bbox: &Aabb, tol: f64) -> Outcome<SectionGeom> {
    let mut out = Outcome::default();
    let axis = a.axis();
    let d = b.center() - a.center();
    let d = d - axis * d.dot(axis);
    let dist = d.norm();
    let (ra, rb) = (a.radius(), b.radius());
    if dist > ra + rb + tol || dist < (ra - rb).abs() - tol || dist <= tol {
        return out;
    }

    // circle/circle in the plane across the axes
    let along = (dist * dist + ra * ra - rb * rb) / (2.0 * dist);
    let half = (ra * ra - along * along).max(0.0).sqrt();
    let ux = d / dist;
    let uy = axis.cross(&ux);
    let mid = a.center() + ux * along;
    let feet: Vec<Point3> = if half <= tol {
        out.issues
            .push(Issue::Degenerate("cylinders touch along a line".into()));
        vec![mid]
    } else {
        vec![mid + uy * half, mid - uy * half]
    };
    for foot in feet {
        out.hits.extend(clipped_line(&foot, axis, bbox, tol));
    }
    out
}

/// Infinite line `origin + t * dir` cut to the part inside `bbox`.
fn clipped_line(origin: &Point3, dir: &Vector3, bbox: &Aabb, tol: f64) -> Option<SectionGeom> {
    let (t0, t1) = bbox.clip_line(origin, dir)?;
    if t1 - t0 <= tol {
        return None;
    }
    let line = Line::new(*origin, *dir).ok()?;
    Some(SectionGeom {
        curve: EdgeCurve::Line(line),
        t_start: t0,
        t_end: t1,
        tolerance: tol,
        closed: false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::{FaceData, WireId};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn face(surface: FaceSurface) -> FaceData {
        FaceData::new(surface, WireId::default(), Vec::new(), true)
    }

    fn unit_box() -> Aabb {
        Aabb::from_points(&[p(-1.0, -1.0, -1.0), p(1.0, 1.0, 1.0)])
    }

    fn curves(ff: FaceFace) -> Outcome<SectionGeom> {
        match ff {
            FaceFace::Curves(out) => out,
            FaceFace::SameDomain => panic!("unexpected same domain"),
        }
    }

    #[test]
    fn crossing_planes_give_a_clipped_line() {
        let a = face(FaceSurface::Plane(Plane::from_normal(p(0.0, 0.0, 0.0), Vector3::z()).unwrap()));
        let b = face(FaceSurface::Plane(Plane::from_normal(p(0.0, 0.0, 0.0), Vector3::x()).unwrap()));
        let out = curves(face_face(&a, &b, &unit_box(), 1e-7, 32));
        assert_eq!(out.hits.len(), 1);
        let g = &out.hits[0];
        assert!((g.t_end - g.t_start - 2.0).abs() < 1e-6);
        let mid = g.curve.evaluate(0.5 * (g.t_start + g.t_end));
        assert!(mid.x.abs() < 1e-12 && mid.z.abs() < 1e-12);
    }

    #[test]
    fn coplanar_faces_are_same_domain() {
        let a = face(FaceSurface::Plane(Plane::from_normal(p(0.0, 0.0, 0.5), Vector3::z()).unwrap()));
        let b = face(FaceSurface::Plane(Plane::from_normal(p(3.0, 1.0, 0.5), -Vector3::z()).unwrap()));
        assert!(matches!(face_face(&a, &b, &unit_box(), 1e-7, 32), FaceFace::SameDomain));
    }

    #[test]
    fn cap_plane_cuts_a_circle() {
        let cyl = Cylinder::new(p(0.0, 0.0, -3.0), 0.5, Vector3::z(), Vector3::x()).unwrap();
        let a = face(FaceSurface::Cylinder(cyl));
        let b = face(FaceSurface::Plane(Plane::from_normal(p(0.0, 0.0, 0.25), Vector3::z()).unwrap()));
        let out = curves(face_face(&a, &b, &unit_box(), 1e-7, 32));
        assert_eq!(out.hits.len(), 1);
        assert!(out.hits[0].closed);
        let q = out.hits[0].curve.evaluate(1.0);
        assert!((q.z - 0.25).abs() < 1e-12);
        assert!((q.coords.xy().norm() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn plane_along_axis_cuts_two_lines() {
        let cyl = Cylinder::new(p(0.0, 0.0, 0.0), 0.5, Vector3::z(), Vector3::x()).unwrap();
        let a = face(FaceSurface::Cylinder(cyl));
        let b = face(FaceSurface::Plane(Plane::from_normal(p(0.3, 0.0, 0.0), Vector3::x()).unwrap()));
        let out = curves(face_face(&a, &b, &unit_box(), 1e-7, 32));
        assert_eq!(out.hits.len(), 2);
        for g in &out.hits {
            let q = g.curve.evaluate(g.t_start);
            assert!((q.x - 0.3).abs() < 1e-12);
            assert!((q.y.abs() - 0.4).abs() < 1e-12);
        }
    }

    #[test]
    fn parallel_cylinders_meet_on_two_generators() {
        let ca = Cylinder::new(p(0.0, 0.0, 0.0), 0.5, Vector3::z(), Vector3::x()).unwrap();
        let cb = Cylinder::new(p(0.6, 0.0, 0.0), 0.5, Vector3::z(), Vector3::x()).unwrap();
        let out = curves(face_face(
            &face(FaceSurface::Cylinder(ca)),
            &face(FaceSurface::Cylinder(cb)),
            &unit_box(),
            1e-7,
            32,
        ));
        assert_eq!(out.hits.len(), 2);
        for g in &out.hits {
            let q = g.curve.evaluate(g.t_start);
            assert!((q.x - 0.3).abs() < 1e-12);
            assert!((q.y.abs() - 0.4).abs() < 1e-12);
        }
    }
}
