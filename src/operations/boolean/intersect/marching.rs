//! Predictor/corrector tracing of surface/surface intersections that have
//! no closed form in this kernel (oblique plane/cylinder, skew cylinders).
//!
//! Seeds are found on the generator lines of the cylinder involved, which
//! meet the other surface in closed form. From each seed the curve is
//! followed along `grad_a x grad_b` and every predicted point is pulled
//! back onto both surfaces by a Newton corrector constrained to the plane
//! through the prediction.

use std::f64::consts::TAU;

use tracing::trace;

use crate::geometry::curve::Polyline;
use crate::geometry::surface::Cylinder;
use crate::math::aabb::Aabb;
use crate::math::intersect_3d::{line_cylinder_intersect, line_plane_intersect, LinePlaneRelation};
use crate::math::newton::{surface_pair_correct, SolveFailure};
use crate::math::{Point3, Vector3};
use crate::topology::{EdgeCurve, FaceSurface};

use super::face_face::SectionGeom;
use super::{Issue, Outcome};

const GENERATORS: usize = 32;
const MAX_STEPS: usize = 4096;

/// Traces every branch of `sa` ∩ `sb` that passes through `bbox`.
pub(crate) fn march(sa: &FaceSurface, sb: &FaceSurface, bbox: &Aabb, tol: f64, max_iterations: usize) -> Outcome<SectionGeom> {
    let mut out = Outcome::default();
    let diag = bbox.diagonal();
    if diag <= tol {
        return out;
    }
    let step = [sa, sb]
        .iter()
        .filter_map(|s| match s {
            FaceSurface::Cylinder(c) => Some(c.radius() * 0.15),
            FaceSurface::Plane(_) => None,
        })
        .fold(diag / 64.0, f64::min);

    let mut branches: Vec<Vec<Point3>> = Vec::new();
    let mut closed_flags = Vec::new();
    for seed in seeds(sa, sb, bbox, tol) {
        let covered = branches
            .iter()
            .zip(&closed_flags)
            .any(|(pts, &closed)| distance_to_chain(&seed, pts, closed) < 0.5 * step);
        if covered {
            continue;
        }
        let tracer = Tracer {
            sa,
            sb,
            bbox,
            tol,
            step,
            max_iterations,
        };
        match tracer.trace(seed) {
            Ok((pts, closed)) => {
                trace!(points = pts.len(), closed, "traced intersection branch");
                branches.push(pts);
                closed_flags.push(closed);
            }
            Err(issue) => out.issues.push(issue),
        }
    }

    for (pts, closed) in branches.into_iter().zip(closed_flags) {
        let deviation = chain_deviation(sa, sb, &pts, closed);
        let Ok(polyline) = Polyline::new(pts, closed) else {
            continue;
        };
        out.hits.push(SectionGeom {
            t_start: 0.0,
            t_end: polyline.length(),
            curve: EdgeCurve::Polyline(polyline),
            tolerance: tol.max(deviation),
            closed,
        });
    }
    out
}

/// Points of `sa` ∩ `sb` on generator lines of a cylinder of the pair.
#[allow(clippy::cast_precision_loss)]
fn seeds(sa: &FaceSurface, sb: &FaceSurface, bbox: &Aabb, tol: f64) -> Vec<Point3> {
    let (cyl, other) = match (sa, sb) {
        (FaceSurface::Cylinder(c), other) | (other, FaceSurface::Cylinder(c)) => (c, other),
        _ => return Vec::new(),
    };
    let mut seeds = Vec::new();
    for k in 0..GENERATORS {
        let angle = TAU * k as f64 / GENERATORS as f64;
        let origin = generator_origin(cyl, angle);
        let axis = cyl.axis();
        let Some((t0, t1)) = bbox.clip_line(&origin, axis) else {
            continue;
        };
        let roots = match other {
            FaceSurface::Plane(pl) => match line_plane_intersect(&origin, axis, pl, tol) {
                LinePlaneRelation::Point { t, .. } => vec![t],
                LinePlaneRelation::Parallel | LinePlaneRelation::OnPlane => Vec::new(),
            },
            FaceSurface::Cylinder(c) => line_cylinder_intersect(&origin, axis, c),
        };
        seeds.extend(
            roots
                .into_iter()
                .filter(|t| *t >= t0 - tol && *t <= t1 + tol)
                .map(|t| origin + axis * t),
        );
    }
    seeds
}

fn generator_origin(cyl: &Cylinder, angle: f64) -> Point3 {
    cyl.center() + (cyl.ref_dir() * angle.cos() + cyl.binormal() * angle.sin()) * cyl.radius()
}

struct Tracer<'a> {
    sa: &'a FaceSurface,
    sb: &'a FaceSurface,
    bbox: &'a Aabb,
    tol: f64,
    step: f64,
    max_iterations: usize,
}

enum Stop {
    LeftBox,
    Closed,
}

impl Tracer<'_> {
    fn tangent(&self, p: &Point3) -> Option<Vector3> {
        let t = self.sa.gradient(p).cross(&self.sb.gradient(p));
        let len = t.norm();
        (len > 1e-9).then(|| t / len)
    }

    fn correct(&self, predicted: &Point3, normal: &Vector3) -> Result<Point3, SolveFailure> {
        let f1 = |q: &Point3| (self.sa.signed_distance(q), self.sa.gradient(q));
        let f2 = |q: &Point3| (self.sb.signed_distance(q), self.sb.gradient(q));
        surface_pair_correct(f1, f2, predicted, normal, predicted, self.tol, self.max_iterations)
    }

    /// Follows the branch through `seed` in both directions.
    fn trace(&self, seed: Point3) -> Result<(Vec<Point3>, bool), Issue> {
        let start = self
            .correct(&seed, &self.tangent(&seed).ok_or_else(tangent_issue)?)
            .map_err(failure_issue)?;
        let dir = self.tangent(&start).ok_or_else(tangent_issue)?;

        let (forward, stop) = self.walk(start, dir)?;
        if matches!(stop, Stop::Closed) {
            return Ok((forward, true));
        }
        let (mut backward, _) = self.walk(start, -dir)?;
        backward.reverse();
        backward.pop();
        backward.extend(forward);
        Ok((backward, false))
    }

    /// Steps from `start` until the curve leaves the box or closes up.
    /// The first point outside the box is kept so trimming can reach the
    /// box boundary.
    fn walk(&self, start: Point3, initial: Vector3) -> Result<(Vec<Point3>, Stop), Issue> {
        let mut pts = vec![start];
        let mut p = start;
        let mut dir = initial;
        for _ in 0..MAX_STEPS {
            let predicted = p + dir * self.step;
            let next = self.correct(&predicted, &dir).map_err(failure_issue)?;
            if pts.len() > 3 && (next - start).norm() < 0.75 * self.step {
                return Ok((pts, Stop::Closed));
            }
            pts.push(next);
            if !self.bbox.contains_point(&next) {
                return Ok((pts, Stop::LeftBox));
            }
            let Some(t) = self.tangent(&next) else {
                return Err(tangent_issue());
            };
            // keep heading the same way along the branch
            dir = if t.dot(&dir) < 0.0 { -t } else { t };
            p = next;
        }
        Err(Issue::IterationLimit)
    }
}

fn tangent_issue() -> Issue {
    Issue::Degenerate("surfaces are tangent along the intersection".into())
}

fn failure_issue(failure: SolveFailure) -> Issue {
    match failure {
        SolveFailure::IterationLimit => Issue::IterationLimit,
        SolveFailure::Singular | SolveFailure::NoBracket => tangent_issue(),
    }
}

fn distance_to_chain(p: &Point3, pts: &[Point3], closed: bool) -> f64 {
    let n = pts.len();
    let segments = if closed { n } else { n.saturating_sub(1) };
    (0..segments)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            let d = b - a;
            let len2 = d.norm_squared();
            let s = if len2 > 0.0 {
                ((p - a).dot(&d) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (p - (a + d * s)).norm()
        })
        .fold(f64::INFINITY, f64::min)
}

/// Largest distance from a chord midpoint to either surface.
fn chain_deviation(sa: &FaceSurface, sb: &FaceSurface, pts: &[Point3], closed: bool) -> f64 {
    let n = pts.len();
    let segments = if closed { n } else { n.saturating_sub(1) };
    (0..segments)
        .map(|i| {
            let mid = Point3::from((pts[i].coords + pts[(i + 1) % n].coords) * 0.5);
            sa.signed_distance(&mid).abs().max(sb.signed_distance(&mid).abs())
        })
        .fold(0.0, f64::max)
}
