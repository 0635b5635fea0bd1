use tracing::trace;

use crate::geometry::curve::Line;
use crate::math::intersect_3d::line_line_closest;
use crate::math::newton::{curve_curve_closest, SolveFailure};
use crate::math::tolerance::is_parallel;
use crate::math::{Point3, TOLERANCE};
use crate::topology::{EdgeCurve, EdgeData};

use super::{Issue, Outcome};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EdgeEdgeHit {
    /// The edges cross or touch at one point.
    Point {
        point: Point3,
        ta: f64,
        tb: f64,
        distance: f64,
    },
    /// The edges run together over the given parameter ranges.
    Coincident { ta: (f64, f64), tb: (f64, f64) },
}

/// Intersects two bounded edges within `tol`.
#[must_use]
pub(crate) fn edge_edge(a: &EdgeData, b: &EdgeData, tol: f64, max_iterations: usize) -> Outcome<EdgeEdgeHit> {
    match (&a.curve, &b.curve) {
        (EdgeCurve::Line(la), EdgeCurve::Line(lb)) => line_line(a, la, b, lb, tol),
        _ => general(a, b, tol, max_iterations),
    }
}

fn line_line(a: &EdgeData, la: &Line, b: &EdgeData, lb: &Line, tol: f64) -> Outcome<EdgeEdgeHit> {
    let mut out = Outcome::default();
    if is_parallel(la.direction(), lb.direction()) {
        let b0 = b.point_at(b.t_start);
        let foot = la.origin() + la.direction() * la.parameter_of(&b0);
        if (b0 - foot).norm() > tol {
            return out;
        }
        let s0 = la.parameter_of(&b0);
        let s1 = la.parameter_of(&b.point_at(b.t_end));
        let lo = s0.min(s1).max(a.t_start);
        let hi = s0.max(s1).min(a.t_end);
        if hi - lo > tol {
            let t0 = lb.parameter_of(&a.point_at(lo));
            let t1 = lb.parameter_of(&a.point_at(hi));
            out.hits.push(EdgeEdgeHit::Coincident {
                ta: (lo, hi),
                tb: (t0.min(t1), t0.max(t1)),
            });
        }
        return out;
    }

    let Some((s, t)) = line_line_closest(la.origin(), la.direction(), lb.origin(), lb.direction()) else {
        return out;
    };
    if s < a.t_start - tol || s > a.t_end + tol || t < b.t_start - tol || t > b.t_end + tol {
        return out;
    }
    let s = s.clamp(a.t_start, a.t_end);
    let t = t.clamp(b.t_start, b.t_end);
    let pa = a.point_at(s);
    let pb = b.point_at(t);
    let distance = (pa - pb).norm();
    if distance <= tol {
        out.hits.push(EdgeEdgeHit::Point {
            point: nalgebra::center(&pa, &pb),
            ta: s,
            tb: t,
            distance,
        });
    }
    out
}

/// Sampling plus Gauss-Newton refinement for every pair involving an arc
/// or a polyline.
fn general(a: &EdgeData, b: &EdgeData, tol: f64, max_iterations: usize) -> Outcome<EdgeEdgeHit> {
    let mut out = Outcome::default();
    if let Some(hit) = coincidence(a, b, tol) {
        out.hits.push(hit);
        return out;
    }

    let pa = a.curve.sample_params(a.t_start, a.t_end);
    let pb = b.curve.sample_params(b.t_start, b.t_end);
    let eval_a = |t: f64| (a.curve.evaluate(t), a.curve.derivative(t));
    let eval_b = |t: f64| (b.curve.evaluate(t), b.curve.derivative(t));

    for wa in pa.windows(2) {
        let (a0, a1) = (a.point_at(wa[0]), a.point_at(wa[1]));
        for wb in pb.windows(2) {
            let (b0, b1) = (b.point_at(wb[0]), b.point_at(wb[1]));
            let (u, v, d) = segment_closest(&a0, &a1, &b0, &b1);
            let margin = tol + sagitta(a, (a1 - a0).norm()) + sagitta(b, (b1 - b0).norm());
            if d > margin {
                continue;
            }
            let seed = (wa[0] + (wa[1] - wa[0]) * u, wb[0] + (wb[1] - wb[0]) * v);
            let (s, t) = match curve_curve_closest(
                eval_a,
                (a.t_start, a.t_end),
                eval_b,
                (b.t_start, b.t_end),
                seed,
                max_iterations,
            ) {
                Ok(st) => st,
                Err(SolveFailure::Singular) => {
                    trace!(?seed, "edge/edge refinement singular, keeping seed");
                    seed
                }
                Err(_) => {
                    out.issues.push(Issue::IterationLimit);
                    continue;
                }
            };
            let (p, q) = (a.point_at(s), b.point_at(t));
            let distance = (p - q).norm();
            if distance > tol {
                continue;
            }
            let point = nalgebra::center(&p, &q);
            let duplicate = out.hits.iter().any(|h| match h {
                EdgeEdgeHit::Point { point: other, .. } => (other - point).norm() <= tol,
                EdgeEdgeHit::Coincident { .. } => false,
            });
            if !duplicate {
                out.hits.push(EdgeEdgeHit::Point {
                    point,
                    ta: s,
                    tb: t,
                    distance,
                });
            }
        }
    }
    out
}

/// Upper bound of the gap between a sample chord and the curve.
fn sagitta(edge: &EdgeData, chord: f64) -> f64 {
    match &edge.curve {
        EdgeCurve::Circle(c) => chord * chord / (4.0 * c.radius()),
        EdgeCurve::Line(_) | EdgeCurve::Polyline(_) => 0.0,
    }
}

fn on_curve(edge: &EdgeData, point: &Point3, tol: f64) -> Option<f64> {
    let (t, d) = edge.project(point);
    (d <= tol).then_some(t)
}

/// Overlap of two edges lying on the same curve, if any.
fn coincidence(a: &EdgeData, b: &EdgeData, tol: f64) -> Option<EdgeEdgeHit> {
    let same_circle = match (&a.curve, &b.curve) {
        (EdgeCurve::Circle(ca), EdgeCurve::Circle(cb)) => {
            (ca.center() - cb.center()).norm() <= tol
                && (ca.radius() - cb.radius()).abs() <= tol
                && is_parallel(ca.normal(), cb.normal())
        }
        _ => false,
    };
    let inside = |x: &EdgeData, y: &EdgeData| {
        (1..=5).all(|i| {
            let t = x.t_start + (x.t_end - x.t_start) * f64::from(i) / 6.0;
            on_curve(y, &x.point_at(t), tol).is_some()
        })
    };
    if !same_circle && !inside(a, b) && !inside(b, a) {
        return None;
    }

    let mut on_a = Vec::new();
    let mut on_b = Vec::new();
    for (t, p) in [(a.t_start, a.point_at(a.t_start)), (a.t_end, a.point_at(a.t_end))] {
        if let Some(tb) = on_curve(b, &p, tol) {
            on_a.push(t);
            on_b.push(tb);
        }
    }
    for (t, p) in [(b.t_start, b.point_at(b.t_start)), (b.t_end, b.point_at(b.t_end))] {
        if let Some(ta) = on_curve(a, &p, tol) {
            on_a.push(ta);
            on_b.push(t);
        }
    }
    let range = |v: &[f64]| {
        v.iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)))
    };
    let ta = range(&on_a);
    let tb = range(&on_b);
    (ta.1 - ta.0 > TOLERANCE).then_some(EdgeEdgeHit::Coincident { ta, tb })
}

/// Closest points of segments `[p0, p1]` and `[q0, q1]` as fractions along
/// each, plus their distance.
fn segment_closest(p0: &Point3, p1: &Point3, q0: &Point3, q1: &Point3) -> (f64, f64, f64) {
    let d1 = p1 - p0;
    let d2 = q1 - q0;
    let r = p0 - q0;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);
    let eps = TOLERANCE * TOLERANCE;

    let (s, t) = if a <= eps && e <= eps {
        (0.0, 0.0)
    } else if a <= eps {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= eps {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            let s = if denom > eps {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };
    let d = ((p0 + d1 * s) - (q0 + d2 * t)).norm();
    (s, t, d)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::Circle;
    use crate::math::Vector3;
    use crate::topology::{TopologyStore, VertexData, VertexId};
    use std::f64::consts::PI;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn line_edge(store: &mut TopologyStore, a: Point3, b: Point3) -> EdgeData {
        let va = store.add_vertex(VertexData::new(a));
        let vb = store.add_vertex(VertexData::new(b));
        let line = Line::through(&a, &b).unwrap();
        EdgeData::new(va, vb, EdgeCurve::Line(line), 0.0, (b - a).norm())
    }

    fn arc_edge(v: VertexId, w: VertexId, r: f64, t0: f64, t1: f64) -> EdgeData {
        let c = Circle::new(p(0.0, 0.0, 0.0), r, Vector3::z(), Vector3::x()).unwrap();
        EdgeData::new(v, w, EdgeCurve::Circle(c), t0, t1)
    }

    #[test]
    fn crossing_lines() {
        let mut store = TopologyStore::new();
        let a = line_edge(&mut store, p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0));
        let b = line_edge(&mut store, p(1.0, -1.0, 0.0), p(1.0, 1.0, 0.0));
        let out = edge_edge(&a, &b, 1e-7, 32);
        assert_eq!(out.hits.len(), 1);
        let EdgeEdgeHit::Point { point, ta, tb, .. } = &out.hits[0] else {
            panic!("expected a point hit");
        };
        assert!((point - p(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((ta - 1.0).abs() < 1e-12 && (tb - 1.0).abs() < 1e-12);
    }

    #[test]
    fn skew_lines_miss() {
        let mut store = TopologyStore::new();
        let a = line_edge(&mut store, p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0));
        let b = line_edge(&mut store, p(1.0, -1.0, 0.5), p(1.0, 1.0, 0.5));
        assert!(edge_edge(&a, &b, 1e-7, 32).hits.is_empty());
    }

    #[test]
    fn overlapping_lines_are_coincident() {
        let mut store = TopologyStore::new();
        let a = line_edge(&mut store, p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
        let b = line_edge(&mut store, p(1.5, 0.0, 0.0), p(0.5, 0.0, 0.0));
        let out = edge_edge(&a, &b, 1e-7, 32);
        let EdgeEdgeHit::Coincident { ta, tb } = out.hits[0] else {
            panic!("expected coincidence");
        };
        assert!((ta.0 - 0.5).abs() < 1e-12 && (ta.1 - 1.0).abs() < 1e-12);
        assert!((tb.0 - 0.5).abs() < 1e-12 && (tb.1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn line_crosses_arc_once() {
        let mut store = TopologyStore::new();
        let v = store.add_vertex(VertexData::new(p(2.0, 0.0, 0.0)));
        let w = store.add_vertex(VertexData::new(p(-2.0, 0.0, 0.0)));
        let arc = arc_edge(v, w, 2.0, 0.0, PI);
        let line = line_edge(&mut store, p(1.0, -3.0, 0.0), p(1.0, 3.0, 0.0));
        let out = edge_edge(&line, &arc, 1e-7, 64);
        assert_eq!(out.hits.len(), 1, "{:?}", out.hits);
        let EdgeEdgeHit::Point { point, tb, .. } = &out.hits[0] else {
            panic!("expected a point hit");
        };
        assert!((point - p(1.0, 3.0f64.sqrt(), 0.0)).norm() < 1e-9);
        assert!((tb - PI / 3.0).abs() < 1e-9);
    }

    #[test]
    fn arcs_of_one_circle_overlap() {
        let mut store = TopologyStore::new();
        let v = store.add_vertex(VertexData::new(p(1.0, 0.0, 0.0)));
        let w = store.add_vertex(VertexData::new(p(-1.0, 0.0, 0.0)));
        let a = arc_edge(v, w, 1.0, 0.0, PI);
        let b = arc_edge(v, w, 1.0, PI / 2.0, 1.5 * PI);
        let out = edge_edge(&a, &b, 1e-7, 32);
        assert!(matches!(out.hits[0], EdgeEdgeHit::Coincident { .. }));
    }
}
