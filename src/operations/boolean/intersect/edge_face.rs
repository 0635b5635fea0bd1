use std::f64::consts::TAU;

use tracing::trace;

use crate::math::intersect_3d::{
    circle_plane_intersect, line_cylinder_intersect, line_plane_intersect, CirclePlaneRelation,
    LinePlaneRelation,
};
use crate::math::newton::{bracketed_root, SolveFailure};
use crate::math::tolerance::parametric;
use crate::math::{Point2, Point3};
use crate::topology::face_uv::{FaceLocation, FaceLocator};
use crate::topology::{EdgeCurve, EdgeData, FaceSurface};

use super::{Issue, Outcome};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EdgeFaceHit {
    /// The edge meets the face at one point.
    Point {
        point: Point3,
        t: f64,
        uv: Point2,
        location: FaceLocation,
    },
    /// The whole edge lies on the face's surface.
    OnSurface,
}

/// Intersects a bounded edge with a face.
#[must_use]
pub(crate) fn edge_face(edge: &EdgeData, face: &FaceLocator, tol: f64, max_iterations: usize) -> Outcome<EdgeFaceHit> {
    let mut out = Outcome::default();
    let surface = face.uv().surface();
    if lies_on(edge, surface, tol) {
        out.hits.push(EdgeFaceHit::OnSurface);
        return out;
    }

    let speed = edge.curve.derivative(edge.mid_param()).norm();
    let ptol = parametric(tol, speed);
    let candidates = match (&edge.curve, surface) {
        (EdgeCurve::Line(l), FaceSurface::Plane(pl)) => {
            match line_plane_intersect(l.origin(), l.direction(), pl, tol) {
                LinePlaneRelation::Point { t, .. } => vec![t],
                LinePlaneRelation::Parallel | LinePlaneRelation::OnPlane => Vec::new(),
            }
        }
        (EdgeCurve::Line(l), FaceSurface::Cylinder(cyl)) => {
            let roots = line_cylinder_intersect(l.origin(), l.direction(), cyl);
            if roots.len() == 1 {
                out.issues
                    .push(Issue::Degenerate("line tangent to cylinder".into()));
            }
            roots
        }
        (EdgeCurve::Circle(c), FaceSurface::Plane(pl)) => match circle_plane_intersect(c, pl, tol) {
            CirclePlaneRelation::Angles(angles) => angles
                .into_iter()
                .map(|a| edge.t_start + (a - edge.t_start).rem_euclid(TAU))
                .collect(),
            CirclePlaneRelation::Parallel | CirclePlaneRelation::OnPlane => Vec::new(),
        },
        _ => numeric_roots(edge, surface, tol, max_iterations, &mut out.issues),
    };

    let mut params: Vec<f64> = Vec::new();
    for t in candidates {
        if t < edge.t_start - ptol || t > edge.t_end + ptol {
            continue;
        }
        let t = t.clamp(edge.t_start, edge.t_end);
        if params.iter().all(|q| (q - t).abs() > ptol) {
            params.push(t);
        }
    }

    for t in params {
        let point = edge.point_at(t);
        let location = face.locate(&point, tol);
        if location == FaceLocation::Outside {
            continue;
        }
        out.hits.push(EdgeFaceHit::Point {
            point,
            t,
            uv: face.uv().to_uv(&point),
            location,
        });
    }
    out
}

/// True when the edge stays within `tol` of the surface everywhere.
fn lies_on(edge: &EdgeData, surface: &FaceSurface, tol: f64) -> bool {
    let params = edge.curve.sample_params(edge.t_start, edge.t_end);
    let mids = params.windows(2).map(|w| 0.5 * (w[0] + w[1]));
    params
        .iter()
        .copied()
        .chain(mids)
        .all(|t| surface.signed_distance(&edge.point_at(t)).abs() <= tol)
}

/// Sign changes of the signed distance along the edge, refined by a
/// bracketed root search. Samples within `tol` count as touching points.
fn numeric_roots(
    edge: &EdgeData,
    surface: &FaceSurface,
    tol: f64,
    max_iterations: usize,
    issues: &mut Vec<Issue>,
) -> Vec<f64> {
    let f = |t: f64| surface.signed_distance(&edge.point_at(t));
    let coarse = edge.curve.sample_params(edge.t_start, edge.t_end);
    let mut params = Vec::with_capacity(coarse.len() * 4);
    for w in coarse.windows(2) {
        for k in 0..4 {
            params.push(w[0] + (w[1] - w[0]) * f64::from(k) / 4.0);
        }
    }
    params.push(edge.t_end);

    let mut roots = Vec::new();
    let values: Vec<f64> = params.iter().map(|&t| f(t)).collect();
    for i in 0..params.len() {
        if values[i].abs() <= tol {
            roots.push(params[i]);
            continue;
        }
        if i + 1 < params.len() && values[i + 1].abs() > tol && values[i].signum() != values[i + 1].signum() {
            match bracketed_root(f, params[i], params[i + 1], tol * 1e-3, max_iterations) {
                Ok(t) => roots.push(t),
                Err(SolveFailure::IterationLimit) => issues.push(Issue::IterationLimit),
                Err(err) => trace!(?err, "edge/face bracket discarded"),
            }
        }
    }
    roots
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::curve::{Circle, Curve, Line};
    use crate::math::Vector3;
    use crate::operations::creation::{MakeBox, MakeCylinder};
    use crate::topology::explore::faces_of;
    use crate::topology::{FaceId, Shape, TopologyStore, VertexData};
    use std::f64::consts::PI;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn face_facing(store: &TopologyStore, shape: Shape, probe: Point3, dir: Vector3) -> FaceId {
        faces_of(store, shape)
            .unwrap()
            .into_iter()
            .find(|&f| store.face(f).unwrap().normal_at(&probe).dot(&dir) > 0.9)
            .unwrap()
    }

    #[test]
    fn line_through_box_top() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let top = face_facing(&store, Shape::Solid(solid), p(0.5, 0.5, 1.0), Vector3::z());
        let loc = FaceLocator::new(&store, top).unwrap();
        let a = store.add_vertex(VertexData::new(p(0.5, 0.5, 0.5)));
        let b = store.add_vertex(VertexData::new(p(0.5, 0.5, 2.0)));
        let line = Line::through(&p(0.5, 0.5, 0.5), &p(0.5, 0.5, 2.0)).unwrap();
        let edge = EdgeData::new(a, b, EdgeCurve::Line(line), 0.0, 1.5);
        let out = edge_face(&edge, &loc, 1e-7, 32);
        assert_eq!(out.hits.len(), 1);
        let EdgeFaceHit::Point { point, location, .. } = &out.hits[0] else {
            panic!("expected a point hit");
        };
        assert!((point - p(0.5, 0.5, 1.0)).norm() < 1e-12);
        assert_eq!(*location, FaceLocation::Inside);
    }

    #[test]
    fn edge_in_plane_is_on_surface() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let top = face_facing(&store, Shape::Solid(solid), p(0.5, 0.5, 1.0), Vector3::z());
        let loc = FaceLocator::new(&store, top).unwrap();
        let a = store.add_vertex(VertexData::new(p(-1.0, 0.5, 1.0)));
        let b = store.add_vertex(VertexData::new(p(2.0, 0.5, 1.0)));
        let line = Line::through(&p(-1.0, 0.5, 1.0), &p(2.0, 0.5, 1.0)).unwrap();
        let edge = EdgeData::new(a, b, EdgeCurve::Line(line), 0.0, 3.0);
        assert_eq!(edge_face(&edge, &loc, 1e-7, 32).hits, vec![EdgeFaceHit::OnSurface]);
    }

    #[test]
    fn arc_crosses_cylinder_side() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 1.0, Vector3::z(), 2.0)
            .execute(&mut store)
            .unwrap();
        let loc = faces_of(&store, Shape::Solid(solid))
            .unwrap()
            .into_iter()
            .map(|f| FaceLocator::new(&store, f).unwrap())
            .find(|l| l.locate(&p(1.0, 0.0, 1.0), 1e-7) == FaceLocation::Inside)
            .unwrap();
        // small circle centred on the cylinder wall, crossing it twice
        let circle = Circle::new(p(1.0, 0.0, 1.0), 0.5, Vector3::z(), Vector3::x()).unwrap();
        let a = store.add_vertex(VertexData::new(circle.evaluate(0.0)));
        let edge = EdgeData::new(a, a, EdgeCurve::Circle(circle), 0.0, 2.0 * PI);
        let out = edge_face(&edge, &loc, 1e-7, 64);
        assert_eq!(out.hits.len(), 2, "{:?}", out.hits);
        for hit in &out.hits {
            let EdgeFaceHit::Point { point, .. } = hit else {
                panic!("expected point hits");
            };
            assert!((point.coords.xy().norm() - 1.0).abs() < 1e-7);
            assert!((point.x - 0.875).abs() < 1e-7);
        }
    }
}
