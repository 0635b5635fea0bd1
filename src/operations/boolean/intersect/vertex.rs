use crate::math::{Point2, Point3};
use crate::topology::face_uv::{FaceLocation, FaceLocator};
use crate::topology::EdgeData;

/// Parameter at which `point` lies on the interior of `edge`.
///
/// Points within `tol` of either end are left to vertex/vertex coincidence.
#[must_use]
pub(crate) fn vertex_edge(point: &Point3, tol: f64, edge: &EdgeData) -> Option<f64> {
    let (t, d) = edge.project(point);
    if d > tol {
        return None;
    }
    let near_start = (point - edge.point_at(edge.t_start)).norm() <= tol;
    let near_end = (point - edge.point_at(edge.t_end)).norm() <= tol;
    (!near_start && !near_end).then_some(t)
}

/// Oriented UV of `point` and its location when it lies on the face.
#[must_use]
pub(crate) fn vertex_face(point: &Point3, tol: f64, face: &FaceLocator) -> Option<(Point2, FaceLocation)> {
    match face.locate(point, tol) {
        FaceLocation::Outside => None,
        location => Some((face.uv().to_uv(point), location)),
    }
}
