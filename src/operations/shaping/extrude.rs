use crate::error::{OperationError, Result};
use crate::geometry::curve::Line;
use crate::geometry::surface::Plane;
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::operations::creation::MakeSolid;
use crate::topology::explore::wire_vertices;
use crate::topology::{
    EdgeCurve, EdgeData, EdgeId, FaceData, FaceId, FaceSurface, OrientedEdge, ShellData, SolidId,
    TopologyStore, VertexData, VertexId, WireData,
};

/// Extrudes a planar polygonal face along a direction vector to create a solid.
///
/// Holes of the face become through-holes of the prism. Every vertex and
/// edge of the result is shared between the faces that meet there.
pub struct Extrude {
    face: FaceId,
    direction: Vector3,
}

impl Extrude {
    /// Creates a new `Extrude` operation.
    #[must_use]
    pub fn new(face: FaceId, direction: Vector3) -> Self {
        Self { face, direction }
    }

    /// Executes the extrusion, creating the solid in the topology store.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] if the direction is zero-length
    /// or parallel to the face, or the face is not a planar polygon.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<SolidId> {
        if self.direction.norm() < TOLERANCE {
            return Err(
                OperationError::InvalidInput("extrude direction must be non-zero".into()).into(),
            );
        }

        let face = store.face(self.face)?;
        let FaceSurface::Plane(plane) = &face.surface else {
            return Err(OperationError::InvalidInput("only planar faces can be extruded".into()).into());
        };
        let normal = if face.same_sense {
            *plane.plane_normal()
        } else {
            -plane.plane_normal()
        };
        let wires: Vec<_> = face.wires().collect();

        let mut loops = Vec::with_capacity(wires.len());
        for wire in wires {
            for oe in &store.wire(wire)?.edges {
                if !matches!(store.edge(oe.edge)?.curve, EdgeCurve::Line(_)) {
                    return Err(OperationError::InvalidInput(
                        "extrusion of curved boundaries is not supported".into(),
                    )
                    .into());
                }
            }
            let points = wire_vertices(store, wire)?
                .into_iter()
                .map(|v| store.vertex(v).map(|d| d.point))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            loops.push(points);
        }

        // Loops must wind counter-clockwise around the direction.
        let along = normal.dot(&self.direction);
        if along.abs() < TOLERANCE {
            return Err(OperationError::InvalidInput("direction lies in the face plane".into()).into());
        }
        if along < 0.0 {
            for l in &mut loops {
                l.reverse();
            }
        }

        extrude_loops(store, &loops, &self.direction)
    }
}

/// Builds a prism from polygon loops (outer first, counter-clockwise around
/// `direction`; holes clockwise) swept along `direction`.
pub(crate) fn extrude_loops(store: &mut TopologyStore, loops: &[Vec<Point3>], direction: &Vector3) -> Result<SolidId> {
    let dir_unit = direction.normalize();
    let mut bottom_wires = Vec::with_capacity(loops.len());
    let mut top_wires = Vec::with_capacity(loops.len());
    let mut faces = Vec::new();

    for points in loops {
        let n = points.len();
        if n < 3 {
            return Err(OperationError::InvalidInput("profile loop needs 3 points".into()).into());
        }
        let bottom: Vec<VertexId> = points.iter().map(|p| store.add_vertex(VertexData::new(*p))).collect();
        let top: Vec<VertexId> = points
            .iter()
            .map(|p| store.add_vertex(VertexData::new(p + direction)))
            .collect();

        let mut bottom_edges = Vec::with_capacity(n);
        let mut top_edges = Vec::with_capacity(n);
        let mut vertical = Vec::with_capacity(n);
        for i in 0..n {
            let j = (i + 1) % n;
            bottom_edges.push(line_edge(store, bottom[i], bottom[j], &points[i], &points[j])?);
            top_edges.push(line_edge(
                store,
                top[i],
                top[j],
                &(points[i] + direction),
                &(points[j] + direction),
            )?);
            vertical.push(line_edge(store, bottom[i], top[i], &points[i], &(points[i] + direction))?);
        }

        for i in 0..n {
            let j = (i + 1) % n;
            let wire = store.add_wire(WireData::closed(vec![
                OrientedEdge::new(bottom_edges[i], true),
                OrientedEdge::new(vertical[j], true),
                OrientedEdge::new(top_edges[i], false),
                OrientedEdge::new(vertical[i], false),
            ]));
            let plane = Plane::new(points[i], points[j] - points[i], *direction)?;
            faces.push(store.add_face(FaceData::new(FaceSurface::Plane(plane), wire, vec![], true)));
        }

        bottom_wires.push(store.add_wire(WireData::closed(
            bottom_edges.iter().rev().map(|&e| OrientedEdge::new(e, false)).collect(),
        )));
        top_wires.push(store.add_wire(WireData::closed(
            top_edges.iter().map(|&e| OrientedEdge::new(e, true)).collect(),
        )));
    }

    let base = loops[0][0];
    let bottom_plane = Plane::from_normal(base, -dir_unit)?;
    let top_plane = Plane::from_normal(base + direction, dir_unit)?;
    let bottom_face = store.add_face(FaceData::new(
        FaceSurface::Plane(bottom_plane),
        bottom_wires[0],
        bottom_wires[1..].to_vec(),
        true,
    ));
    let top_face = store.add_face(FaceData::new(
        FaceSurface::Plane(top_plane),
        top_wires[0],
        top_wires[1..].to_vec(),
        true,
    ));
    faces.insert(0, top_face);
    faces.insert(0, bottom_face);

    let shell = store.add_shell(ShellData::closed(faces));
    MakeSolid::new(shell, vec![]).execute(store)
}

fn line_edge(store: &mut TopologyStore, start: VertexId, end: VertexId, a: &Point3, b: &Point3) -> Result<EdgeId> {
    let line = Line::through(a, b)?;
    Ok(store.add_edge(EdgeData::new(start, end, EdgeCurve::Line(line), 0.0, (b - a).norm())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::{MakeFace, MakeWire};
    use crate::operations::query::{IsValid, Volume};
    use crate::topology::explore::{edges_of, faces_of};
    use crate::topology::Shape;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn make_face(store: &mut TopologyStore, points: Vec<Point3>) -> FaceId {
        let wire = MakeWire::new(points, true).execute(store).unwrap();
        MakeFace::new(wire, vec![]).execute(store).unwrap()
    }

    #[test]
    fn extrude_square() {
        let mut store = TopologyStore::new();
        let face = make_face(
            &mut store,
            vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 2.0, 0.0), p(0.0, 2.0, 0.0)],
        );
        let solid = Extrude::new(face, Vector3::new(0.0, 0.0, 3.0))
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        assert_eq!(faces_of(&store, shape).unwrap().len(), 6);
        assert_eq!(edges_of(&store, shape).unwrap().len(), 12);
        assert!(IsValid::new(shape).execute(&store));
        let volume = Volume::new(shape).execute(&store).unwrap();
        assert!((volume - 12.0).abs() < 1e-9, "volume = {volume}");
    }

    #[test]
    fn extrude_against_normal() {
        let mut store = TopologyStore::new();
        let face = make_face(
            &mut store,
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)],
        );
        let solid = Extrude::new(face, Vector3::new(0.0, 0.0, -2.0))
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        assert!(IsValid::new(shape).execute(&store));
        let volume = Volume::new(shape).execute(&store).unwrap();
        assert!((volume - 1.0).abs() < 1e-9, "volume = {volume}");
    }

    #[test]
    fn extrude_face_with_hole() {
        let mut store = TopologyStore::new();
        let outer = MakeWire::new(
            vec![p(0.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(4.0, 4.0, 0.0), p(0.0, 4.0, 0.0)],
            true,
        )
        .execute(&mut store)
        .unwrap();
        let hole = MakeWire::new(
            vec![p(1.0, 1.0, 0.0), p(1.0, 3.0, 0.0), p(3.0, 3.0, 0.0), p(3.0, 1.0, 0.0)],
            true,
        )
        .execute(&mut store)
        .unwrap();
        let face = MakeFace::new(outer, vec![hole]).execute(&mut store).unwrap();
        let solid = Extrude::new(face, Vector3::new(0.0, 0.0, 1.0))
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        assert_eq!(faces_of(&store, shape).unwrap().len(), 10);
        assert!(IsValid::new(shape).execute(&store));
        let volume = Volume::new(shape).execute(&store).unwrap();
        assert!((volume - 12.0).abs() < 1e-9, "volume = {volume}");
    }

    #[test]
    fn zero_direction_fails() {
        let mut store = TopologyStore::new();
        let face = make_face(
            &mut store,
            vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)],
        );
        assert!(Extrude::new(face, Vector3::zeros()).execute(&mut store).is_err());
    }
}
