use std::f64::consts::PI;

use crate::error::{OperationError, Result};
use crate::geometry::curve::{Circle, Line};
use crate::geometry::surface::{Cylinder, Plane};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::topology::{
    EdgeCurve, EdgeData, EdgeId, FaceData, FaceSurface, OrientedEdge, ShellData, SolidId,
    TopologyStore, VertexData, VertexId, WireData,
};

use super::MakeSolid;

/// Creates a cylinder solid from center, radius, axis, and height.
///
/// The lateral surface is split into two half-cylinder faces along seams at
/// angles 0 and pi, so every face has a simply connected parameter domain.
/// The result has 4 vertices, 6 edges and 4 faces.
pub struct MakeCylinder {
    center: Point3,
    radius: f64,
    axis: Vector3,
    height: f64,
}

impl MakeCylinder {
    /// Creates a new `MakeCylinder` operation.
    #[must_use]
    pub fn new(center: Point3, radius: f64, axis: Vector3, height: f64) -> Self {
        Self {
            center,
            radius,
            axis,
            height,
        }
    }

    /// Executes the operation, creating the cylinder in the topology store.
    ///
    /// A negative height extends the cylinder against the axis.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius or height is near zero, or the axis
    /// direction is degenerate.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<SolidId> {
        if self.radius < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder radius must be positive".into()).into(),
            );
        }
        if self.height.abs() < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder height must be non-zero".into()).into(),
            );
        }
        let axis_len = self.axis.norm();
        if axis_len < TOLERANCE {
            return Err(
                OperationError::InvalidInput("cylinder axis must be non-zero".into()).into(),
            );
        }
        let axis = self.axis / axis_len * self.height.signum();
        let h = self.height.abs();
        let r = self.radius;

        let ref_dir = perpendicular_dir(&axis);
        let binormal = axis.cross(&ref_dir);
        let bottom_center = self.center;
        let top_center = self.center + axis * h;

        let b0 = store.add_vertex(VertexData::new(bottom_center + ref_dir * r));
        let b1 = store.add_vertex(VertexData::new(bottom_center - ref_dir * r));
        let t0 = store.add_vertex(VertexData::new(top_center + ref_dir * r));
        let t1 = store.add_vertex(VertexData::new(top_center - ref_dir * r));

        let bottom_circle = Circle::new(bottom_center, r, axis, ref_dir)?;
        let top_circle = Circle::new(top_center, r, axis, ref_dir)?;
        let arc = |store: &mut TopologyStore, c: &Circle, s: VertexId, e: VertexId, a: f64| -> EdgeId {
            store.add_edge(EdgeData::new(s, e, EdgeCurve::Circle(c.clone()), a, a + PI))
        };
        let bottom_a = arc(store, &bottom_circle, b0, b1, 0.0);
        let bottom_b = arc(store, &bottom_circle, b1, b0, PI);
        let top_a = arc(store, &top_circle, t0, t1, 0.0);
        let top_b = arc(store, &top_circle, t1, t0, PI);

        let seam0 = seam(store, b0, t0, &(bottom_center + ref_dir * r), &axis, h)?;
        let seam1 = seam(store, b1, t1, &(bottom_center - ref_dir * r), &axis, h)?;

        let lateral = Cylinder::new(bottom_center, r, axis, ref_dir)?;
        let side_a = store.add_wire(WireData::closed(vec![
            OrientedEdge::new(bottom_a, true),
            OrientedEdge::new(seam1, true),
            OrientedEdge::new(top_a, false),
            OrientedEdge::new(seam0, false),
        ]));
        let side_b = store.add_wire(WireData::closed(vec![
            OrientedEdge::new(bottom_b, true),
            OrientedEdge::new(seam0, true),
            OrientedEdge::new(top_b, false),
            OrientedEdge::new(seam1, false),
        ]));
        let bottom_wire = store.add_wire(WireData::closed(vec![
            OrientedEdge::new(bottom_b, false),
            OrientedEdge::new(bottom_a, false),
        ]));
        let top_wire = store.add_wire(WireData::closed(vec![
            OrientedEdge::new(top_a, true),
            OrientedEdge::new(top_b, true),
        ]));

        let bottom_plane = Plane::new(bottom_center, ref_dir, -binormal)?;
        let top_plane = Plane::new(top_center, ref_dir, binormal)?;
        let faces = vec![
            store.add_face(FaceData::new(FaceSurface::Plane(bottom_plane), bottom_wire, vec![], true)),
            store.add_face(FaceData::new(FaceSurface::Plane(top_plane), top_wire, vec![], true)),
            store.add_face(FaceData::new(FaceSurface::Cylinder(lateral.clone()), side_a, vec![], true)),
            store.add_face(FaceData::new(FaceSurface::Cylinder(lateral), side_b, vec![], true)),
        ];

        let shell = store.add_shell(ShellData::closed(faces));
        MakeSolid::new(shell, vec![]).execute(store)
    }
}

fn seam(store: &mut TopologyStore, start: VertexId, end: VertexId, origin: &Point3, axis: &Vector3, h: f64) -> Result<EdgeId> {
    let line = Line::new(*origin, *axis)?;
    Ok(store.add_edge(EdgeData::new(start, end, EdgeCurve::Line(line), 0.0, h)))
}

/// Finds a direction perpendicular to the given unit vector.
fn perpendicular_dir(axis: &Vector3) -> Vector3 {
    let candidate = if axis.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let perp = axis.cross(&candidate);
    perp / perp.norm()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::query::{BoundingBox, IsValid, Volume};
    use crate::topology::explore::{edges_of, faces_of, vertices_of};
    use crate::topology::Shape;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn cylinder_topology() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 3.0, Vector3::z(), 6.0)
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        assert_eq!(faces_of(&store, shape).unwrap().len(), 4);
        assert_eq!(edges_of(&store, shape).unwrap().len(), 6);
        assert_eq!(vertices_of(&store, shape).unwrap().len(), 4);
        assert!(IsValid::new(shape).execute(&store));
    }

    #[test]
    fn cylinder_volume_and_bounds() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 2.0, Vector3::z(), 5.0)
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        let volume = Volume::new(shape).execute(&store).unwrap();
        let expected = 20.0 * PI;
        assert!((volume - expected).abs() < expected * 0.01, "got {volume}");

        let aabb = BoundingBox::new(shape).execute(&store).unwrap();
        assert!((aabb.min.z - 0.0).abs() < 1e-6);
        assert!((aabb.max.z - 5.0).abs() < 1e-6);
        assert!((aabb.max.x - 2.0).abs() < 1e-2);
    }

    #[test]
    fn negative_height_extends_downwards() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 1.0, Vector3::z(), -2.0)
            .execute(&mut store)
            .unwrap();
        let aabb = BoundingBox::new(Shape::Solid(solid)).execute(&store).unwrap();
        assert!((aabb.min.z + 2.0).abs() < 1e-6);
        assert!(IsValid::new(Shape::Solid(solid)).execute(&store));
    }

    #[test]
    fn zero_radius_fails() {
        let mut store = TopologyStore::new();
        let result = MakeCylinder::new(p(0.0, 0.0, 0.0), 0.0, Vector3::z(), 5.0)
            .execute(&mut store);
        assert!(result.is_err());
    }

    #[test]
    fn zero_height_fails() {
        let mut store = TopologyStore::new();
        let result = MakeCylinder::new(p(0.0, 0.0, 0.0), 3.0, Vector3::z(), 0.0)
            .execute(&mut store);
        assert!(result.is_err());
    }
}
