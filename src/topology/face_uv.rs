//! Face parameter space with a consistent orientation.
//!
//! Boundary loops of every face are mapped into an *oriented* UV plane in
//! which outer loops run counter-clockwise and holes clockwise, regardless
//! of whether the face agrees with its surface normal. Cylinder faces are
//! unwrapped around a reference angle inside the face so the map is
//! continuous over the face.

use crate::error::Result;
use crate::math::polygon_2d::{interior_point_2d, winding_number_2d};
use crate::math::{Point2, Point3, Vector3};

use super::{EdgeData, FaceId, FaceSurface, OrientedEdge, TopologyStore, WireId};

/// Oriented UV map of one face.
#[derive(Debug, Clone)]
pub struct FaceUv {
    surface: FaceSurface,
    same_sense: bool,
    u_ref: f64,
}

impl FaceUv {
    /// Builds the map for a face of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or its boundary is missing.
    pub fn new(store: &TopologyStore, face: FaceId) -> Result<Self> {
        let data = store.face(face)?;
        let u_ref = match &data.surface {
            FaceSurface::Plane(_) => 0.0,
            FaceSurface::Cylinder(cyl) => {
                let (mut c, mut s) = (0.0, 0.0);
                for wire in data.wires() {
                    for oe in &store.wire(wire)?.edges {
                        for p in store.edge(oe.edge)?.sample() {
                            let d = p - cyl.center();
                            c += d.dot(cyl.ref_dir());
                            s += d.dot(&cyl.binormal());
                        }
                    }
                }
                s.atan2(c)
            }
        };
        Ok(Self {
            surface: data.surface.clone(),
            same_sense: data.same_sense,
            u_ref,
        })
    }

    /// Builds a map from its parts.
    #[must_use]
    pub fn from_parts(surface: FaceSurface, same_sense: bool, u_ref: f64) -> Self {
        Self {
            surface,
            same_sense,
            u_ref,
        }
    }

    /// The underlying surface.
    #[must_use]
    pub fn surface(&self) -> &FaceSurface {
        &self.surface
    }

    /// Whether the face normal agrees with the surface normal.
    #[must_use]
    pub fn same_sense(&self) -> bool {
        self.same_sense
    }

    /// Reference angle used to unwrap cylinders.
    #[must_use]
    pub fn u_ref(&self) -> f64 {
        self.u_ref
    }

    /// Oriented UV coordinates of `point`.
    #[must_use]
    pub fn to_uv(&self, point: &Point3) -> Point2 {
        let (u, v) = match &self.surface {
            FaceSurface::Plane(_) => self.surface.project(point),
            FaceSurface::Cylinder(cyl) => cyl.project_near(point, self.u_ref),
        };
        if self.same_sense {
            Point2::new(u, v)
        } else {
            Point2::new(u, -v)
        }
    }

    /// Surface point at oriented UV coordinates.
    #[must_use]
    pub fn to_point(&self, uv: &Point2) -> Point3 {
        let v = if self.same_sense { uv.y } else { -uv.y };
        self.surface.evaluate(uv.x, v)
    }

    /// Outward face normal at oriented UV coordinates.
    #[must_use]
    pub fn normal_at_uv(&self, uv: &Point2) -> Vector3 {
        let v = if self.same_sense { uv.y } else { -uv.y };
        let n = self.surface.normal(uv.x, v);
        if self.same_sense {
            n
        } else {
            -n
        }
    }

    /// Points of an oriented edge in traversal order, mapped to UV.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge is missing.
    pub fn edge_uv(&self, store: &TopologyStore, oe: &OrientedEdge) -> Result<Vec<Point2>> {
        let mut pts: Vec<Point2> = store.edge(oe.edge)?.sample().iter().map(|p| self.to_uv(p)).collect();
        if !oe.forward {
            pts.reverse();
        }
        Ok(pts)
    }

    /// A closed wire as a UV polygon (no repeated closing point).
    ///
    /// # Errors
    ///
    /// Returns an error if the wire or its edges are missing.
    pub fn wire_uv(&self, store: &TopologyStore, wire: WireId) -> Result<Vec<Point2>> {
        let mut out = Vec::new();
        for oe in &store.wire(wire)?.edges {
            let pts = self.edge_uv(store, oe)?;
            out.extend_from_slice(&pts[..pts.len().saturating_sub(1)]);
        }
        Ok(out)
    }
}

/// UV polygons of every wire of a face, outer first.
///
/// # Errors
///
/// Returns an error if the face or its boundary is missing.
pub fn face_loops_uv(store: &TopologyStore, face: FaceId, uv: &FaceUv) -> Result<Vec<Vec<Point2>>> {
    store
        .face(face)?
        .wires()
        .map(|w| uv.wire_uv(store, w))
        .collect()
}

/// A point strictly inside the face, away from its boundary.
///
/// # Errors
///
/// Returns an error if the face or its boundary is missing.
pub fn face_interior_point(store: &TopologyStore, face: FaceId) -> Result<Option<Point3>> {
    let uv = FaceUv::new(store, face)?;
    let loops = face_loops_uv(store, face, &uv)?;
    Ok(interior_point_2d(&loops).map(|p| uv.to_point(&p)))
}

/// Position of a point relative to a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceLocation {
    Inside,
    OnBoundary,
    Outside,
}

/// Point-in-face tester detached from the store.
#[derive(Debug, Clone)]
pub struct FaceLocator {
    uv: FaceUv,
    loops: Vec<Vec<Point2>>,
    boundary: Vec<EdgeData>,
}

impl FaceLocator {
    /// Snapshots the face geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the face or its boundary is missing.
    pub fn new(store: &TopologyStore, face: FaceId) -> Result<Self> {
        let uv = FaceUv::new(store, face)?;
        let loops = face_loops_uv(store, face, &uv)?;
        let mut boundary = Vec::new();
        for wire in store.face(face)?.wires() {
            for oe in &store.wire(wire)?.edges {
                boundary.push(store.edge(oe.edge)?.clone());
            }
        }
        Ok(Self { uv, loops, boundary })
    }

    /// The face's UV map.
    #[must_use]
    pub fn uv(&self) -> &FaceUv {
        &self.uv
    }

    /// The face's UV loops, outer first.
    #[must_use]
    pub fn loops(&self) -> &[Vec<Point2>] {
        &self.loops
    }

    /// Distance from `point` to the face boundary.
    #[must_use]
    pub fn boundary_distance(&self, point: &Point3) -> f64 {
        self.boundary
            .iter()
            .map(|e| e.project(point).1)
            .fold(f64::INFINITY, f64::min)
    }

    /// Locates a point that lies on the face's surface within `tol`.
    #[must_use]
    pub fn locate(&self, point: &Point3, tol: f64) -> FaceLocation {
        if self.uv.surface().signed_distance(point).abs() > tol {
            return FaceLocation::Outside;
        }
        if self.boundary_distance(point) <= tol {
            return FaceLocation::OnBoundary;
        }
        let q = self.uv.to_uv(point);
        let winding: i32 = self.loops.iter().map(|l| winding_number_2d(&q, l)).sum();
        if winding > 0 {
            FaceLocation::Inside
        } else {
            FaceLocation::Outside
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::polygon_2d::signed_area_2d;
    use crate::operations::creation::{MakeBox, MakeCylinder};
    use crate::topology::explore::faces_of;
    use crate::topology::Shape;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn outer_loops_are_counter_clockwise() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 1.0, Vector3::z(), 2.0)
            .execute(&mut store)
            .unwrap();
        let boxed = MakeBox::new(p(3.0, 0.0, 0.0), p(4.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        for shape in [Shape::Solid(solid), Shape::Solid(boxed)] {
            for face in faces_of(&store, shape).unwrap() {
                let uv = FaceUv::new(&store, face).unwrap();
                let loops = face_loops_uv(&store, face, &uv).unwrap();
                assert!(signed_area_2d(&loops[0]) > 0.0);
            }
        }
    }

    #[test]
    fn locator_on_box_face() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        let bottom = faces_of(&store, Shape::Solid(solid))
            .unwrap()
            .into_iter()
            .find(|&f| {
                let n = store.face(f).unwrap().normal_at(&p(0.5, 0.5, 0.0));
                n.z < -0.5
            })
            .unwrap();
        let loc = FaceLocator::new(&store, bottom).unwrap();
        assert_eq!(loc.locate(&p(0.5, 0.5, 0.0), 1e-7), FaceLocation::Inside);
        assert_eq!(loc.locate(&p(1.0, 0.5, 0.0), 1e-7), FaceLocation::OnBoundary);
        assert_eq!(loc.locate(&p(1.5, 0.5, 0.0), 1e-7), FaceLocation::Outside);
        assert_eq!(loc.locate(&p(0.5, 0.5, 0.3), 1e-7), FaceLocation::Outside);
    }

    #[test]
    fn interior_point_of_cylinder_face_lies_on_it() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 2.0, Vector3::z(), 3.0)
            .execute(&mut store)
            .unwrap();
        for face in faces_of(&store, Shape::Solid(solid)).unwrap() {
            let q = face_interior_point(&store, face).unwrap().unwrap();
            let loc = FaceLocator::new(&store, face).unwrap();
            assert_eq!(loc.locate(&q, 1e-7), FaceLocation::Inside);
        }
    }
}
