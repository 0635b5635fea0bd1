use crate::geometry::surface::{Cylinder, Plane, Surface};
use crate::math::tolerance::CONFUSION;
use crate::math::{Point3, Vector3};

use super::wire::WireId;

slotmap::new_key_type! {
    /// Unique identifier for a face in the topology store.
    pub struct FaceId;
}

/// The geometric surface associated with a face.
#[derive(Debug, Clone)]
pub enum FaceSurface {
    /// A planar surface.
    Plane(Plane),
    /// A cylindrical surface.
    Cylinder(Cylinder),
}

impl FaceSurface {
    fn as_surface(&self) -> &dyn Surface {
        match self {
            Self::Plane(s) => s,
            Self::Cylinder(s) => s,
        }
    }

    /// Evaluates the surface at `(u, v)`.
    #[must_use]
    pub fn evaluate(&self, u: f64, v: f64) -> Point3 {
        self.as_surface().evaluate(u, v)
    }

    /// Partial derivatives at `(u, v)`.
    #[must_use]
    pub fn derivatives(&self, u: f64, v: f64) -> (Vector3, Vector3) {
        self.as_surface().derivatives(u, v)
    }

    /// Surface normal at `(u, v)`.
    #[must_use]
    pub fn normal(&self, u: f64, v: f64) -> Vector3 {
        self.as_surface().normal(u, v)
    }

    /// Parameters of the closest surface point.
    #[must_use]
    pub fn project(&self, point: &Point3) -> (f64, f64) {
        self.as_surface().project(point)
    }

    /// Signed distance, positive on the normal side.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        self.as_surface().signed_distance(point)
    }

    /// Unit gradient of the signed distance.
    #[must_use]
    pub fn gradient(&self, point: &Point3) -> Vector3 {
        self.as_surface().gradient(point)
    }

    /// Surface normal at the projection of `point`.
    #[must_use]
    pub fn normal_at(&self, point: &Point3) -> Vector3 {
        let (u, v) = self.project(point);
        self.normal(u, v)
    }

    /// Whether both surfaces describe the same point set within `tol`.
    #[must_use]
    pub fn same_domain(&self, other: &Self, tol: f64) -> bool {
        match (self, other) {
            (Self::Plane(a), Self::Plane(b)) => {
                a.plane_normal().cross(b.plane_normal()).norm() < tol.max(1e-9)
                    && a.signed_distance(b.origin()).abs() <= tol
            }
            (Self::Cylinder(a), Self::Cylinder(b)) => {
                (a.radius() - b.radius()).abs() <= tol
                    && a.axis().cross(b.axis()).norm() < tol.max(1e-9)
                    && {
                        let d = b.center() - a.center();
                        (d - a.axis() * d.dot(a.axis())).norm() <= tol
                    }
            }
            _ => false,
        }
    }
}

/// Data associated with a topological face.
///
/// A face is a bounded region on a surface, defined by an outer wire
/// and optionally inner wires (holes).
#[derive(Debug, Clone)]
pub struct FaceData {
    /// The geometric surface on which this face lies.
    pub surface: FaceSurface,
    /// The outer boundary wire.
    pub outer_wire: WireId,
    /// Inner boundary wires (holes).
    pub inner_wires: Vec<WireId>,
    /// If `true`, the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Distance within which points count as lying on the face.
    pub tolerance: f64,
}

impl FaceData {
    /// Creates a face with the default tolerance.
    #[must_use]
    pub fn new(surface: FaceSurface, outer_wire: WireId, inner_wires: Vec<WireId>, same_sense: bool) -> Self {
        Self {
            surface,
            outer_wire,
            inner_wires,
            same_sense,
            tolerance: CONFUSION,
        }
    }

    /// All wires, outer first.
    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        std::iter::once(self.outer_wire).chain(self.inner_wires.iter().copied())
    }

    /// Outward face normal at the projection of `point`.
    #[must_use]
    pub fn normal_at(&self, point: &Point3) -> Vector3 {
        let n = self.surface.normal_at(point);
        if self.same_sense {
            n
        } else {
            -n
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn coplanar_planes_share_domain() {
        let a = FaceSurface::Plane(Plane::from_normal(p(0.0, 0.0, 1.0), Vector3::z()).unwrap());
        let b = FaceSurface::Plane(Plane::from_normal(p(5.0, 3.0, 1.0), -Vector3::z()).unwrap());
        let c = FaceSurface::Plane(Plane::from_normal(p(0.0, 0.0, 1.5), Vector3::z()).unwrap());
        assert!(a.same_domain(&b, 1e-7));
        assert!(!a.same_domain(&c, 1e-7));
    }

    #[test]
    fn coaxial_cylinders_share_domain() {
        let a = Cylinder::new(p(0.0, 0.0, 0.0), 1.0, Vector3::z(), Vector3::x()).unwrap();
        let b = Cylinder::new(p(0.0, 0.0, 4.0), 1.0, -Vector3::z(), Vector3::y()).unwrap();
        let c = Cylinder::new(p(0.1, 0.0, 0.0), 1.0, Vector3::z(), Vector3::x()).unwrap();
        let a = FaceSurface::Cylinder(a);
        assert!(a.same_domain(&FaceSurface::Cylinder(b), 1e-7));
        assert!(!a.same_domain(&FaceSurface::Cylinder(c), 1e-7));
    }
}
