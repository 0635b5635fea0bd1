use crate::error::{OperationError, Result, TopologyError};
use crate::geometry::surface::Plane;
use crate::math::tolerance::CONFUSION;
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::topology::{FaceData, FaceId, FaceSurface, TopologyStore, WireId};

/// Creates a face from a wire boundary and a surface.
///
/// Without an explicit surface the outer wire must be planar; the plane is
/// fitted so that the wire runs counter-clockwise around its normal.
pub struct MakeFace {
    outer_wire: WireId,
    inner_wires: Vec<WireId>,
    surface: Option<(FaceSurface, bool)>,
}

impl MakeFace {
    /// Creates a new `MakeFace` operation.
    #[must_use]
    pub fn new(outer_wire: WireId, inner_wires: Vec<WireId>) -> Self {
        Self {
            outer_wire,
            inner_wires,
            surface: None,
        }
    }

    /// Creates a face on a given surface with the given orientation.
    #[must_use]
    pub fn on_surface(surface: FaceSurface, same_sense: bool, outer_wire: WireId, inner_wires: Vec<WireId>) -> Self {
        Self {
            outer_wire,
            inner_wires,
            surface: Some((surface, same_sense)),
        }
    }

    /// Executes the operation, creating the face in the topology store.
    ///
    /// # Errors
    ///
    /// Returns an error if a wire is open, or if no surface was given and the
    /// outer wire is degenerate or not planar.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<FaceId> {
        for wire in std::iter::once(self.outer_wire).chain(self.inner_wires.iter().copied()) {
            if !store.wire(wire)?.is_closed {
                return Err(TopologyError::WireNotClosed.into());
            }
        }

        let (surface, same_sense) = match &self.surface {
            Some((surface, same_sense)) => (surface.clone(), *same_sense),
            None => {
                let points = wire_samples(store, self.outer_wire)?;
                let normal = newell_normal(&points)?;
                let plane = Plane::from_normal(points[0], normal)?;
                let off = points
                    .iter()
                    .map(|p| (p - points[0]).dot(&normal).abs())
                    .fold(0.0, f64::max);
                if off > CONFUSION {
                    return Err(OperationError::InvalidInput(format!("wire is not planar (deviation {off:e})")).into());
                }
                (FaceSurface::Plane(plane), true)
            }
        };

        Ok(store.add_face(FaceData::new(
            surface,
            self.outer_wire,
            self.inner_wires.clone(),
            same_sense,
        )))
    }
}

/// Sample points along a wire in traversal order.
fn wire_samples(store: &TopologyStore, wire: WireId) -> Result<Vec<Point3>> {
    let mut points = Vec::new();
    for oe in &store.wire(wire)?.edges {
        let mut pts = store.edge(oe.edge)?.sample();
        if !oe.forward {
            pts.reverse();
        }
        pts.pop();
        points.extend(pts);
    }
    Ok(points)
}

/// Computes the normal of a polygon using Newell's method.
///
/// # Errors
///
/// Returns an error if the polygon has no area.
pub(crate) fn newell_normal(points: &[Point3]) -> Result<Vector3> {
    let n = points.len();
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    for i in 0..n {
        let curr = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (curr.y - next.y) * (curr.z + next.z);
        normal.y += (curr.z - next.z) * (curr.x + next.x);
        normal.z += (curr.x - next.x) * (curr.y + next.y);
    }
    let len = normal.norm();
    if len < TOLERANCE {
        return Err(
            OperationError::Failed("degenerate polygon: cannot compute normal".into()).into(),
        );
    }
    Ok(normal / len)
}
