use crate::error::{OperationError, Result};
use crate::math::{Point3, Vector3};
use crate::operations::shaping::extrude_loops;
use crate::topology::{SolidId, TopologyStore};

/// Creates an axis-aligned box solid from two corner points.
///
/// The box has 8 vertices, 12 edges and 6 planar faces, all shared.
pub struct MakeBox {
    min_corner: Point3,
    max_corner: Point3,
}

impl MakeBox {
    /// Creates a new `MakeBox` operation.
    #[must_use]
    pub fn new(min_corner: Point3, max_corner: Point3) -> Self {
        Self {
            min_corner,
            max_corner,
        }
    }

    /// Executes the operation, creating the box in the topology store.
    ///
    /// # Errors
    ///
    /// Returns an error if the box has no extent along some axis.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<SolidId> {
        let lo = self.min_corner.inf(&self.max_corner);
        let hi = self.min_corner.sup(&self.max_corner);
        let size = hi - lo;
        if size.min() <= crate::math::tolerance::CONFUSION {
            return Err(OperationError::InvalidInput("box has zero extent".into()).into());
        }
        let base = vec![
            lo,
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
        ];
        extrude_loops(store, &[base], &Vector3::new(0.0, 0.0, size.z))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::query::{BoundingBox, IsValid, Volume};
    use crate::topology::Shape;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn unit_box_is_valid() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 2.0, 3.0))
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        assert!(IsValid::new(shape).execute(&store));
        let volume = Volume::new(shape).execute(&store).unwrap();
        assert!((volume - 6.0).abs() < 1e-9);
        let aabb = BoundingBox::new(shape).execute(&store).unwrap();
        assert!((aabb.max - p(1.0, 2.0, 3.0)).norm() < 1e-6);
    }

    #[test]
    fn corners_in_any_order() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(1.0, 1.0, 1.0), p(0.0, 0.0, 0.0))
            .execute(&mut store)
            .unwrap();
        let volume = Volume::new(Shape::Solid(solid)).execute(&store).unwrap();
        assert!((volume - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_box_fails() {
        let mut store = TopologyStore::new();
        assert!(MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0)).execute(&mut store).is_err());
    }
}
