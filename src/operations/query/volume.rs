use std::f64::consts::PI;

use crate::error::Result;
use crate::math::polygon_2d::bounds_2d;
use crate::math::triangulate::triangulate_loops;
use crate::math::Point2;
use crate::topology::explore::faces_of;
use crate::topology::face_uv::{face_loops_uv, FaceUv};
use crate::topology::{FaceId, FaceSurface, Shape, TopologyStore};

/// Computes the enclosed volume of a shape.
///
/// Each face is triangulated in its oriented parameter plane and the signed
/// tetrahedron volumes `(1/6) * v0 . (v1 x v2)` of the lifted triangles are
/// summed (divergence theorem). Curved faces receive interior sample points
/// so the lifted triangles follow the surface.
pub struct Volume {
    shape: Shape,
}

impl Volume {
    /// Creates a new `Volume` query.
    #[must_use]
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self { shape: shape.into() }
    }

    /// Executes the query, returning the volume (absolute value).
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be triangulated.
    pub fn execute(&self, store: &TopologyStore) -> Result<f64> {
        let faces = faces_of(store, self.shape)?;
        Ok(signed_volume(store, &faces)?.abs())
    }
}

/// Signed volume enclosed by `faces`; positive when their normals point
/// outwards.
///
/// # Errors
///
/// Returns an error if a face cannot be triangulated.
pub fn signed_volume(store: &TopologyStore, faces: &[FaceId]) -> Result<f64> {
    let mut total = 0.0;
    for &face in faces {
        total += face_flux(store, face)?;
    }
    Ok(total)
}

fn face_flux(store: &TopologyStore, face: FaceId) -> Result<f64> {
    let uv = FaceUv::new(store, face)?;
    let loops = face_loops_uv(store, face, &uv)?;
    let steiner = match uv.surface() {
        FaceSurface::Plane(_) => Vec::new(),
        FaceSurface::Cylinder(_) => surface_samples(&loops),
    };

    let mut sum = 0.0;
    for tri in triangulate_loops(&loops, &steiner)? {
        let [a, b, c] = tri.map(|q| uv.to_point(&q));
        sum += a.coords.dot(&b.coords.cross(&c.coords));
    }
    Ok(sum / 6.0)
}

/// Jittered grid over the loops' bounds, dense enough in `u` to follow the
/// curvature of a cylinder.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn surface_samples(loops: &[Vec<Point2>]) -> Vec<Point2> {
    let Some(outer) = loops.first() else {
        return Vec::new();
    };
    let (lo, hi) = bounds_2d(outer);
    let size = hi - lo;
    let nu = ((size.x / (PI / 32.0)).ceil() as usize).clamp(1, 512);
    let nv = 8usize;
    let mut out = Vec::with_capacity(nu * nv);
    for i in 0..nu {
        for j in 0..nv {
            let fu = (i as f64 + 0.5 + 0.013 * ((j % 3) as f64)) / nu as f64;
            let fv = (j as f64 + 0.5 + 0.017 * ((i % 5) as f64)) / nv as f64;
            out.push(Point2::new(lo.x + size.x * fu, lo.y + size.y * fv));
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vector3};
    use crate::operations::creation::{MakeBox, MakeCylinder};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn box_volume() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(2.0, 3.0, 4.0))
            .execute(&mut store)
            .unwrap();
        let volume = Volume::new(solid).execute(&store).unwrap();
        assert!((volume - 24.0).abs() < 1e-9, "expected 24.0, got {volume}");
        let faces = faces_of(&store, Shape::Solid(solid)).unwrap();
        assert!(signed_volume(&store, &faces).unwrap() > 0.0);
    }

    #[test]
    fn cylinder_volume() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(1.0, -1.0, 0.5), 2.0, Vector3::new(1.0, 1.0, 0.0), 5.0)
            .execute(&mut store)
            .unwrap();
        let volume = Volume::new(solid).execute(&store).unwrap();
        let expected = 20.0 * PI;
        assert!(
            (volume - expected).abs() < expected * 0.01,
            "expected ~{expected:.2}, got {volume:.2}"
        );
    }
}
