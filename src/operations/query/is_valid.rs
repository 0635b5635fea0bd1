use std::collections::HashMap;

use crate::error::Result;
use crate::topology::explore::{face_oriented_edges, faces_of, oriented_ends, shells_of};
use crate::topology::{FaceId, Shape, TopologyStore};

/// Validates the topological consistency of a shape.
///
/// Every wire must be a connected closed loop, and every shell marked closed
/// must use each of its edges exactly twice with opposite orientations.
pub struct IsValid {
    shape: Shape,
}

impl IsValid {
    /// Creates a new `IsValid` query.
    #[must_use]
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self { shape: shape.into() }
    }

    /// Executes the validation, returning `true` if the shape is valid.
    #[must_use]
    pub fn execute(&self, store: &TopologyStore) -> bool {
        self.check(store).unwrap_or(false)
    }

    fn check(&self, store: &TopologyStore) -> Result<bool> {
        for face in faces_of(store, self.shape)? {
            if !wires_closed(store, face)? {
                return Ok(false);
            }
        }
        let mut shells = shells_of(store, self.shape)?;
        if matches!(self.shape, Shape::Solid(_)) && shells.is_empty() {
            return Ok(false);
        }
        shells.retain(|&s| store.shell(s).is_ok_and(|d| d.is_closed));
        for shell in shells {
            let mut uses: HashMap<_, (u32, u32)> = HashMap::new();
            for &face in &store.shell(shell)?.faces {
                for oe in face_oriented_edges(store, face)? {
                    let entry = uses.entry(oe.edge).or_default();
                    if oe.forward {
                        entry.0 += 1;
                    } else {
                        entry.1 += 1;
                    }
                }
            }
            if uses.values().any(|&(f, r)| f != 1 || r != 1) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn wires_closed(store: &TopologyStore, face: FaceId) -> Result<bool> {
    for wire in store.face(face)?.wires() {
        let data = store.wire(wire)?;
        if !data.is_closed || data.edges.is_empty() {
            return Ok(false);
        }
        let n = data.edges.len();
        for i in 0..n {
            let (_, end) = oriented_ends(store, &data.edges[i])?;
            let (start, _) = oriented_ends(store, &data.edges[(i + 1) % n])?;
            if end != start {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::{MakeBox, MakeShell};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn box_is_valid() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        assert!(IsValid::new(solid).execute(&store));
    }

    #[test]
    fn shell_missing_a_face_is_open() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        let mut faces = faces_of(&store, Shape::Solid(solid)).unwrap();
        faces.pop();
        let shell = MakeShell::new(faces).execute(&mut store).unwrap();
        assert!(!store.shell(shell).unwrap().is_closed);
        // open shells are only checked for wire closure
        assert!(IsValid::new(shell).execute(&store));
    }

    #[test]
    fn missing_entity_is_invalid() {
        let store = TopologyStore::new();
        let mut other = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut other)
            .unwrap();
        assert!(!IsValid::new(solid).execute(&store));
    }
}
