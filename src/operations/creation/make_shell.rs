use std::collections::HashMap;

use crate::error::{OperationError, Result};
use crate::topology::explore::face_oriented_edges;
use crate::topology::{FaceId, ShellData, ShellId, TopologyStore};

/// Creates a shell from faces.
///
/// The shell is marked closed when every edge is used by exactly two of
/// its faces, once in each direction.
pub struct MakeShell {
    faces: Vec<FaceId>,
}

impl MakeShell {
    /// Creates a new `MakeShell` operation.
    #[must_use]
    pub fn new(faces: Vec<FaceId>) -> Self {
        Self { faces }
    }

    /// Executes the operation, creating the shell in the topology store.
    ///
    /// # Errors
    ///
    /// Returns an error if the face list is empty or a face is missing.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<ShellId> {
        if self.faces.is_empty() {
            return Err(OperationError::InvalidInput("shell needs at least one face".into()).into());
        }
        let mut uses: HashMap<_, (u32, u32)> = HashMap::new();
        for &face in &self.faces {
            for oe in face_oriented_edges(store, face)? {
                let entry = uses.entry(oe.edge).or_default();
                if oe.forward {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }
        let is_closed = uses.values().all(|&(f, r)| f == 1 && r == 1);
        Ok(store.add_shell(ShellData {
            faces: self.faces.clone(),
            is_closed,
        }))
    }
}
