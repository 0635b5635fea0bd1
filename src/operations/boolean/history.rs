use std::collections::HashMap;

use crate::topology::Shape;

/// What became of one input sub-shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evolution {
    /// Present in the result unchanged.
    Kept,
    /// Replaced by the listed images (split, rebuilt or merged).
    Modified(Vec<Shape>),
    /// Not present in the result.
    Removed,
}

/// Maps every input sub-shape to its fate in the result.
///
/// Entries are only ever added while the operation runs; the merge
/// post-pass rewrites images through [`History::replace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    evolution: HashMap<Shape, Evolution>,
    generated: HashMap<Shape, Vec<Shape>>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fate of `shape`, or `None` if it was not an input sub-shape.
    #[must_use]
    pub fn evolution(&self, shape: Shape) -> Option<&Evolution> {
        self.evolution.get(&shape)
    }

    /// Images of a modified shape; empty if kept, removed or unknown.
    #[must_use]
    pub fn modified(&self, shape: Shape) -> &[Shape] {
        match self.evolution.get(&shape) {
            Some(Evolution::Modified(images)) => images,
            _ => &[],
        }
    }

    /// Shapes created from `shape` that are not images of it: section
    /// edges and new vertices on a face, intersection vertices of an edge.
    #[must_use]
    pub fn generated(&self, shape: Shape) -> &[Shape] {
        self.generated.get(&shape).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_removed(&self, shape: Shape) -> bool {
        matches!(self.evolution.get(&shape), Some(Evolution::Removed))
    }

    /// Result shapes standing for `shape`: itself when kept, its images
    /// when modified, nothing when removed.
    #[must_use]
    pub fn images(&self, shape: Shape) -> Vec<Shape> {
        match self.evolution.get(&shape) {
            Some(Evolution::Kept) => vec![shape],
            Some(Evolution::Modified(images)) => images.clone(),
            _ => Vec::new(),
        }
    }

    /// Number of input sub-shapes tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.evolution.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evolution.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Shape, &Evolution)> {
        self.evolution.iter()
    }

    pub(crate) fn record_kept(&mut self, shape: Shape) {
        self.evolution.insert(shape, Evolution::Kept);
    }

    pub(crate) fn record_modified(&mut self, shape: Shape, images: Vec<Shape>) {
        if images.is_empty() {
            self.record_removed(shape);
        } else if images == [shape] {
            self.record_kept(shape);
        } else {
            self.evolution.insert(shape, Evolution::Modified(images));
        }
    }

    pub(crate) fn record_removed(&mut self, shape: Shape) {
        self.evolution.insert(shape, Evolution::Removed);
    }

    pub(crate) fn record_generated(&mut self, source: Shape, shape: Shape) {
        let list = self.generated.entry(source).or_default();
        if !list.contains(&shape) {
            list.push(shape);
        }
    }

    /// Rewrites every reference to a result shape `old` into `new`.
    ///
    /// Several old shapes may collapse into the same `new`; duplicates are
    /// removed from the image lists.
    pub(crate) fn replace(&mut self, old: Shape, new: Shape) {
        for (source, evolution) in &mut self.evolution {
            match evolution {
                Evolution::Kept if *source == old => {
                    *evolution = Evolution::Modified(vec![new]);
                }
                Evolution::Modified(images) => rewrite(images, old, new),
                _ => {}
            }
        }
        for images in self.generated.values_mut() {
            rewrite(images, old, new);
        }
    }

    /// Drops `old` from every image list, turning emptied entries into
    /// [`Evolution::Removed`].
    pub(crate) fn forget(&mut self, old: Shape) {
        for (source, evolution) in &mut self.evolution {
            match evolution {
                Evolution::Kept if *source == old => *evolution = Evolution::Removed,
                Evolution::Modified(images) => {
                    images.retain(|s| *s != old);
                    if images.is_empty() {
                        *evolution = Evolution::Removed;
                    }
                }
                _ => {}
            }
        }
        for images in self.generated.values_mut() {
            images.retain(|s| *s != old);
        }
    }
}

fn rewrite(images: &mut Vec<Shape>, old: Shape, new: Shape) {
    if !images.contains(&old) {
        return;
    }
    let mut out: Vec<Shape> = Vec::with_capacity(images.len());
    for s in images.drain(..) {
        let s = if s == old { new } else { s };
        if !out.contains(&s) {
            out.push(s);
        }
    }
    *images = out;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::topology::{TopologyStore, VertexData};

    fn vertices(n: usize) -> Vec<Shape> {
        let mut store = TopologyStore::new();
        (0..n)
            .map(|_| Shape::Vertex(store.add_vertex(VertexData::new(Point3::origin()))))
            .collect()
    }

    #[test]
    fn record_modified_normalises() {
        let v = vertices(3);
        let mut h = History::new();
        h.record_modified(v[0], vec![v[0]]);
        h.record_modified(v[1], vec![]);
        h.record_modified(v[2], vec![v[0], v[1]]);
        assert_eq!(h.evolution(v[0]), Some(&Evolution::Kept));
        assert!(h.is_removed(v[1]));
        assert_eq!(h.modified(v[2]), &[v[0], v[1]]);
        assert_eq!(h.images(v[0]), vec![v[0]]);
    }

    #[test]
    fn replace_collapses_images() {
        let v = vertices(4);
        let mut h = History::new();
        h.record_modified(v[0], vec![v[1], v[2]]);
        h.record_kept(v[1]);
        h.record_generated(v[3], v[2]);
        h.replace(v[1], v[3]);
        h.replace(v[2], v[3]);
        assert_eq!(h.modified(v[0]), &[v[3]]);
        assert_eq!(h.modified(v[1]), &[v[3]]);
        assert_eq!(h.generated(v[3]), &[v[3]]);
    }

    #[test]
    fn forget_removes_empty_entries() {
        let v = vertices(3);
        let mut h = History::new();
        h.record_modified(v[0], vec![v[1]]);
        h.record_modified(v[2], vec![v[1], v[0]]);
        h.forget(v[1]);
        assert!(h.is_removed(v[0]));
        assert_eq!(h.modified(v[2]), &[v[0]]);
    }
}
