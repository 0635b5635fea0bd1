//! Intersection data structure shared by every phase of the pave filler.
//!
//! Every sub-shape of both operands gets a stable [`ShapeIndex`] with its
//! rank and bounding box. Pairwise interferences, per-edge paves, per-face
//! extras and section curves are appended here; nothing is ever removed.
//! Input entities are never mutated: vertex unification goes through the
//! image map and tolerance growth of input vertices through the effective
//! tolerance map.

use std::collections::{HashMap, HashSet};

use crate::math::aabb::Aabb;
use crate::math::Point3;
use crate::topology::{EdgeCurve, EdgeId, FaceId, Shape, VertexId};

/// Operand a shape belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    A,
    B,
}

impl Rank {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeIndex(pub usize);

#[derive(Debug, Clone)]
pub struct ShapeInfo {
    pub shape: Shape,
    pub rank: Rank,
    pub bbox: Aabb,
    /// Created during the operation rather than taken from an operand.
    pub derived: bool,
}

/// Where an intersection lies on one of the two interfering shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubParam {
    Vertex,
    Edge(f64),
    EdgeRange(f64, f64),
    Face(f64, f64),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Point,
    Curve,
}

/// One interference between two indexed shapes.
#[derive(Debug, Clone)]
pub struct IntersectionRecord {
    pub location: Point3,
    pub param_a: SubParam,
    pub param_b: SubParam,
    pub kind: RecordKind,
    pub tolerance: f64,
    /// Vertex or edge that realises the interference, when one exists.
    pub entity: Option<Shape>,
}

/// An interference between two sub-shapes of the operands.
#[derive(Debug, Clone)]
pub struct Interference {
    /// Lower-indexed shape first; `record.param_a` describes `shapes[0]`.
    pub shapes: [Shape; 2],
    pub record: IntersectionRecord,
}

/// A vertex at a parameter of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pave {
    pub vertex: VertexId,
    pub param: f64,
}

/// A trimmed piece of a face/face intersection curve, bounded by vertices.
#[derive(Debug, Clone)]
pub struct SectionCurve {
    pub curve: EdgeCurve,
    pub t_start: f64,
    pub t_end: f64,
    pub start: VertexId,
    pub end: VertexId,
    pub tolerance: f64,
    /// Faces the piece runs through the interior of.
    pub faces: Vec<FaceId>,
}

/// Extra topology found on a face by the vertex/face and edge/face phases.
#[derive(Debug, Clone, Default)]
pub struct FaceInfo {
    pub on_vertices: Vec<VertexId>,
    /// Edges of the other operand lying on the face's surface.
    pub in_edges: Vec<EdgeId>,
}

#[derive(Debug, Default)]
pub struct IntersectionDS {
    shapes: Vec<ShapeInfo>,
    index: HashMap<Shape, ShapeIndex>,
    interferences: HashMap<(ShapeIndex, ShapeIndex), Vec<IntersectionRecord>>,
    paves: HashMap<EdgeId, Vec<Pave>>,
    face_info: HashMap<FaceId, FaceInfo>,
    sections: Vec<SectionCurve>,
    same_domain: Vec<(FaceId, FaceId)>,
    vertex_images: HashMap<VertexId, VertexId>,
    tolerances: HashMap<VertexId, f64>,
    generated: Vec<(Shape, Shape)>,
    degenerate: HashSet<EdgeId>,
}

impl IntersectionDS {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes an operand sub-shape. A shape already indexed keeps its
    /// first index and rank.
    pub fn add_shape(&mut self, shape: Shape, rank: Rank, bbox: Aabb) -> ShapeIndex {
        self.insert(shape, rank, bbox, false)
    }

    /// Indexes a shape created during the operation.
    pub fn add_derived(&mut self, shape: Shape, rank: Rank) -> ShapeIndex {
        self.insert(shape, rank, Aabb::empty(), true)
    }

    fn insert(&mut self, shape: Shape, rank: Rank, bbox: Aabb, derived: bool) -> ShapeIndex {
        if let Some(&idx) = self.index.get(&shape) {
            return idx;
        }
        let idx = ShapeIndex(self.shapes.len());
        self.shapes.push(ShapeInfo {
            shape,
            rank,
            bbox,
            derived,
        });
        self.index.insert(shape, idx);
        idx
    }

    #[must_use]
    pub fn index(&self, shape: Shape) -> Option<ShapeIndex> {
        self.index.get(&shape).copied()
    }

    #[must_use]
    pub fn info(&self, idx: ShapeIndex) -> &ShapeInfo {
        &self.shapes[idx.0]
    }

    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Original (non-derived) shapes, in index order.
    pub fn originals(&self) -> impl Iterator<Item = &ShapeInfo> {
        self.shapes.iter().filter(|s| !s.derived)
    }

    /// Every interference, ordered by the indices of its pair, with
    /// `param_a` describing the shape of lower index.
    #[must_use]
    pub fn all_interferences(&self) -> Vec<Interference> {
        let mut pairs: Vec<_> = self.interferences.iter().collect();
        pairs.sort_by_key(|entry| *entry.0);
        pairs
            .into_iter()
            .flat_map(|(&(i, j), records)| {
                records.iter().map(move |record| Interference {
                    shapes: [self.shapes[i.0].shape, self.shapes[j.0].shape],
                    record: record.clone(),
                })
            })
            .collect()
    }

    pub fn add_interference(&mut self, a: ShapeIndex, b: ShapeIndex, mut record: IntersectionRecord) {
        if a > b {
            std::mem::swap(&mut record.param_a, &mut record.param_b);
        }
        self.interferences
            .entry((a.min(b), a.max(b)))
            .or_default()
            .push(record);
    }

    pub fn add_pave(&mut self, edge: EdgeId, pave: Pave) {
        self.paves.entry(edge).or_default().push(pave);
    }

    /// Paves added to `edge` by the intersection phases (end paves excluded).
    #[must_use]
    pub fn paves(&self, edge: EdgeId) -> &[Pave] {
        self.paves.get(&edge).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn face_info(&self, face: FaceId) -> Option<&FaceInfo> {
        self.face_info.get(&face)
    }

    pub fn add_on_vertex(&mut self, face: FaceId, vertex: VertexId) {
        let info = self.face_info.entry(face).or_default();
        if !info.on_vertices.contains(&vertex) {
            info.on_vertices.push(vertex);
        }
    }

    pub fn add_in_edge(&mut self, face: FaceId, edge: EdgeId) {
        let info = self.face_info.entry(face).or_default();
        if !info.in_edges.contains(&edge) {
            info.in_edges.push(edge);
        }
    }

    pub fn face_infos(&self) -> impl Iterator<Item = (&FaceId, &FaceInfo)> {
        self.face_info.iter()
    }

    pub fn add_section(&mut self, section: SectionCurve) {
        self.sections.push(section);
    }

    #[must_use]
    pub fn sections(&self) -> &[SectionCurve] {
        &self.sections
    }

    pub fn add_same_domain(&mut self, a: FaceId, b: FaceId) {
        self.same_domain.push((a, b));
    }

    #[must_use]
    pub fn same_domain(&self) -> &[(FaceId, FaceId)] {
        &self.same_domain
    }

    /// Records that `vertex` is represented by `image` in the result.
    pub fn set_image(&mut self, vertex: VertexId, image: VertexId) {
        if vertex != image {
            self.vertex_images.insert(vertex, image);
        }
    }

    /// Representative of `vertex` after unification.
    #[must_use]
    pub fn resolve(&self, vertex: VertexId) -> VertexId {
        let mut v = vertex;
        while let Some(&next) = self.vertex_images.get(&v) {
            if next == v {
                break;
            }
            v = next;
        }
        v
    }

    /// Tolerance of `vertex` for this operation, never below `base`.
    #[must_use]
    pub fn tolerance(&self, vertex: VertexId, base: f64) -> f64 {
        self.tolerances.get(&vertex).map_or(base, |t| t.max(base))
    }

    pub fn grow_tolerance(&mut self, vertex: VertexId, tolerance: f64) {
        let entry = self.tolerances.entry(vertex).or_insert(tolerance);
        *entry = entry.max(tolerance);
    }

    /// Marks an input edge too short to carry geometry; it gets no split
    /// images and takes part in no further phase.
    pub fn mark_degenerate(&mut self, edge: EdgeId) {
        self.degenerate.insert(edge);
    }

    #[must_use]
    pub fn is_degenerate(&self, edge: EdgeId) -> bool {
        self.degenerate.contains(&edge)
    }

    pub fn record_generated(&mut self, source: Shape, shape: Shape) {
        self.generated.push((source, shape));
    }

    #[must_use]
    pub fn generated(&self) -> &[(Shape, Shape)] {
        &self.generated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::{TopologyStore, VertexData};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn indices_are_stable_and_unique() {
        let mut store = TopologyStore::new();
        let v = store.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        let mut ds = IntersectionDS::new();
        let i = ds.add_shape(Shape::Vertex(v), Rank::A, Aabb::empty());
        let j = ds.add_shape(Shape::Vertex(v), Rank::B, Aabb::empty());
        assert_eq!(i, j);
        assert_eq!(ds.info(i).rank, Rank::A);
        assert_eq!(ds.shape_count(), 1);
    }

    #[test]
    fn interference_params_follow_index_order() {
        let mut store = TopologyStore::new();
        let v = store.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        let w = store.add_vertex(VertexData::new(p(1.0, 0.0, 0.0)));
        let mut ds = IntersectionDS::new();
        let i = ds.add_shape(Shape::Vertex(v), Rank::A, Aabb::empty());
        let j = ds.add_derived(Shape::Vertex(w), Rank::B);
        ds.add_interference(
            j,
            i,
            IntersectionRecord {
                location: p(0.0, 0.0, 0.0),
                param_a: SubParam::Edge(0.5),
                param_b: SubParam::Vertex,
                kind: RecordKind::Point,
                tolerance: 1e-7,
                entity: None,
            },
        );
        let recs = ds.all_interferences();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].shapes, [Shape::Vertex(v), Shape::Vertex(w)]);
        assert_eq!(recs[0].record.param_a, SubParam::Vertex);
        assert_eq!(recs[0].record.param_b, SubParam::Edge(0.5));
        assert!(ds.info(j).derived);
    }

    #[test]
    fn images_resolve_transitively() {
        let mut store = TopologyStore::new();
        let a = store.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        let b = store.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        let c = store.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        let mut ds = IntersectionDS::new();
        ds.set_image(c, b);
        ds.set_image(b, a);
        assert_eq!(ds.resolve(c), a);
        assert_eq!(ds.resolve(a), a);
        ds.grow_tolerance(a, 1e-5);
        ds.grow_tolerance(a, 1e-6);
        assert!((ds.tolerance(a, 1e-7) - 1e-5).abs() < 1e-15);
    }
}
