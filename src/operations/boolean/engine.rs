use std::collections::{HashMap, HashSet};

use tracing::{debug, info_span};

use crate::error::{BooleanError, Result};
use crate::topology::explore::{edges_of, faces_of, shells_of, solids_of, sub_shapes, vertices_of, wires_of};
use crate::topology::{EdgeId, FaceId, Shape, TopologyStore, VertexId};

use super::assemble::{assemble_solids, compound_of, empty_compound, flip_face, non_manifold_edges};
use super::classify::{classify_faces, Classification};
use super::ds::{Interference, IntersectionDS};
use super::face_builder::{build_faces, SplitFaces};
use super::fill::PaveFiller;
use super::history::History;
use super::merge::merge_coplanar_faces;
use super::options::BooleanOptions;
use super::pave::{build_splits, Splits};
use super::report::Report;
use super::select::{should_keep_face, BooleanKind, KeepDecision};

/// Outcome of a Boolean operation.
#[derive(Debug)]
pub struct BooleanResult {
    /// A solid, a compound of solids, a compound of faces for non-solid
    /// operands, or a compound of edges for a section.
    pub shape: Shape,
    pub history: History,
    pub report: Report,
    /// Pairwise interferences found between the operands' sub-shapes.
    pub interferences: Vec<Interference>,
}

/// Runs a Boolean operation of `kind` between the object `a` and the
/// tool `b`.
///
/// Neither operand is modified. Faces, edges and vertices of the result
/// are new entities wherever the operation changed them and reused
/// otherwise; `history` maps every input sub-shape to its images.
///
/// # Errors
///
/// Returns [`BooleanError::NonManifoldResult`] when the selected faces of
/// two solids do not close, [`BooleanError::Cancelled`] when the token in
/// `options` is set, or a topology error for dangling references.
pub fn boolean_op(
    store: &mut TopologyStore,
    a: Shape,
    b: Shape,
    kind: BooleanKind,
    options: &BooleanOptions,
) -> Result<BooleanResult> {
    let span = info_span!("boolean", op = ?kind);
    let _guard = span.enter();
    options.check_cancel()?;

    let empty_a = faces_of(store, a)?.is_empty();
    let empty_b = faces_of(store, b)?.is_empty();
    if empty_a || empty_b {
        return trivial(store, a, b, kind, empty_a, empty_b);
    }

    // Step 1: intersect everything
    let (ds, mut report) = PaveFiller::new(store, options).perform(a, b)?;

    // Step 2: split edges into pave blocks
    let splits = build_splits(store, &ds)?;
    options.check_cancel()?;

    // Step 3: split faces along the section edges
    let split = build_faces(store, &ds, &splits, options, &mut report)?;
    options.check_cancel()?;
    debug!(faces = split.faces.len(), "faces split");

    let mut history = History::new();
    if kind == BooleanKind::Section {
        let shape = section_compound(store, &splits, &split);
        record_sub_shapes(store, &ds, &splits, shape, &mut history)?;
        for info in ds.originals() {
            if matches!(info.shape, Shape::Face(_) | Shape::Wire(_) | Shape::Shell(_) | Shape::Solid(_)) {
                history.record_removed(info.shape);
            }
        }
        record_generated(&ds, &splits, store, shape, &mut history)?;
        debug!(edges = edges_of(store, shape)?.len(), "section built");
        return Ok(BooleanResult {
            shape,
            history,
            report,
            interferences: ds.all_interferences(),
        });
    }

    // Step 4: classify each split face against the other operand
    let classes = classify_faces(store, &ds, &splits, &split, [a, b], options, &mut report)?;
    options.check_cancel()?;

    // Step 5: select
    let mut kept = Vec::new();
    let mut finals: HashMap<FaceId, FaceId> = HashMap::new();
    for (sf, &state) in split.faces.iter().zip(&classes.states) {
        match should_keep_face(sf.rank, state, kind) {
            KeepDecision::Keep => {
                finals.insert(sf.face, sf.face);
                kept.push(sf.face);
            }
            KeepDecision::KeepFlipped => {
                let flipped = flip_face(store, sf.face)?;
                finals.insert(sf.face, flipped);
                kept.push(flipped);
            }
            KeepDecision::Discard => {}
        }
    }
    debug!(kept = kept.len(), "faces selected");
    record_faces(&ds, &split, &classes, &finals, &mut history);

    // Step 6: assemble
    let solid_operands = !solids_of(store, a)?.is_empty() && !solids_of(store, b)?.is_empty();
    let shape = if solid_operands {
        let bad = non_manifold_edges(store, &kept)?;
        if !bad.is_empty() {
            debug!(edges = bad.len(), "selected faces do not close");
            return Err(BooleanError::NonManifoldResult {
                edges: bad,
                history: Box::new(history),
            }
            .into());
        }
        let assembly = assemble_solids(store, &kept, &mut report)?;
        for (&old, &new) in &assembly.flipped {
            history.replace(Shape::Face(old), Shape::Face(new));
        }
        assembly.shape
    } else if kept.is_empty() {
        empty_compound(store)
    } else {
        compound_of(store, kept.into_iter().map(Shape::Face).collect())
    };

    record_sub_shapes(store, &ds, &splits, shape, &mut history)?;
    record_wires(store, &ds, &mut history)?;
    record_containers(store, &ds, shape, &mut history)?;
    record_generated(&ds, &splits, store, shape, &mut history)?;

    // Step 7: optional coplanar merge
    let mut shape = shape;
    if options.merge_coplanar {
        let outcome = merge_coplanar_faces(store, shape)?;
        for (old, new) in outcome.replaced {
            history.replace(old, new);
        }
        for old in outcome.forgotten {
            history.forget(old);
        }
        if let Some(merged) = outcome.shape {
            shape = merged;
        }
    }

    debug!(faces = faces_of(store, shape)?.len(), "boolean done");
    Ok(BooleanResult {
        shape,
        history,
        report,
        interferences: ds.all_interferences(),
    })
}

/// Operations with an operand that has no faces.
fn trivial(
    store: &mut TopologyStore,
    a: Shape,
    b: Shape,
    kind: BooleanKind,
    empty_a: bool,
    empty_b: bool,
) -> Result<BooleanResult> {
    let mut history = History::new();
    let survivor = match kind {
        BooleanKind::Union | BooleanKind::Cut if empty_b => Some(a),
        BooleanKind::Union if empty_a => Some(b),
        _ => None,
    };
    let shape = survivor.unwrap_or_else(|| empty_compound(store));
    debug!(?survivor, "operand without faces");
    for operand in [a, b] {
        let kept = Some(operand) == survivor;
        for s in sub_shapes(store, operand)? {
            if kept {
                history.record_kept(s);
            } else if history.evolution(s).is_none() {
                history.record_removed(s);
            }
        }
    }
    Ok(BooleanResult {
        shape,
        history,
        report: Report::default(),
        interferences: Vec::new(),
    })
}

/// Section edges plus the edges bounding coinciding faces.
fn section_compound(store: &mut TopologyStore, splits: &Splits, split: &SplitFaces) -> Shape {
    let mut edges: Vec<EdgeId> = splits.section_edges.iter().copied().collect();
    let mut on_edges: HashMap<&[EdgeId], [bool; 2]> = HashMap::new();
    for sf in &split.faces {
        on_edges.entry(sf.edges.as_slice()).or_default()[sf.rank as usize] = true;
    }
    for (face_edges, ranks) in on_edges {
        if ranks[0] && ranks[1] {
            edges.extend(face_edges.iter().copied().filter(|&e| splits.is_shared(e)));
        }
    }
    edges.sort_unstable();
    edges.dedup();
    compound_of(store, edges.into_iter().map(Shape::Edge).collect())
}

/// Face history from the selection: each original face maps to the kept
/// images of its pieces. A tool face coinciding with an object face maps
/// to the object face's image.
fn record_faces(
    ds: &IntersectionDS,
    split: &SplitFaces,
    classes: &Classification,
    finals: &HashMap<FaceId, FaceId>,
    history: &mut History,
) {
    for info in ds.originals() {
        let Shape::Face(face) = info.shape else {
            continue;
        };
        let mut images = Vec::new();
        for piece in split.images.get(&face).into_iter().flatten() {
            let image = finals
                .get(piece)
                .or_else(|| classes.twins.get(piece).and_then(|twin| finals.get(twin)));
            if let Some(&image) = image {
                if !images.contains(&Shape::Face(image)) {
                    images.push(Shape::Face(image));
                }
            }
        }
        history.record_modified(info.shape, images);
    }
}

/// Vertex and edge history, restricted to what survives in `result`.
fn record_sub_shapes(
    store: &TopologyStore,
    ds: &IntersectionDS,
    splits: &Splits,
    result: Shape,
    history: &mut History,
) -> Result<()> {
    let edges: HashSet<EdgeId> = edges_of(store, result)?.into_iter().collect();
    let vertices: HashSet<VertexId> = vertices_of(store, result)?.into_iter().collect();
    for info in ds.originals() {
        match info.shape {
            Shape::Vertex(v) => {
                let image = ds.resolve(v);
                let images = if vertices.contains(&image) {
                    vec![Shape::Vertex(image)]
                } else {
                    Vec::new()
                };
                history.record_modified(info.shape, images);
            }
            Shape::Edge(e) => {
                let images = splits
                    .images(e)
                    .iter()
                    .filter(|(image, _)| edges.contains(image))
                    .map(|&(image, _)| Shape::Edge(image))
                    .collect();
                history.record_modified(info.shape, images);
            }
            _ => {}
        }
    }
    Ok(())
}

/// Wires follow their faces.
fn record_wires(store: &TopologyStore, ds: &IntersectionDS, history: &mut History) -> Result<()> {
    for info in ds.originals() {
        let Shape::Face(face) = info.shape else {
            continue;
        };
        let images = history.images(info.shape);
        let unchanged = images == [info.shape];
        let mut wire_images = Vec::new();
        for image in images {
            wire_images.extend(wires_of(store, image)?.into_iter().map(Shape::Wire));
        }
        for wire in store.face(face)?.wires() {
            if unchanged {
                history.record_kept(Shape::Wire(wire));
            } else {
                history.record_modified(Shape::Wire(wire), wire_images.clone());
            }
        }
    }
    Ok(())
}

/// Shells and solids of an operand map to the result's shells and solids
/// when any of their faces survived.
fn record_containers(store: &TopologyStore, ds: &IntersectionDS, result: Shape, history: &mut History) -> Result<()> {
    let result_shells: Vec<Shape> = shells_of(store, result)?.into_iter().map(Shape::Shell).collect();
    let result_solids: Vec<Shape> = solids_of(store, result)?.into_iter().map(Shape::Solid).collect();
    for info in ds.originals() {
        let images = match info.shape {
            Shape::Shell(_) => &result_shells,
            Shape::Solid(_) => &result_solids,
            _ => continue,
        };
        let mut survived = false;
        for face in faces_of(store, info.shape)? {
            if !history.images(Shape::Face(face)).is_empty() {
                survived = true;
                break;
            }
        }
        if survived {
            history.record_modified(info.shape, images.clone());
        } else {
            history.record_removed(info.shape);
        }
    }
    Ok(())
}

/// New vertices from the filler and section edges through each face.
fn record_generated(
    ds: &IntersectionDS,
    splits: &Splits,
    store: &TopologyStore,
    result: Shape,
    history: &mut History,
) -> Result<()> {
    let edges: HashSet<EdgeId> = edges_of(store, result)?.into_iter().collect();
    let vertices: HashSet<VertexId> = vertices_of(store, result)?.into_iter().collect();
    for &(source, generated) in ds.generated() {
        if let Shape::Vertex(v) = generated {
            let v = ds.resolve(v);
            if vertices.contains(&v) {
                history.record_generated(source, Shape::Vertex(v));
            }
        }
    }
    for (edge, faces) in &splits.sections {
        if !edges.contains(edge) {
            continue;
        }
        for &face in faces {
            history.record_generated(Shape::Face(face), Shape::Edge(*edge));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::boolean::ds::{RecordKind, SubParam};
    use crate::operations::boolean::history::Evolution;
    use crate::operations::boolean::CancelToken;
    use crate::operations::creation::MakeBox;
    use crate::topology::CompoundData;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn cube(store: &mut TopologyStore, min: Point3, max: Point3) -> Shape {
        Shape::Solid(MakeBox::new(min, max).execute(store).unwrap())
    }

    #[test]
    fn disjoint_union_keeps_every_face() {
        let mut store = TopologyStore::new();
        let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        let b = cube(&mut store, p(3.0, 0.0, 0.0), p(4.0, 1.0, 1.0));
        let result = boolean_op(&mut store, a, b, BooleanKind::Union, &BooleanOptions::default()).unwrap();
        assert_eq!(faces_of(&store, result.shape).unwrap().len(), 12);
        assert_eq!(solids_of(&store, result.shape).unwrap().len(), 2);
        for face in faces_of(&store, a).unwrap() {
            assert_eq!(result.history.evolution(Shape::Face(face)), Some(&Evolution::Kept));
        }
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let mut store = TopologyStore::new();
        let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        let b = cube(&mut store, p(3.0, 0.0, 0.0), p(4.0, 1.0, 1.0));
        let result = boolean_op(&mut store, a, b, BooleanKind::Intersection, &BooleanOptions::default()).unwrap();
        assert!(faces_of(&store, result.shape).unwrap().is_empty());
        assert!(result.history.is_removed(a));
        assert!(result.interferences.is_empty());
    }

    #[test]
    fn result_lists_vertex_edge_interferences() {
        let mut store = TopologyStore::new();
        let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        let b = cube(&mut store, p(0.5, 0.0, 0.0), p(1.5, 1.0, 1.0));
        let result = boolean_op(&mut store, a, b, BooleanKind::Union, &BooleanOptions::default()).unwrap();
        let on_edges: Vec<&Interference> = result
            .interferences
            .iter()
            .filter(|i| matches!(i.shapes, [Shape::Vertex(_), Shape::Edge(_)] | [Shape::Edge(_), Shape::Vertex(_)]))
            .collect();
        // each box has four corners on the other's edges
        assert_eq!(on_edges.len(), 8);
        for i in on_edges {
            let (vertex_side, edge_side) = if matches!(i.shapes[0], Shape::Vertex(_)) {
                (i.record.param_a, i.record.param_b)
            } else {
                (i.record.param_b, i.record.param_a)
            };
            assert_eq!(vertex_side, SubParam::Vertex);
            assert!(matches!(edge_side, SubParam::Edge(t) if (0.0..=1.0).contains(&t)));
            assert_eq!(i.record.kind, RecordKind::Point);
            assert!(i.record.entity.is_some_and(|e| i.shapes.contains(&e)));
        }
    }

    #[test]
    fn cut_with_empty_tool_returns_the_object() {
        let mut store = TopologyStore::new();
        let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
        let empty = Shape::Compound(store.add_compound(CompoundData { shapes: Vec::new() }));
        let result = boolean_op(&mut store, a, empty, BooleanKind::Cut, &BooleanOptions::default()).unwrap();
        assert_eq!(result.shape, a);
        assert_eq!(result.history.evolution(a), Some(&Evolution::Kept));
    }

    #[test]
    fn cut_records_generated_section_edges() {
        let mut store = TopologyStore::new();
        let a = cube(&mut store, p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        let b = cube(&mut store, p(1.0, 1.0, 1.0), p(3.0, 3.0, 3.0));
        let result = boolean_op(&mut store, a, b, BooleanKind::Cut, &BooleanOptions::default()).unwrap();
        let generated: usize = faces_of(&store, a)
            .unwrap()
            .into_iter()
            .map(|f| result.history.generated(Shape::Face(f)).len())
            .sum();
        assert!(generated > 0);
        for face in faces_of(&store, result.shape).unwrap() {
            assert!(store.face(face).is_ok());
        }
    }

    #[test]
    fn cancelled_token_stops_the_operation() {
        let mut store = TopologyStore::new();
        let a = cube(&mut store, p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        let b = cube(&mut store, p(1.0, 1.0, 1.0), p(3.0, 3.0, 3.0));
        let token = CancelToken::new();
        token.cancel();
        let options = BooleanOptions::default().with_cancel(token);
        let err = boolean_op(&mut store, a, b, BooleanKind::Union, &options).unwrap_err();
        assert!(matches!(err, crate::error::BrepError::Boolean(BooleanError::Cancelled)));
    }
}
