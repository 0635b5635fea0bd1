//! Traversal helpers over the topology graph.
//!
//! Every function returns entities in first-visit order without duplicates,
//! so results are deterministic for a given store.

use std::collections::HashSet;

use crate::error::Result;

use super::{EdgeId, FaceId, OrientedEdge, Shape, ShellId, SolidId, TopologyStore, VertexId, WireId};

/// Start and end vertices of an edge as traversed by `oe`.
///
/// # Errors
///
/// Returns an error if the edge is missing from the store.
pub fn oriented_ends(store: &TopologyStore, oe: &OrientedEdge) -> Result<(VertexId, VertexId)> {
    let edge = store.edge(oe.edge)?;
    Ok(if oe.forward {
        (edge.start, edge.end)
    } else {
        (edge.end, edge.start)
    })
}

/// Start vertex of every oriented edge of the wire, in order.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn wire_vertices(store: &TopologyStore, wire: WireId) -> Result<Vec<VertexId>> {
    store
        .wire(wire)?
        .edges
        .iter()
        .map(|oe| oriented_ends(store, oe).map(|(s, _)| s))
        .collect()
}

/// All oriented edges of a face, outer wire first.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn face_oriented_edges(store: &TopologyStore, face: FaceId) -> Result<Vec<OrientedEdge>> {
    let data = store.face(face)?;
    let mut out = Vec::new();
    for wire in data.wires() {
        out.extend(store.wire(wire)?.edges.iter().copied());
    }
    Ok(out)
}

/// Shells below `shape`.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn shells_of(store: &TopologyStore, shape: Shape) -> Result<Vec<ShellId>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_shells(store, shape, &mut out, &mut seen)?;
    Ok(out)
}

fn collect_shells(
    store: &TopologyStore,
    shape: Shape,
    out: &mut Vec<ShellId>,
    seen: &mut HashSet<ShellId>,
) -> Result<()> {
    match shape {
        Shape::Shell(id) => {
            if seen.insert(id) {
                out.push(id);
            }
        }
        Shape::Solid(id) => {
            for shell in store.solid(id)?.shells() {
                collect_shells(store, Shape::Shell(shell), out, seen)?;
            }
        }
        Shape::Compound(id) => {
            for &child in &store.compound(id)?.shapes {
                collect_shells(store, child, out, seen)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Solids below `shape`.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn solids_of(store: &TopologyStore, shape: Shape) -> Result<Vec<SolidId>> {
    match shape {
        Shape::Solid(id) => Ok(vec![id]),
        Shape::Compound(id) => {
            let mut out = Vec::new();
            for &child in &store.compound(id)?.shapes {
                for s in solids_of(store, child)? {
                    if !out.contains(&s) {
                        out.push(s);
                    }
                }
            }
            Ok(out)
        }
        _ => Ok(Vec::new()),
    }
}

/// Faces below `shape`.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn faces_of(store: &TopologyStore, shape: Shape) -> Result<Vec<FaceId>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_faces(store, shape, &mut out, &mut seen)?;
    Ok(out)
}

fn collect_faces(
    store: &TopologyStore,
    shape: Shape,
    out: &mut Vec<FaceId>,
    seen: &mut HashSet<FaceId>,
) -> Result<()> {
    match shape {
        Shape::Face(id) => {
            if seen.insert(id) {
                out.push(id);
            }
        }
        Shape::Shell(id) => {
            for &face in &store.shell(id)?.faces {
                if seen.insert(face) {
                    out.push(face);
                }
            }
        }
        Shape::Solid(id) => {
            for shell in store.solid(id)?.shells() {
                collect_faces(store, Shape::Shell(shell), out, seen)?;
            }
        }
        Shape::Compound(id) => {
            for &child in &store.compound(id)?.shapes {
                collect_faces(store, child, out, seen)?;
            }
        }
        Shape::Vertex(_) | Shape::Edge(_) | Shape::Wire(_) => {}
    }
    Ok(())
}

/// Wires below `shape`.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn wires_of(store: &TopologyStore, shape: Shape) -> Result<Vec<WireId>> {
    if let Shape::Wire(id) = shape {
        return Ok(vec![id]);
    }
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for face in faces_of(store, shape)? {
        for wire in store.face(face)?.wires() {
            if seen.insert(wire) {
                out.push(wire);
            }
        }
    }
    Ok(out)
}

/// Edges below `shape`.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn edges_of(store: &TopologyStore, shape: Shape) -> Result<Vec<EdgeId>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_edges(store, shape, &mut out, &mut seen)?;
    Ok(out)
}

fn collect_edges(
    store: &TopologyStore,
    shape: Shape,
    out: &mut Vec<EdgeId>,
    seen: &mut HashSet<EdgeId>,
) -> Result<()> {
    match shape {
        Shape::Vertex(_) => {}
        Shape::Edge(id) => {
            if seen.insert(id) {
                out.push(id);
            }
        }
        Shape::Wire(id) => {
            for oe in &store.wire(id)?.edges {
                if seen.insert(oe.edge) {
                    out.push(oe.edge);
                }
            }
        }
        Shape::Compound(id) => {
            for &child in &store.compound(id)?.shapes {
                collect_edges(store, child, out, seen)?;
            }
        }
        Shape::Face(_) | Shape::Shell(_) | Shape::Solid(_) => {
            for wire in wires_of(store, shape)? {
                collect_edges(store, Shape::Wire(wire), out, seen)?;
            }
        }
    }
    Ok(())
}

/// Vertices below `shape`.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn vertices_of(store: &TopologyStore, shape: Shape) -> Result<Vec<VertexId>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |v: VertexId| {
        if seen.insert(v) {
            out.push(v);
        }
    };
    if let Shape::Vertex(id) = shape {
        push(id);
    }
    if let Shape::Compound(id) = shape {
        for &child in &store.compound(id)?.shapes {
            for v in vertices_of(store, child)? {
                push(v);
            }
        }
    }
    for edge in edges_of(store, shape)? {
        let data = store.edge(edge)?;
        push(data.start);
        push(data.end);
    }
    Ok(out)
}

/// Every distinct sub-shape of `shape`, the shape itself included,
/// from the highest dimension down to vertices.
///
/// # Errors
///
/// Returns an error if any referenced entity is missing.
pub fn sub_shapes(store: &TopologyStore, shape: Shape) -> Result<Vec<Shape>> {
    let mut out = vec![shape];
    for solid in solids_of(store, shape)? {
        if Shape::Solid(solid) != shape {
            out.push(Shape::Solid(solid));
        }
    }
    for shell in shells_of(store, shape)? {
        if Shape::Shell(shell) != shape {
            out.push(Shape::Shell(shell));
        }
    }
    for face in faces_of(store, shape)? {
        if Shape::Face(face) != shape {
            out.push(Shape::Face(face));
        }
    }
    for wire in wires_of(store, shape)? {
        if Shape::Wire(wire) != shape {
            out.push(Shape::Wire(wire));
        }
    }
    for edge in edges_of(store, shape)? {
        if Shape::Edge(edge) != shape {
            out.push(Shape::Edge(edge));
        }
    }
    for vertex in vertices_of(store, shape)? {
        if Shape::Vertex(vertex) != shape {
            out.push(Shape::Vertex(vertex));
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::MakeBox;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn box_sub_shape_counts() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 2.0, 3.0))
            .execute(&mut store)
            .unwrap();
        let shape = Shape::Solid(solid);
        assert_eq!(faces_of(&store, shape).unwrap().len(), 6);
        assert_eq!(edges_of(&store, shape).unwrap().len(), 12);
        assert_eq!(vertices_of(&store, shape).unwrap().len(), 8);
        // solid + shell + 6 faces + 6 wires + 12 edges + 8 vertices
        assert_eq!(sub_shapes(&store, shape).unwrap().len(), 34);
    }

    #[test]
    fn wire_vertices_follow_orientation() {
        let mut store = TopologyStore::new();
        let solid = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        let face = faces_of(&store, Shape::Solid(solid)).unwrap()[0];
        let wire = store.face(face).unwrap().outer_wire;
        let verts = wire_vertices(&store, wire).unwrap();
        let edges = &store.wire(wire).unwrap().edges;
        for (i, oe) in edges.iter().enumerate() {
            let (_, end) = oriented_ends(&store, oe).unwrap();
            assert_eq!(end, verts[(i + 1) % verts.len()]);
        }
    }
}
