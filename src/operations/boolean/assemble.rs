use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::Result;
use crate::operations::creation::MakeSolid;
use crate::operations::query::signed_volume;
use crate::topology::face_uv::face_interior_point;
use crate::topology::{
    CompoundData, EdgeId, FaceData, FaceId, Shape, ShellData, ShellId, TopologyStore, WireData,
};

use super::classify::{PointClassification, SolidClassifier};
use super::report::{Report, Warning};

/// Copy of a face with the opposite orientation.
///
/// # Errors
///
/// Returns an error if the face or one of its wires is missing.
pub(crate) fn flip_face(store: &mut TopologyStore, face: FaceId) -> Result<FaceId> {
    let data = store.face(face)?.clone();
    let outer = store.wire(data.outer_wire)?.reversed();
    let inner: Vec<WireData> = data
        .inner_wires
        .iter()
        .map(|&w| store.wire(w).map(WireData::reversed))
        .collect::<std::result::Result<_, _>>()?;
    let outer = store.add_wire(outer);
    let inner = inner.into_iter().map(|w| store.add_wire(w)).collect();
    let mut flipped = FaceData::new(data.surface, outer, inner, !data.same_sense);
    flipped.tolerance = data.tolerance;
    Ok(store.add_face(flipped))
}

/// Oriented edge uses per face: `(edge, forward)`.
fn edge_uses(store: &TopologyStore, face: FaceId) -> Result<Vec<(EdgeId, bool)>> {
    let mut uses = Vec::new();
    for wire in store.face(face)?.wires() {
        uses.extend(store.wire(wire)?.edges.iter().map(|oe| (oe.edge, oe.forward)));
    }
    Ok(uses)
}

/// Edges not used by exactly two of `faces`.
///
/// # Errors
///
/// Returns an error if a face or wire is missing.
pub(crate) fn non_manifold_edges(store: &TopologyStore, faces: &[FaceId]) -> Result<Vec<EdgeId>> {
    let mut count: HashMap<EdgeId, usize> = HashMap::new();
    for &f in faces {
        for (e, _) in edge_uses(store, f)? {
            *count.entry(e).or_default() += 1;
        }
    }
    let mut bad: Vec<EdgeId> = count.into_iter().filter(|&(_, n)| n != 2).map(|(e, _)| e).collect();
    bad.sort();
    Ok(bad)
}

/// The assembled result.
#[derive(Debug)]
pub(crate) struct Assembly {
    pub shape: Shape,
    /// Faces replaced by a flipped copy during orientation.
    pub flipped: HashMap<FaceId, FaceId>,
}

pub(crate) fn empty_compound(store: &mut TopologyStore) -> Shape {
    Shape::Compound(store.add_compound(CompoundData { shapes: Vec::new() }))
}

pub(crate) fn compound_of(store: &mut TopologyStore, shapes: Vec<Shape>) -> Shape {
    Shape::Compound(store.add_compound(CompoundData { shapes }))
}

struct ShellPlan {
    faces: Vec<FaceId>,
    /// Faces to flip so that adjacent faces use shared edges oppositely.
    flip: Vec<bool>,
    volume: f64,
}

/// Groups manifold faces into closed shells and shells into solids.
///
/// Faces are oriented consistently shell by shell. Shells nested an odd
/// number of times become voids of the smallest shell around them, all
/// other shells become solids.
///
/// # Errors
///
/// Returns an error if an entity is missing or a shell cannot be closed.
pub(crate) fn assemble_solids(store: &mut TopologyStore, faces: &[FaceId], report: &mut Report) -> Result<Assembly> {
    if faces.is_empty() {
        return Ok(Assembly {
            shape: empty_compound(store),
            flipped: HashMap::new(),
        });
    }

    let mut uses = Vec::with_capacity(faces.len());
    let mut by_edge: HashMap<EdgeId, Vec<(usize, bool)>> = HashMap::new();
    for (i, &f) in faces.iter().enumerate() {
        let face_uses = edge_uses(store, f)?;
        for &(e, forward) in &face_uses {
            by_edge.entry(e).or_default().push((i, forward));
        }
        uses.push(face_uses);
    }

    let mut flip: Vec<Option<bool>> = vec![None; faces.len()];
    let mut plans = Vec::new();
    for seed in 0..faces.len() {
        if flip[seed].is_some() {
            continue;
        }
        flip[seed] = Some(false);
        let mut members = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(i) = queue.pop_front() {
            let flip_i = flip[i].unwrap_or(false);
            for &(e, forward) in &uses[i] {
                for &(j, other) in by_edge.get(&e).into_iter().flatten() {
                    if j == i {
                        continue;
                    }
                    // adjacent faces must traverse a shared edge oppositely
                    let wanted = flip_i ^ (forward == other);
                    match flip[j] {
                        None => {
                            flip[j] = Some(wanted);
                            members.push(j);
                            queue.push_back(j);
                        }
                        Some(current) if current != wanted => {
                            report.push(Warning::GeometricDegeneracy {
                                shapes: vec![Shape::Face(faces[i]), Shape::Face(faces[j])],
                                reason: "shell cannot be oriented consistently".into(),
                            });
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        members.sort_unstable();
        let shell_faces: Vec<FaceId> = members.iter().map(|&i| faces[i]).collect();
        let shell_flip: Vec<bool> = members.iter().map(|&i| flip[i].unwrap_or(false)).collect();
        let mut volume = 0.0;
        for (&f, &flipped) in shell_faces.iter().zip(&shell_flip) {
            let flux = signed_volume(store, &[f])?;
            volume += if flipped { -flux } else { flux };
        }
        plans.push(ShellPlan {
            faces: shell_faces,
            flip: shell_flip,
            volume,
        });
    }

    let containers = nesting(store, &plans)?;
    let depth: Vec<usize> = containers.iter().map(Vec::len).collect();

    let mut flipped = HashMap::new();
    let mut shells = Vec::with_capacity(plans.len());
    for (k, plan) in plans.iter().enumerate() {
        let outer = depth[k] % 2 == 0;
        let invert = (plan.volume < 0.0) == outer;
        let mut shell_faces = Vec::with_capacity(plan.faces.len());
        for (&f, &flip_f) in plan.faces.iter().zip(&plan.flip) {
            if flip_f ^ invert {
                let g = flip_face(store, f)?;
                flipped.insert(f, g);
                shell_faces.push(g);
            } else {
                shell_faces.push(f);
            }
        }
        shells.push(store.add_shell(ShellData::closed(shell_faces)));
    }

    let mut voids: HashMap<usize, Vec<ShellId>> = HashMap::new();
    for k in (0..plans.len()).filter(|&k| depth[k] % 2 == 1) {
        // the innermost container is the one nested deepest itself
        let parent = containers[k].iter().copied().max_by_key(|&c| depth[c]);
        match parent {
            Some(c) => voids.entry(c).or_default().push(shells[k]),
            None => report.push(Warning::GeometricDegeneracy {
                shapes: vec![Shape::Shell(shells[k])],
                reason: "void shell without container".into(),
            }),
        }
    }

    let mut solids = Vec::new();
    for k in (0..plans.len()).filter(|&k| depth[k] % 2 == 0) {
        let inner = voids.remove(&k).unwrap_or_default();
        solids.push(MakeSolid::new(shells[k], inner).execute(store)?);
    }
    debug!(shells = shells.len(), solids = solids.len(), "result assembled");

    let shape = match solids.as_slice() {
        [single] => Shape::Solid(*single),
        _ => compound_of(store, solids.into_iter().map(Shape::Solid).collect()),
    };
    Ok(Assembly { shape, flipped })
}

/// For every shell, the other shells enclosing it.
fn nesting(store: &TopologyStore, plans: &[ShellPlan]) -> Result<Vec<Vec<usize>>> {
    let mut containers = vec![Vec::new(); plans.len()];
    if plans.len() < 2 {
        return Ok(containers);
    }
    let mut probes = Vec::with_capacity(plans.len());
    for plan in plans {
        let mut probe = Vec::new();
        for &f in &plan.faces {
            if let Some(point) = face_interior_point(store, f)? {
                probe.push(point);
            }
            if probe.len() == 3 {
                break;
            }
        }
        probes.push(probe);
    }
    for (t, container) in plans.iter().enumerate() {
        let classifier = SolidClassifier::from_faces(store, &container.faces)?;
        for (s, probe) in probes.iter().enumerate() {
            if s == t {
                continue;
            }
            let inside = probe
                .iter()
                .map(|point| classifier.classify(point, crate::math::tolerance::CONFUSION))
                .find(|c| *c != PointClassification::OnBoundary)
                == Some(PointClassification::Inside);
            if inside {
                containers[s].push(t);
            }
        }
    }
    Ok(containers)
}
