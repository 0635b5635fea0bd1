use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::Result;
use crate::math::aabb::Aabb;
use crate::math::intersect_3d::{line_cylinder_intersect, line_plane_intersect, LinePlaneRelation};
use crate::math::tolerance::CONFUSION;
use crate::math::{Point3, Vector3};
use crate::operations::query::BoundingBox;
use crate::topology::explore::{faces_of, solids_of};
use crate::topology::face_uv::{FaceLocation, FaceLocator};
use crate::topology::{EdgeId, FaceId, FaceSurface, Shape, SolidId, TopologyStore};

use super::ds::{IntersectionDS, Rank};
use super::face_builder::SplitFaces;
use super::fill::par_map;
use super::options::BooleanOptions;
use super::pave::Splits;
use super::report::{Report, Warning};

/// Classification of a point relative to a solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointClassification {
    Inside,
    Outside,
    OnBoundary,
}

/// Classifies a point as inside, outside, or on the boundary of a solid.
///
/// Rays are cast from the point and face crossings counted, odd meaning
/// inside. Rays that touch an edge, graze a face or run along a surface are
/// discarded and the next direction is tried.
///
/// # Errors
///
/// Returns an error if the solid or its topology cannot be read.
pub fn classify_point_in_solid(point: &Point3, solid: SolidId, store: &TopologyStore) -> Result<PointClassification> {
    let classifier = SolidClassifier::new(store, Shape::Solid(solid))?;
    Ok(classifier.classify(point, CONFUSION))
}

/// Skewed ray directions, none along a coordinate axis or diagonal.
const RAYS: [[f64; 3]; 7] = [
    [0.8014, 0.4519, 0.3919],
    [-0.3547, 0.8271, 0.4357],
    [0.2297, -0.3914, 0.8910],
    [-0.6234, -0.5186, 0.5851],
    [0.5129, -0.7792, -0.3601],
    [-0.4723, 0.2381, -0.8487],
    [0.9109, -0.1223, 0.3941],
];

/// Cosine below which a ray counts as grazing a surface.
const GRAZING: f64 = 1e-3;

/// Point classifier over the faces of one or more solids.
#[derive(Debug, Clone)]
pub(crate) struct SolidClassifier {
    faces: Vec<(FaceLocator, Aabb)>,
}

enum Ray {
    Crossings(usize),
    Ambiguous,
}

impl SolidClassifier {
    /// Snapshots the faces of every solid in `shape`.
    pub(crate) fn new(store: &TopologyStore, shape: Shape) -> Result<Self> {
        let mut faces = Vec::new();
        for solid in solids_of(store, shape)? {
            for f in faces_of(store, Shape::Solid(solid))? {
                let bbox = BoundingBox::new(Shape::Face(f)).execute(store)?;
                faces.push((FaceLocator::new(store, f)?, bbox));
            }
        }
        Ok(Self { faces })
    }

    /// Snapshots an explicit face set, which must bound a closed volume.
    pub(crate) fn from_faces(store: &TopologyStore, face_ids: &[FaceId]) -> Result<Self> {
        let mut faces = Vec::with_capacity(face_ids.len());
        for &f in face_ids {
            let bbox = BoundingBox::new(Shape::Face(f)).execute(store)?;
            faces.push((FaceLocator::new(store, f)?, bbox));
        }
        Ok(Self { faces })
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub(crate) fn classify(&self, point: &Point3, tol: f64) -> PointClassification {
        for (locator, bbox) in &self.faces {
            if bbox.enlarged(tol).contains_point(point) && locator.locate(point, tol) != FaceLocation::Outside {
                return PointClassification::OnBoundary;
            }
        }
        for ray in RAYS {
            let dir = Vector3::new(ray[0], ray[1], ray[2]).normalize();
            match self.cast(point, &dir, tol) {
                Ray::Crossings(n) if n % 2 == 1 => return PointClassification::Inside,
                Ray::Crossings(_) => return PointClassification::Outside,
                Ray::Ambiguous => trace!(?dir, "ambiguous ray, retrying"),
            }
        }
        PointClassification::Outside
    }

    fn cast(&self, origin: &Point3, dir: &Vector3, tol: f64) -> Ray {
        let mut crossings = 0;
        for (locator, bbox) in &self.faces {
            match bbox.enlarged(tol).clip_line(origin, dir) {
                Some((_, t1)) if t1 > 0.0 => {}
                _ => continue,
            }
            let surface = locator.uv().surface();
            let params = match surface {
                FaceSurface::Plane(pl) => match line_plane_intersect(origin, dir, pl, tol) {
                    LinePlaneRelation::Point { t, .. } => vec![t],
                    LinePlaneRelation::Parallel => Vec::new(),
                    LinePlaneRelation::OnPlane => return Ray::Ambiguous,
                },
                FaceSurface::Cylinder(cyl) => {
                    let roots = line_cylinder_intersect(origin, dir, cyl);
                    if roots.len() == 1 {
                        return Ray::Ambiguous;
                    }
                    roots
                }
            };
            for t in params.into_iter().filter(|&t| t > tol) {
                let hit = origin + dir * t;
                match locator.locate(&hit, tol) {
                    FaceLocation::Outside => {}
                    FaceLocation::OnBoundary => return Ray::Ambiguous,
                    FaceLocation::Inside => {
                        if surface.normal_at(&hit).dot(dir).abs() < GRAZING {
                            return Ray::Ambiguous;
                        }
                        crossings += 1;
                    }
                }
            }
        }
        Ray::Crossings(crossings)
    }
}

/// State of a split face relative to the other operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaceState {
    In,
    Out,
    /// Coincides with a face of the other operand; `same` when their
    /// normals agree.
    On { same: bool },
}

#[derive(Debug, Default)]
pub(crate) struct Classification {
    /// State per entry of [`SplitFaces::faces`].
    pub states: Vec<FaceState>,
    /// Coinciding face of operand A for every ON face of operand B.
    pub twins: HashMap<FaceId, FaceId>,
}

struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Classifies every split face against the other operand.
///
/// Coinciding faces are found first. The remaining faces are grouped into
/// connected patches that never cross a section edge, and one interior
/// point per patch is classified.
pub(crate) fn classify_faces(
    store: &TopologyStore,
    ds: &IntersectionDS,
    splits: &Splits,
    faces: &SplitFaces,
    operands: [Shape; 2],
    options: &BooleanOptions,
    report: &mut Report,
) -> Result<Classification> {
    let n = faces.faces.len();
    let mut states: Vec<Option<FaceState>> = vec![None; n];
    let mut twins = HashMap::new();

    let same_domain: HashSet<(FaceId, FaceId)> = ds
        .same_domain()
        .iter()
        .flat_map(|&(a, b)| [(a, b), (b, a)])
        .collect();
    let mut by_edges: HashMap<&[EdgeId], Vec<usize>> = HashMap::new();
    for (i, f) in faces.faces.iter().enumerate() {
        if f.rank == Rank::A {
            by_edges.entry(f.edges.as_slice()).or_default().push(i);
        }
    }
    for (j, fb) in faces.faces.iter().enumerate().filter(|(_, f)| f.rank == Rank::B) {
        let Some(candidates) = by_edges.get(fb.edges.as_slice()) else {
            continue;
        };
        let Some(&i) = candidates
            .iter()
            .find(|&&i| states[i].is_none() && same_domain.contains(&(faces.faces[i].source, fb.source)))
        else {
            continue;
        };
        let fa = &faces.faces[i];
        let probe = fa.interior.unwrap_or_else(Point3::origin);
        let na = store.face(fa.face)?.normal_at(&probe);
        let nb = store.face(fb.face)?.normal_at(&probe);
        let same = na.dot(&nb) > 0.0;
        states[i] = Some(FaceState::On { same });
        states[j] = Some(FaceState::On { same });
        twins.insert(fb.face, fa.face);
    }

    let mut uses: HashMap<EdgeId, Vec<usize>> = HashMap::new();
    for (i, f) in faces.faces.iter().enumerate() {
        if states[i].is_none() {
            for &e in &f.edges {
                uses.entry(e).or_default().push(i);
            }
        }
    }
    let mut components = Components::new(n);
    for (e, users) in &uses {
        if splits.section_edges.contains(e) || splits.is_shared(*e) {
            continue;
        }
        for w in users.windows(2) {
            if faces.faces[w[0]].rank == faces.faces[w[1]].rank {
                components.union(w[0], w[1]);
            }
        }
    }

    let classifiers = [
        SolidClassifier::new(store, operands[Rank::B as usize])?,
        SolidClassifier::new(store, operands[Rank::A as usize])?,
    ];
    let mut patches: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in (0..n).filter(|&i| states[i].is_none()) {
        patches.entry(components.find(i)).or_default().push(i);
    }
    let mut patches: Vec<Vec<usize>> = patches.into_values().collect();
    patches.sort();

    let tol = CONFUSION + options.fuzzy;
    let results = par_map(options.parallel, &patches, |members| -> Result<Option<FaceState>> {
        let rank = faces.faces[members[0]].rank;
        let classifier = &classifiers[rank as usize];
        if classifier.is_empty() {
            return Ok(Some(FaceState::Out));
        }
        for &i in members {
            let f = &faces.faces[i];
            let Some(point) = f.interior else {
                continue;
            };
            match classifier.classify(&point, tol) {
                PointClassification::Inside => return Ok(Some(FaceState::In)),
                PointClassification::Outside => return Ok(Some(FaceState::Out)),
                PointClassification::OnBoundary => {
                    let normal = store.face(f.face)?.normal_at(&point);
                    let inward = point - normal * (tol * 100.0).max(1e-6);
                    match classifier.classify(&inward, tol) {
                        PointClassification::Inside => return Ok(Some(FaceState::In)),
                        PointClassification::Outside => return Ok(Some(FaceState::Out)),
                        PointClassification::OnBoundary => {}
                    }
                }
            }
        }
        Ok(None)
    });

    for (members, result) in patches.iter().zip(results) {
        let state = match result? {
            Some(state) => state,
            None => {
                report.push(Warning::GeometricDegeneracy {
                    shapes: members.iter().map(|&i| Shape::Face(faces.faces[i].face)).collect(),
                    reason: "no classifiable point on face patch".into(),
                });
                FaceState::Out
            }
        };
        for &i in members {
            states[i] = Some(state);
        }
    }

    let states: Vec<FaceState> = states.into_iter().map(|s| s.unwrap_or(FaceState::Out)).collect();
    debug!(
        patches = patches.len(),
        on = twins.len(),
        inside = states.iter().filter(|s| **s == FaceState::In).count(),
        "faces classified"
    );
    Ok(Classification { states, twins })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::boolean::face_builder::build_faces;
    use crate::operations::boolean::fill::PaveFiller;
    use crate::operations::boolean::pave::build_splits;
    use crate::operations::creation::{MakeBox, MakeCylinder, MakeFace, MakeWire};
    use crate::operations::shaping::Extrude;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn make_box(store: &mut TopologyStore) -> SolidId {
        let pts = vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 2.0, 0.0), p(0.0, 2.0, 0.0)];
        let wire = MakeWire::new(pts, true).execute(store).unwrap();
        let face = MakeFace::new(wire, vec![]).execute(store).unwrap();
        Extrude::new(face, Vector3::new(0.0, 0.0, 2.0)).execute(store).unwrap()
    }

    #[test]
    fn center_is_inside() {
        let mut store = TopologyStore::new();
        let solid = make_box(&mut store);
        let result = classify_point_in_solid(&p(1.0, 1.0, 1.0), solid, &store).unwrap();
        assert_eq!(result, PointClassification::Inside);
    }

    #[test]
    fn far_point_is_outside() {
        let mut store = TopologyStore::new();
        let solid = make_box(&mut store);
        let result = classify_point_in_solid(&p(10.0, 10.0, 10.0), solid, &store).unwrap();
        assert_eq!(result, PointClassification::Outside);
    }

    #[test]
    fn point_on_face_is_boundary() {
        let mut store = TopologyStore::new();
        let solid = make_box(&mut store);
        let result = classify_point_in_solid(&p(1.0, 1.0, 0.0), solid, &store).unwrap();
        assert_eq!(result, PointClassification::OnBoundary);
    }

    #[test]
    fn point_just_inside() {
        let mut store = TopologyStore::new();
        let solid = make_box(&mut store);
        let result = classify_point_in_solid(&p(0.001, 0.001, 0.001), solid, &store).unwrap();
        assert_eq!(result, PointClassification::Inside);
    }

    #[test]
    fn cylinder_interior_and_exterior() {
        let mut store = TopologyStore::new();
        let solid = MakeCylinder::new(p(0.0, 0.0, 0.0), 1.0, Vector3::z(), 2.0)
            .execute(&mut store)
            .unwrap();
        let inside = classify_point_in_solid(&p(0.5, 0.3, 1.0), solid, &store).unwrap();
        assert_eq!(inside, PointClassification::Inside);
        // inside the bounding box, outside the round wall
        let corner = classify_point_in_solid(&p(0.9, 0.9, 1.0), solid, &store).unwrap();
        assert_eq!(corner, PointClassification::Outside);
        let wall = classify_point_in_solid(&p(0.0, -1.0, 1.0), solid, &store).unwrap();
        assert_eq!(wall, PointClassification::OnBoundary);
    }

    fn classify(store: &mut TopologyStore, a: Shape, b: Shape) -> (SplitFaces, Classification) {
        let options = BooleanOptions::default().with_parallel(false);
        let (ds, mut report) = PaveFiller::new(store, &options).perform(a, b).unwrap();
        let splits = build_splits(store, &ds).unwrap();
        let faces = build_faces(store, &ds, &splits, &options, &mut report).unwrap();
        let classes = classify_faces(store, &ds, &splits, &faces, [a, b], &options, &mut report).unwrap();
        (faces, classes)
    }

    #[test]
    fn crossing_boxes_have_three_inside_faces_each() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0)).execute(&mut store).unwrap();
        let b = MakeBox::new(p(1.0, 1.0, 1.0), p(3.0, 3.0, 3.0)).execute(&mut store).unwrap();
        let (faces, classes) = classify(&mut store, a.into(), b.into());
        for rank in [Rank::A, Rank::B] {
            let inside = faces
                .faces
                .iter()
                .zip(&classes.states)
                .filter(|(f, s)| f.rank == rank && **s == FaceState::In)
                .count();
            assert_eq!(inside, 3);
        }
        assert!(classes.twins.is_empty());
    }

    #[test]
    fn shared_face_is_on_with_opposite_normals() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let b = MakeBox::new(p(1.0, 0.0, 0.0), p(2.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let (_, classes) = classify(&mut store, a.into(), b.into());
        assert_eq!(classes.twins.len(), 1);
        let on: Vec<&FaceState> = classes
            .states
            .iter()
            .filter(|s| matches!(s, FaceState::On { .. }))
            .collect();
        assert_eq!(on, vec![&FaceState::On { same: false }; 2]);
        assert!(!classes.states.contains(&FaceState::In));
    }
}
