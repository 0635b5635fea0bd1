//! Whole-pipeline checks of the algebra of Boolean operations.

#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;

use crate::math::{Point3, Vector3};
use crate::operations::creation::{MakeBox, MakeCylinder};
use crate::operations::query::{IsValid, Volume};
use crate::topology::explore::{edges_of, faces_of, solids_of};
use crate::topology::{CompoundData, Shape, TopologyStore};

use super::{BooleanKind, BooleanOptions, Cut, Evolution, Intersection, Section, Union};

/// Routes the pipeline's spans to the test output; `RUST_LOG=brepbool=debug`
/// shows every phase.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

fn cube(store: &mut TopologyStore, min: Point3, max: Point3) -> Shape {
    Shape::Solid(MakeBox::new(min, max).execute(store).unwrap())
}

fn volume(store: &TopologyStore, shape: Shape) -> f64 {
    Volume::new(shape).execute(store).unwrap()
}

/// Unit cube and a copy shifted by half along x.
fn offset_cubes(store: &mut TopologyStore) -> (Shape, Shape) {
    let a = cube(store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
    let b = cube(store, p(0.5, 0.0, 0.0), p(1.5, 1.0, 1.0));
    (a, b)
}

/// Two 2-cubes overlapping in a unit cube.
fn crossing_cubes(store: &mut TopologyStore) -> (Shape, Shape) {
    let a = cube(store, p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
    let b = cube(store, p(1.0, 1.0, 1.0), p(3.0, 3.0, 3.0));
    (a, b)
}

#[test]
fn offset_union_splits_the_shared_sides() {
    init_tracing();
    let mut store = TopologyStore::new();
    let (a, b) = offset_cubes(&mut store);
    let result = Union::new(a, b).execute(&mut store).unwrap();
    assert_eq!(faces_of(&store, result.shape).unwrap().len(), 14);
    assert_relative_eq!(volume(&store, result.shape), 1.5, epsilon = 1e-9);
    assert!(IsValid::new(result.shape).execute(&store));
}

#[test]
fn offset_union_merges_back_to_a_box() {
    let mut store = TopologyStore::new();
    let (a, b) = offset_cubes(&mut store);
    let options = BooleanOptions::default().with_merge_coplanar(true);
    let result = Union::new(a, b).with_options(options).execute(&mut store).unwrap();
    assert_eq!(faces_of(&store, result.shape).unwrap().len(), 6);
    assert_eq!(edges_of(&store, result.shape).unwrap().len(), 12);
    assert_relative_eq!(volume(&store, result.shape), 1.5, epsilon = 1e-9);
    assert!(IsValid::new(result.shape).execute(&store));
}

#[test]
fn offset_intersection_and_cut() {
    let mut store = TopologyStore::new();
    let (a, b) = offset_cubes(&mut store);
    let common = Intersection::new(a, b).execute(&mut store).unwrap();
    assert_eq!(faces_of(&store, common.shape).unwrap().len(), 6);
    assert_relative_eq!(volume(&store, common.shape), 0.5, epsilon = 1e-9);

    let cut = Cut::new(a, b).execute(&mut store).unwrap();
    assert_eq!(faces_of(&store, cut.shape).unwrap().len(), 6);
    assert_relative_eq!(volume(&store, cut.shape), 0.5, epsilon = 1e-9);
    assert!(IsValid::new(cut.shape).execute(&store));
}

#[test]
fn volumes_are_conserved() {
    init_tracing();
    let mut store = TopologyStore::new();
    let (a, b) = crossing_cubes(&mut store);
    let union = Union::new(a, b).execute(&mut store).unwrap();
    let common = Intersection::new(a, b).execute(&mut store).unwrap();
    let a_minus_b = Cut::new(a, b).execute(&mut store).unwrap();
    let b_minus_a = Cut::new(b, a).execute(&mut store).unwrap();

    let (va, vb) = (volume(&store, a), volume(&store, b));
    let vu = volume(&store, union.shape);
    let vi = volume(&store, common.shape);
    assert_relative_eq!(va + vb, vu + vi, epsilon = 1e-9);
    assert_relative_eq!(vu, 15.0, epsilon = 1e-9);
    assert_relative_eq!(vi, 1.0, epsilon = 1e-9);
    assert_relative_eq!(
        volume(&store, a_minus_b.shape) + volume(&store, b_minus_a.shape) + vi,
        vu,
        epsilon = 1e-9
    );
}

#[test]
fn union_commutes() {
    let mut store = TopologyStore::new();
    let (a, b) = crossing_cubes(&mut store);
    let ab = Union::new(a, b).execute(&mut store).unwrap();
    let ba = Union::new(b, a).execute(&mut store).unwrap();
    assert_eq!(
        faces_of(&store, ab.shape).unwrap().len(),
        faces_of(&store, ba.shape).unwrap().len()
    );
    assert_relative_eq!(volume(&store, ab.shape), volume(&store, ba.shape), epsilon = 1e-9);
}

#[test]
fn union_with_nothing_is_identity() {
    let mut store = TopologyStore::new();
    let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
    let empty = Shape::Compound(store.add_compound(CompoundData { shapes: Vec::new() }));
    let result = Union::new(a, empty).execute(&mut store).unwrap();
    assert_eq!(result.shape, a);
    let swapped = Union::new(empty, a).execute(&mut store).unwrap();
    assert_eq!(swapped.shape, a);
    let common = Intersection::new(a, empty).execute(&mut store).unwrap();
    assert!(faces_of(&store, common.shape).unwrap().is_empty());
}

#[test]
fn union_with_a_copy_is_idempotent() {
    let mut store = TopologyStore::new();
    let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
    let copy = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
    let result = Union::new(a, copy).execute(&mut store).unwrap();
    assert_eq!(faces_of(&store, result.shape).unwrap().len(), 6);
    assert_relative_eq!(volume(&store, result.shape), 1.0, epsilon = 1e-9);
    for face in faces_of(&store, a).unwrap() {
        assert_eq!(result.history.evolution(Shape::Face(face)), Some(&Evolution::Kept));
    }
}

#[test]
fn corner_cut_leaves_an_l_shape() {
    init_tracing();
    let mut store = TopologyStore::new();
    let a = cube(&mut store, p(0.0, 0.0, 0.0), p(2.0, 2.0, 1.0));
    let b = cube(&mut store, p(1.0, 1.0, -1.0), p(3.0, 3.0, 2.0));
    let result = Cut::new(a, b).execute(&mut store).unwrap();
    let Shape::Solid(solid) = result.shape else {
        panic!("expected a single solid");
    };
    assert_eq!(faces_of(&store, result.shape).unwrap().len(), 8);
    assert!(IsValid::new(solid).execute(&store));
    assert_relative_eq!(volume(&store, result.shape), 3.0, epsilon = 1e-9);
}

#[test]
fn section_of_touching_cubes_is_the_shared_square() {
    let mut store = TopologyStore::new();
    let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
    let b = cube(&mut store, p(1.0, 0.0, 0.0), p(2.0, 1.0, 1.0));
    let result = Section::new(a, b).execute(&mut store).unwrap();
    assert_eq!(edges_of(&store, result.shape).unwrap().len(), 4);
    assert!(faces_of(&store, result.shape).unwrap().is_empty());
}

#[test]
fn touching_cubes_fuse_into_one_solid() {
    let mut store = TopologyStore::new();
    let a = cube(&mut store, p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0));
    let b = cube(&mut store, p(1.0, 0.0, 0.0), p(2.0, 1.0, 1.0));
    let result = super::boolean_op(&mut store, a, b, BooleanKind::Union, &BooleanOptions::default()).unwrap();
    assert_eq!(solids_of(&store, result.shape).unwrap().len(), 1);
    assert_eq!(faces_of(&store, result.shape).unwrap().len(), 10);
    assert_relative_eq!(volume(&store, result.shape), 2.0, epsilon = 1e-9);
}

#[test]
fn drilled_plate_loses_the_cylinder_volume() {
    init_tracing();
    let mut store = TopologyStore::new();
    let plate = cube(&mut store, p(0.0, 0.0, 0.0), p(2.0, 2.0, 1.0));
    let drill = Shape::Solid(
        MakeCylinder::new(p(1.0, 1.0, -0.5), 0.5, Vector3::z(), 2.0)
            .execute(&mut store)
            .unwrap(),
    );
    let result = Cut::new(plate, drill).execute(&mut store).unwrap();
    let expected = 4.0 - 0.25 * std::f64::consts::PI;
    assert_relative_eq!(volume(&store, result.shape), expected, max_relative = 0.03);
    assert!(IsValid::new(result.shape).execute(&store));
}

#[test]
fn parallel_and_serial_runs_agree() {
    let mut store = TopologyStore::new();
    let (a, b) = crossing_cubes(&mut store);
    let serial = Cut::new(a, b)
        .with_options(BooleanOptions::default().with_parallel(false))
        .execute(&mut store)
        .unwrap();
    let parallel = Cut::new(a, b)
        .with_options(BooleanOptions::default().with_parallel(true))
        .execute(&mut store)
        .unwrap();
    assert_eq!(
        faces_of(&store, serial.shape).unwrap().len(),
        faces_of(&store, parallel.shape).unwrap().len()
    );
    assert_relative_eq!(volume(&store, serial.shape), volume(&store, parallel.shape), epsilon = 1e-9);
}

/// A 4 x 4 x 1 slab and a rod of radius 0.3 leaning 0.3 along x per unit
/// of height, passing through both faces of the slab.
fn slab_and_tilted_rod(store: &mut TopologyStore) -> (Shape, Shape) {
    let slab = cube(store, p(-2.0, -2.0, 0.0), p(2.0, 2.0, 1.0));
    let rod = Shape::Solid(
        MakeCylinder::new(p(0.0, 0.0, -1.0), 0.3, Vector3::new(0.3, 0.0, 1.0), 3.0)
            .execute(store)
            .unwrap(),
    );
    (slab, rod)
}

#[test]
fn tilted_rod_through_slab() {
    init_tracing();
    let mut store = TopologyStore::new();
    let (slab, rod) = slab_and_tilted_rod(&mut store);

    let section = Section::new(slab, rod).execute(&mut store).unwrap();
    assert_eq!(edges_of(&store, section.shape).unwrap().len(), 4);

    let common = Intersection::new(slab, rod).execute(&mut store).unwrap();
    let cut = Cut::new(slab, rod).execute(&mut store).unwrap();
    assert!(IsValid::new(common.shape).execute(&store));
    assert!(IsValid::new(cut.shape).execute(&store));

    // the slab's thickness measured along the axis is sqrt(1.09)
    let expected = std::f64::consts::PI * 0.09 * 1.09_f64.sqrt();
    let vi = volume(&store, common.shape);
    assert_relative_eq!(vi, expected, max_relative = 0.02);
    assert_relative_eq!(volume(&store, cut.shape) + vi, 16.0, max_relative = 1e-3);
}

#[test]
fn crossing_rods_conserve_volume() {
    init_tracing();
    let mut store = TopologyStore::new();
    let upright = Shape::Solid(
        MakeCylinder::new(p(0.0, 0.0, -1.0), 0.5, Vector3::z(), 2.0)
            .execute(&mut store)
            .unwrap(),
    );
    let across = Shape::Solid(
        MakeCylinder::new(p(-1.0, 0.0, 0.0), 0.3, Vector3::x(), 2.0)
            .execute(&mut store)
            .unwrap(),
    );

    let common = Intersection::new(upright, across).execute(&mut store).unwrap();
    let cut = Cut::new(across, upright).execute(&mut store).unwrap();
    assert!(IsValid::new(common.shape).execute(&store));
    assert!(IsValid::new(cut.shape).execute(&store));
    // one stub of the thin rod sticks out on each side
    assert_eq!(solids_of(&store, cut.shape).unwrap().len(), 2);

    let vi = volume(&store, common.shape);
    assert!(vi > 0.2 && vi < 0.3, "{vi}");
    assert_relative_eq!(
        volume(&store, cut.shape) + vi,
        volume(&store, across),
        max_relative = 1e-2
    );
}
