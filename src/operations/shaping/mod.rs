mod extrude;

pub use extrude::Extrude;
pub(crate) use extrude::extrude_loops;
