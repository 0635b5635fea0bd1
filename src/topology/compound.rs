use super::shape::Shape;

slotmap::new_key_type! {
    /// Unique identifier for a compound in the topology store.
    pub struct CompoundId;
}

/// An unordered group of shapes of any kind.
///
/// Boolean results with several solids, section curves and the empty
/// result are compounds.
#[derive(Debug, Clone, Default)]
pub struct CompoundData {
    /// The grouped shapes.
    pub shapes: Vec<Shape>,
}
