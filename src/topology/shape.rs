use slotmap::Key;

use super::compound::CompoundId;
use super::edge::EdgeId;
use super::face::FaceId;
use super::shell::ShellId;
use super::solid::SolidId;
use super::vertex::VertexId;
use super::wire::WireId;

/// Kind of a topological entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeKind {
    Vertex,
    Edge,
    Wire,
    Face,
    Shell,
    Solid,
    Compound,
}

/// A reference to any topological entity in a [`TopologyStore`](super::TopologyStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Shape {
    Vertex(VertexId),
    Edge(EdgeId),
    Wire(WireId),
    Face(FaceId),
    Shell(ShellId),
    Solid(SolidId),
    Compound(CompoundId),
}

impl Shape {
    /// The kind tag of this shape.
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Vertex(_) => ShapeKind::Vertex,
            Self::Edge(_) => ShapeKind::Edge,
            Self::Wire(_) => ShapeKind::Wire,
            Self::Face(_) => ShapeKind::Face,
            Self::Shell(_) => ShapeKind::Shell,
            Self::Solid(_) => ShapeKind::Solid,
            Self::Compound(_) => ShapeKind::Compound,
        }
    }

    /// Stable integer identity of the entity within its kind.
    #[must_use]
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Vertex(id) => id.data().as_ffi(),
            Self::Edge(id) => id.data().as_ffi(),
            Self::Wire(id) => id.data().as_ffi(),
            Self::Face(id) => id.data().as_ffi(),
            Self::Shell(id) => id.data().as_ffi(),
            Self::Solid(id) => id.data().as_ffi(),
            Self::Compound(id) => id.data().as_ffi(),
        }
    }

    #[must_use]
    pub fn as_edge(&self) -> Option<EdgeId> {
        match self {
            Self::Edge(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_face(&self) -> Option<FaceId> {
        match self {
            Self::Face(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_solid(&self) -> Option<SolidId> {
        match self {
            Self::Solid(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<VertexId> for Shape {
    fn from(id: VertexId) -> Self {
        Self::Vertex(id)
    }
}

impl From<EdgeId> for Shape {
    fn from(id: EdgeId) -> Self {
        Self::Edge(id)
    }
}

impl From<WireId> for Shape {
    fn from(id: WireId) -> Self {
        Self::Wire(id)
    }
}

impl From<FaceId> for Shape {
    fn from(id: FaceId) -> Self {
        Self::Face(id)
    }
}

impl From<ShellId> for Shape {
    fn from(id: ShellId) -> Self {
        Self::Shell(id)
    }
}

impl From<SolidId> for Shape {
    fn from(id: SolidId) -> Self {
        Self::Solid(id)
    }
}

impl From<CompoundId> for Shape {
    fn from(id: CompoundId) -> Self {
        Self::Compound(id)
    }
}
