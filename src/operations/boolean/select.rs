use super::classify::FaceState;
use super::ds::Rank;

/// The Boolean operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanKind {
    /// Material of either operand.
    Union,
    /// Material common to both operands.
    Intersection,
    /// Material of the object not in the tool.
    Cut,
    /// The intersection edges of the two boundaries.
    Section,
}

/// Decision about whether to keep a split face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepDecision {
    Keep,
    KeepFlipped,
    Discard,
}

/// Decides whether a split face goes into the result.
///
/// | Face      | State vs other | Union   | Cut (A-B)    | Intersection |
/// |-----------|----------------|---------|--------------|--------------|
/// | from A    | OUT            | keep    | keep         | discard      |
/// | from A    | IN             | discard | discard      | keep         |
/// | from B    | OUT            | keep    | discard      | discard      |
/// | from B    | IN             | discard | keep (flip)  | keep         |
///
/// Coinciding faces are kept once, from A: when the normals agree for
/// union and intersection, when they oppose for cut.
#[allow(clippy::match_same_arms)]
#[must_use]
pub(crate) fn should_keep_face(rank: Rank, state: FaceState, kind: BooleanKind) -> KeepDecision {
    match (rank, state, kind) {
        (_, _, BooleanKind::Section) => KeepDecision::Discard,

        (Rank::A, FaceState::Out, BooleanKind::Union) => KeepDecision::Keep,
        (Rank::A, FaceState::Out, BooleanKind::Cut) => KeepDecision::Keep,
        (Rank::A, FaceState::Out, BooleanKind::Intersection) => KeepDecision::Discard,

        (Rank::A, FaceState::In, BooleanKind::Union) => KeepDecision::Discard,
        (Rank::A, FaceState::In, BooleanKind::Cut) => KeepDecision::Discard,
        (Rank::A, FaceState::In, BooleanKind::Intersection) => KeepDecision::Keep,

        (Rank::B, FaceState::Out, BooleanKind::Union) => KeepDecision::Keep,
        (Rank::B, FaceState::Out, BooleanKind::Cut) => KeepDecision::Discard,
        (Rank::B, FaceState::Out, BooleanKind::Intersection) => KeepDecision::Discard,

        (Rank::B, FaceState::In, BooleanKind::Union) => KeepDecision::Discard,
        (Rank::B, FaceState::In, BooleanKind::Cut) => KeepDecision::KeepFlipped,
        (Rank::B, FaceState::In, BooleanKind::Intersection) => KeepDecision::Keep,

        (Rank::A, FaceState::On { same }, BooleanKind::Union | BooleanKind::Intersection) => {
            if same {
                KeepDecision::Keep
            } else {
                KeepDecision::Discard
            }
        }
        (Rank::A, FaceState::On { same }, BooleanKind::Cut) => {
            if same {
                KeepDecision::Discard
            } else {
                KeepDecision::Keep
            }
        }
        (Rank::B, FaceState::On { .. }, _) => KeepDecision::Discard,
    }
}
