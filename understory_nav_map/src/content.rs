// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content classification stored per cell, auxiliary payloads, and the override precedence.
//!
//! Every write goes through [`can_override`] before it touches a cell. The precedence encodes
//! how much we trust each observation: cliffs are sticky, recognized obstacles are not erased
//! by low-confidence vision edges, and "removed" observations only clear the obstacle kind
//! they name.

use bitflags::bitflags;
use kurbo::{Affine, Vec2};

/// Classification of a cell.
///
/// `Subdivided` and `Invalid` are control tags owned by the tree; they are never accepted as
/// insertion content. The `*Removed` variants only exist as insertion intent and are stored
/// as [`ContentType::ClearOfObstacle`] once accepted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContentType {
    /// Never observed.
    Unknown,
    /// Observed free of obstacles.
    ClearOfObstacle,
    /// Observed free of cliffs (stronger than clear of obstacle).
    ClearOfCliff,
    /// A recognized cube.
    ObstacleCube,
    /// A previously seen cube is no longer there.
    ObstacleCubeRemoved,
    /// A recognized charger.
    ObstacleCharger,
    /// A previously seen charger is no longer there.
    ObstacleChargerRemoved,
    /// Something is in the way, but we do not know what.
    ObstacleUnrecognized,
    /// A drop-off.
    Cliff,
    /// A vision edge worth exploring.
    InterestingEdge,
    /// A vision edge that was found to be uninteresting.
    NotInterestingEdge,
    /// The node has children; its content lives in them.
    Subdivided,
    /// A freshly constructed node that has not been written yet.
    Invalid,
}

bitflags! {
    /// Set of storable content types, used for outer-type masks and the cacheable set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ContentTypes: u16 {
        /// [`ContentType::Unknown`].
        const UNKNOWN               = 1 << 0;
        /// [`ContentType::ClearOfObstacle`].
        const CLEAR_OF_OBSTACLE     = 1 << 1;
        /// [`ContentType::ClearOfCliff`].
        const CLEAR_OF_CLIFF        = 1 << 2;
        /// [`ContentType::ObstacleCube`].
        const OBSTACLE_CUBE         = 1 << 3;
        /// [`ContentType::ObstacleCharger`].
        const OBSTACLE_CHARGER      = 1 << 4;
        /// [`ContentType::ObstacleUnrecognized`].
        const OBSTACLE_UNRECOGNIZED = 1 << 5;
        /// [`ContentType::Cliff`].
        const CLIFF                 = 1 << 6;
        /// [`ContentType::InterestingEdge`].
        const INTERESTING_EDGE      = 1 << 7;
        /// [`ContentType::NotInterestingEdge`].
        const NOT_INTERESTING_EDGE  = 1 << 8;

        /// Every obstacle kind.
        const OBSTACLES = Self::OBSTACLE_CUBE.bits()
            | Self::OBSTACLE_CHARGER.bits()
            | Self::OBSTACLE_UNRECOGNIZED.bits();
        /// Both kinds of clear.
        const CLEAR = Self::CLEAR_OF_OBSTACLE.bits() | Self::CLEAR_OF_CLIFF.bits();
        /// Both kinds of vision edge.
        const EDGES = Self::INTERESTING_EDGE.bits() | Self::NOT_INTERESTING_EDGE.bits();
    }
}

impl Default for ContentTypes {
    /// The types indexed by the processor unless configured otherwise.
    fn default() -> Self {
        Self::OBSTACLE_CUBE
            | Self::OBSTACLE_UNRECOGNIZED
            | Self::CLIFF
            | Self::INTERESTING_EDGE
            | Self::NOT_INTERESTING_EDGE
    }
}

impl ContentType {
    /// The mask bit for this type. Empty for removed variants and control tags.
    pub const fn flag(self) -> ContentTypes {
        match self {
            Self::Unknown => ContentTypes::UNKNOWN,
            Self::ClearOfObstacle => ContentTypes::CLEAR_OF_OBSTACLE,
            Self::ClearOfCliff => ContentTypes::CLEAR_OF_CLIFF,
            Self::ObstacleCube => ContentTypes::OBSTACLE_CUBE,
            Self::ObstacleCharger => ContentTypes::OBSTACLE_CHARGER,
            Self::ObstacleUnrecognized => ContentTypes::OBSTACLE_UNRECOGNIZED,
            Self::Cliff => ContentTypes::CLIFF,
            Self::InterestingEdge => ContentTypes::INTERESTING_EDGE,
            Self::NotInterestingEdge => ContentTypes::NOT_INTERESTING_EDGE,
            Self::ObstacleCubeRemoved
            | Self::ObstacleChargerRemoved
            | Self::Subdivided
            | Self::Invalid => ContentTypes::empty(),
        }
    }

    /// Whether `self` is in `mask`.
    pub const fn is_in(self, mask: ContentTypes) -> bool {
        mask.intersects(self.flag())
    }

    /// Whether a cell with this type counts towards the explored area.
    pub const fn is_explored(self) -> bool {
        !matches!(self, Self::Unknown | Self::Invalid | Self::Subdivided)
    }

    /// Whether this type may be passed to an insertion.
    pub const fn is_insertable(self) -> bool {
        !matches!(self, Self::Subdivided | Self::Invalid)
    }

    /// Whether insertions of this type must carry a [`ContentPayload`].
    ///
    /// Every other insertable type must not carry one.
    pub const fn requires_payload(self) -> bool {
        matches!(self, Self::Cliff)
    }

    /// Whether this is an obstacle kind that can be stored.
    pub const fn is_obstacle(self) -> bool {
        matches!(
            self,
            Self::ObstacleCube | Self::ObstacleCharger | Self::ObstacleUnrecognized
        )
    }

    /// The type actually stored when this type is accepted.
    pub const fn stored(self) -> Self {
        match self {
            Self::ObstacleCubeRemoved | Self::ObstacleChargerRemoved => Self::ClearOfObstacle,
            other => other,
        }
    }
}

/// How much of a cell an incoming observation covers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Overlap {
    /// The observation only covers part of the cell (finest-resolution acceptance).
    Partial,
    /// The observation covers the whole cell.
    Total,
}

/// Whether a cell currently holding `current` may take `candidate`.
pub const fn can_override(current: ContentType, candidate: ContentType, overlap: Overlap) -> bool {
    use ContentType as C;

    if matches!(candidate, C::Cliff) {
        return true;
    }
    if matches!(current, C::Cliff) {
        return matches!(candidate, C::ClearOfCliff) && matches!(overlap, Overlap::Total);
    }
    match candidate {
        C::ClearOfObstacle if matches!(current, C::ClearOfCliff | C::NotInterestingEdge) => false,
        C::InterestingEdge => !current.is_obstacle() && !matches!(current, C::NotInterestingEdge),
        C::NotInterestingEdge => matches!(current, C::InterestingEdge),
        C::ObstacleCubeRemoved => matches!(current, C::ObstacleCube),
        C::ObstacleChargerRemoved => matches!(current, C::ObstacleCharger),
        _ => true,
    }
}

/// Auxiliary data carried by some content types.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContentPayload {
    /// Which way the drop-off faces, as seen when it was detected.
    Cliff {
        /// Direction pointing from the safe side towards the drop.
        direction: Vec2,
    },
}

const PAYLOAD_EPSILON: f64 = 1e-6;

impl PartialEq for ContentPayload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Cliff { direction: a }, Self::Cliff { direction: b }) => {
                (*a - *b).length() <= PAYLOAD_EPSILON
            }
        }
    }
}

impl ContentPayload {
    /// Express the payload in the frame mapped by `transform`.
    ///
    /// Directions only see the linear part of the transform.
    pub fn transformed(&self, transform: Affine) -> Self {
        match *self {
            Self::Cliff { direction } => {
                let [a, b, c, d, _, _] = transform.as_coeffs();
                let rotated = Vec2::new(
                    a * direction.x + c * direction.y,
                    b * direction.x + d * direction.y,
                );
                Self::Cliff { direction: rotated }
            }
        }
    }

    /// Whether two payloads may share one border segment.
    pub(crate) fn is_border_compatible(a: Option<&Self>, b: Option<&Self>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// A content type with its optional payload.
///
/// Two contents are equal when their types match and either both payloads are absent or
/// both are present and equal.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeContent {
    /// The classification.
    pub content_type: ContentType,
    /// Payload for types that carry one.
    pub payload: Option<ContentPayload>,
}

impl NodeContent {
    /// Content without a payload.
    pub const fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            payload: None,
        }
    }

    /// Content with a payload.
    pub const fn with_payload(content_type: ContentType, payload: ContentPayload) -> Self {
        Self {
            content_type,
            payload: Some(payload),
        }
    }

    pub(crate) const fn unknown() -> Self {
        Self::new(ContentType::Unknown)
    }

    pub(crate) const fn subdivided() -> Self {
        Self::new(ContentType::Subdivided)
    }

    pub(crate) const fn invalid() -> Self {
        Self::new(ContentType::Invalid)
    }

    /// The content as it is stored once accepted: removed variants become clear.
    pub(crate) fn stored(&self) -> Self {
        match self.content_type {
            ContentType::ObstacleCubeRemoved | ContentType::ObstacleChargerRemoved => {
                Self::new(self.content_type.stored())
            }
            _ => self.clone(),
        }
    }

    /// The content as seen through `transform`.
    pub(crate) fn transformed(&self, transform: Affine) -> Self {
        Self {
            content_type: self.content_type,
            payload: self.payload.map(|p| p.transformed(transform)),
        }
    }
}
