// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quadtree addressing: node identifiers, quadrants, and walking directions.
//!
//! The map uses a y-up frame: [`Direction::North`] is `+y` and [`Direction::East`] is `+x`.

use kurbo::Vec2;

/// Identifier for a node in the quadtree.
///
/// This is a small, copyable handle that stays stable while the node exists but becomes
/// invalid when the node is merged away and its slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On allocation, a fresh slot is handed out with generation `1`.
/// - When a node is destroyed (auto-merge, total override of a subtree), its slot is freed;
///   any existing `NodeId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// The ordering is only used to make index iteration deterministic.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Position of a node relative to its parent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Quadrant {
    /// `-x`, `+y` child.
    TopLeft,
    /// `+x`, `+y` child.
    TopRight,
    /// `-x`, `-y` child.
    BotLeft,
    /// `+x`, `-y` child.
    BotRight,
    /// The root has no parent.
    Root,
}

impl Quadrant {
    /// The four child quadrants in child-array order.
    pub(crate) const CHILDREN: [Self; 4] =
        [Self::TopLeft, Self::TopRight, Self::BotLeft, Self::BotRight];

    /// Index into a parent's child array. The root maps to `None`.
    pub(crate) const fn child_index(self) -> Option<usize> {
        match self {
            Self::TopLeft => Some(0),
            Self::TopRight => Some(1),
            Self::BotLeft => Some(2),
            Self::BotRight => Some(3),
            Self::Root => None,
        }
    }

    /// Unit offset of this quadrant's center from its parent's center, in quarter side lengths.
    pub(crate) const fn offset_sign(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (-1.0, 1.0),
            Self::TopRight => (1.0, 1.0),
            Self::BotLeft => (-1.0, -1.0),
            Self::BotRight => (1.0, -1.0),
            Self::Root => (0.0, 0.0),
        }
    }

    /// The quadrant on the far side of the parent: the slot an old root takes when the
    /// tree grows towards `self`.
    pub(crate) const fn opposite(self) -> Self {
        match self {
            Self::TopLeft => Self::BotRight,
            Self::TopRight => Self::BotLeft,
            Self::BotLeft => Self::TopRight,
            Self::BotRight => Self::TopLeft,
            Self::Root => Self::Root,
        }
    }

    /// The child quadrant a growth hint points into.
    pub(crate) fn towards(hint: Vec2) -> Self {
        match (hint.x >= 0.0, hint.y >= 0.0) {
            (true, true) => Self::TopRight,
            (false, true) => Self::TopLeft,
            (true, false) => Self::BotRight,
            (false, false) => Self::BotLeft,
        }
    }
}

/// Cardinal direction in the map frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// `+y`.
    North,
    /// `+x`.
    East,
    /// `-y`.
    South,
    /// `-x`.
    West,
}

impl Direction {
    /// All directions in clockwise order, starting at north.
    pub const CLOCKWISE: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// The direction pointing the other way.
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }

    /// The next direction when turning in `rotation`.
    pub(crate) const fn rotated(self, rotation: Rotation) -> Self {
        match (self, rotation) {
            (Self::North, Rotation::Clockwise) | (Self::South, Rotation::CounterClockwise) => {
                Self::East
            }
            (Self::East, Rotation::Clockwise) | (Self::West, Rotation::CounterClockwise) => {
                Self::South
            }
            (Self::South, Rotation::Clockwise) | (Self::North, Rotation::CounterClockwise) => {
                Self::West
            }
            (Self::West, Rotation::Clockwise) | (Self::East, Rotation::CounterClockwise) => {
                Self::North
            }
        }
    }

    /// Unit vector for this direction.
    pub const fn unit(self) -> Vec2 {
        match self {
            Self::North => Vec2::new(0.0, 1.0),
            Self::East => Vec2::new(1.0, 0.0),
            Self::South => Vec2::new(0.0, -1.0),
            Self::West => Vec2::new(-1.0, 0.0),
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }
}

/// Order in which neighbors along an edge are reported.
///
/// Clockwise means "clockwise around the node asking": along its north edge that is
/// west to east, along its east edge north to south, and so on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Rotation {
    /// Clockwise around the asking node.
    Clockwise,
    /// Counter-clockwise around the asking node.
    CounterClockwise,
}

/// One step of the neighbor search for a `(quadrant, direction)` pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum NeighborStep {
    /// The neighbor shares our parent and sits in this quadrant.
    Sibling(Quadrant),
    /// Ask the parent's neighbor in the same direction, then descend into this quadrant of it.
    ViaParent(Quadrant),
}

use NeighborStep::{Sibling, ViaParent};
use Quadrant::{BotLeft, BotRight, TopLeft, TopRight};

/// Rows are child quadrants (`TopLeft`, `TopRight`, `BotLeft`, `BotRight`);
/// columns are directions (`North`, `East`, `South`, `West`).
const NEIGHBOR_TABLE: [[NeighborStep; 4]; 4] = [
    [
        ViaParent(BotLeft),
        Sibling(TopRight),
        Sibling(BotLeft),
        ViaParent(TopRight),
    ],
    [
        ViaParent(BotRight),
        ViaParent(TopLeft),
        Sibling(BotRight),
        Sibling(TopLeft),
    ],
    [
        Sibling(TopLeft),
        Sibling(BotRight),
        ViaParent(TopLeft),
        ViaParent(BotRight),
    ],
    [
        Sibling(TopRight),
        ViaParent(BotLeft),
        ViaParent(TopRight),
        Sibling(BotLeft),
    ],
];

/// Neighbor search step, or `None` for the root (which has no neighbors).
pub(crate) fn neighbor_step(quadrant: Quadrant, direction: Direction) -> Option<NeighborStep> {
    let row = quadrant.child_index()?;
    Some(NEIGHBOR_TABLE[row][direction.index()])
}

/// Children of a node lying along the edge that faces back towards an asker located in
/// `direction.opposite()`, ordered by `rotation` around the asker.
///
/// `direction` is the direction from the asker to the node being descended.
pub(crate) const fn facing_children(direction: Direction, rotation: Rotation) -> [Quadrant; 2] {
    let clockwise = match direction {
        Direction::North => [BotLeft, BotRight],
        Direction::East => [TopLeft, BotLeft],
        Direction::South => [TopRight, TopLeft],
        Direction::West => [BotRight, TopRight],
    };
    match rotation {
        Rotation::Clockwise => clockwise,
        Rotation::CounterClockwise => [clockwise[1], clockwise[0]],
    }
}
