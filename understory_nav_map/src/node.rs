// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node storage: a generational slot arena of square cells and the read-only structural
//! queries over it (containment, neighbors, leaf enumeration).
//!
//! Children are owned through the arena: a node holds either no children or exactly four,
//! and parent links are plain [`NodeId`]s used for upward traversal only.

use kurbo::{Point, Rect};

use crate::content::{ContentType, NodeContent, Overlap, can_override};
use crate::shape::rect_contains_point;
use crate::types::{
    Direction, NeighborStep, NodeId, Quadrant, Rotation, facing_children, neighbor_step,
};

/// A square cell of the map.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    generation: u32,
    pub(crate) center: Point,
    pub(crate) side: f64,
    pub(crate) level: u8,
    pub(crate) quadrant: Quadrant,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<[NodeId; 4]>,
    pub(crate) content: NodeContent,
}

impl Node {
    pub(crate) fn rect(&self) -> Rect {
        let h = self.side * 0.5;
        Rect::new(
            self.center.x - h,
            self.center.y - h,
            self.center.x + h,
            self.center.y + h,
        )
    }

    pub(crate) fn area(&self) -> f64 {
        self.side * self.side
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub(crate) fn can_subdivide(&self) -> bool {
        self.level > 0
    }

    /// Center of the child that would sit in `quadrant`.
    pub(crate) fn child_center(&self, quadrant: Quadrant) -> Point {
        let (sx, sy) = quadrant.offset_sign();
        let q = self.side * 0.25;
        Point::new(self.center.x + sx * q, self.center.y + sy * q)
    }
}

/// Geometry of a node about to be allocated.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Placement {
    pub(crate) center: Point,
    pub(crate) side: f64,
    pub(crate) level: u8,
    pub(crate) quadrant: Quadrant,
    pub(crate) parent: Option<NodeId>,
}

/// Generational slot storage for nodes.
#[derive(Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
}

impl core::fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeArena")
            .field("nodes_total", &self.nodes.len())
            .field("nodes_alive", &self.len())
            .field("free_list", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocate a node. The caller is responsible for telling the processor about its content.
    pub(crate) fn alloc(&mut self, at: Placement, content: NodeContent) -> NodeId {
        let make = |generation| Node {
            generation,
            center: at.center,
            side: at.side,
            level: at.level,
            quadrant: at.quadrant,
            parent: at.parent,
            children: None,
            content,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(make(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(make(generation)));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId uses 32-bit indices by design."
        )]
        NodeId::new(idx as u32, generation)
    }

    /// Release a node's slot. Its children must already be gone.
    pub(crate) fn free(&mut self, id: NodeId) {
        debug_assert!(
            self.node(id).is_leaf(),
            "freeing a node that still owns children"
        );
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Returns true if `id` refers to a live node.
    pub(crate) fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    /// Number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        let node = self.nodes[id.idx()].as_ref().expect("dangling NodeId");
        debug_assert_eq!(node.generation, id.1, "stale NodeId generation");
        node
    }

    /// Access a node mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        let node = self.nodes[id.idx()].as_mut().expect("dangling NodeId");
        debug_assert_eq!(node.generation, id.1, "stale NodeId generation");
        node
    }

    pub(crate) fn content_type(&self, id: NodeId) -> ContentType {
        self.node(id).content.content_type
    }

    /// The child of `id` in `quadrant`, if `id` is subdivided.
    pub(crate) fn child(&self, id: NodeId, quadrant: Quadrant) -> Option<NodeId> {
        let children = self.node(id).children?;
        Some(children[quadrant.child_index()?])
    }

    /// Whether `id` and its whole subtree may take `candidate`.
    pub(crate) fn can_override_subtree(
        &self,
        id: NodeId,
        candidate: ContentType,
        overlap: Overlap,
    ) -> bool {
        let node = self.node(id);
        match node.children {
            None => can_override(node.content.content_type, candidate, overlap),
            Some(children) => children
                .iter()
                .all(|&c| self.can_override_subtree(c, candidate, overlap)),
        }
    }

    /// The smallest node under `root` containing `point` (boundaries inclusive; ties go to
    /// the `+x`/`+y` side).
    pub(crate) fn leaf_containing(&self, root: NodeId, point: Point) -> Option<NodeId> {
        if !rect_contains_point(self.node(root).rect(), point) {
            return None;
        }
        let mut id = root;
        while let Some(children) = self.node(id).children {
            let center = self.node(id).center;
            let quadrant = match (point.x >= center.x, point.y >= center.y) {
                (false, true) => Quadrant::TopLeft,
                (true, true) => Quadrant::TopRight,
                (false, false) => Quadrant::BotLeft,
                (true, false) => Quadrant::BotRight,
            };
            id = children[quadrant.child_index()?];
        }
        Some(id)
    }

    /// The neighbor of `id` in `direction` at the same level, or the coarser leaf covering
    /// that side when no same-level node exists. `None` past the edge of the map.
    pub(crate) fn find_single_neighbor(&self, id: NodeId, direction: Direction) -> Option<NodeId> {
        let node = self.node(id);
        let parent = node.parent?;
        match neighbor_step(node.quadrant, direction)? {
            NeighborStep::Sibling(q) => self.child(parent, q),
            NeighborStep::ViaParent(q) => {
                let outer = self.find_single_neighbor(parent, direction)?;
                Some(self.child(outer, q).unwrap_or(outer))
            }
        }
    }

    /// Append the leaves touching `id` along its `direction` edge, ordered by `rotation`
    /// around `id`.
    ///
    /// A coarser neighbor is reported once; a subdivided neighbor is descended to its
    /// finest cells along the shared edge.
    pub(crate) fn add_smallest_neighbors(
        &self,
        id: NodeId,
        direction: Direction,
        rotation: Rotation,
        out: &mut Vec<NodeId>,
    ) {
        if let Some(neighbor) = self.find_single_neighbor(id, direction) {
            self.add_facing_leaves(neighbor, direction, rotation, out);
        }
    }

    fn add_facing_leaves(
        &self,
        id: NodeId,
        direction: Direction,
        rotation: Rotation,
        out: &mut Vec<NodeId>,
    ) {
        if self.node(id).is_leaf() {
            out.push(id);
            return;
        }
        for q in facing_children(direction, rotation) {
            if let Some(child) = self.child(id, q) {
                self.add_facing_leaves(child, direction, rotation, out);
            }
        }
    }

    /// Depth-first iterator over the leaves under `root`.
    pub(crate) fn leaves(&self, root: NodeId) -> Leaves<'_> {
        Leaves {
            nodes: self,
            stack: vec![root],
        }
    }
}

/// Depth-first leaf iterator; children are visited in `TopLeft`, `TopRight`, `BotLeft`,
/// `BotRight` order.
#[derive(Debug)]
pub(crate) struct Leaves<'a> {
    nodes: &'a NodeArena,
    stack: Vec<NodeId>,
}

impl Iterator for Leaves<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            match self.nodes.node(id).children {
                None => return Some(id),
                Some(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_placement(side: f64, level: u8) -> Placement {
        Placement {
            center: Point::ORIGIN,
            side,
            level,
            quadrant: Quadrant::Root,
            parent: None,
        }
    }

    /// Split `id` by hand, without any processor bookkeeping.
    fn split(arena: &mut NodeArena, id: NodeId) -> [NodeId; 4] {
        let (side, level, content) = {
            let n = arena.node(id);
            (n.side, n.level, n.content.clone())
        };
        let children = Quadrant::CHILDREN.map(|q| {
            let center = arena.node(id).child_center(q);
            arena.alloc(
                Placement {
                    center,
                    side: side * 0.5,
                    level: level - 1,
                    quadrant: q,
                    parent: Some(id),
                },
                content.clone(),
            )
        });
        arena.node_mut(id).children = Some(children);
        children
    }

    #[test]
    fn slots_are_reused_with_new_generation() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(root_placement(4.0, 2), NodeContent::unknown());
        let [a, ..] = split(&mut arena, root);
        assert_eq!(arena.len(), 5);
        let children = arena.node_mut(root).children.take().unwrap();
        for c in children {
            arena.free(c);
        }
        assert!(!arena.is_alive(a));
        assert_eq!(arena.len(), 1);
        let [b, ..] = split(&mut arena, root);
        assert!(arena.is_alive(b));
        assert!(!arena.is_alive(a));
        if a.0 == b.0 {
            assert!(b.1 > a.1, "generation must increase on reuse");
        }
    }

    #[test]
    fn sibling_and_cousin_neighbors() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(root_placement(4.0, 2), NodeContent::unknown());
        let [tl, tr, bl, br] = split(&mut arena, root);
        assert_eq!(arena.find_single_neighbor(tl, Direction::East), Some(tr));
        assert_eq!(arena.find_single_neighbor(tl, Direction::South), Some(bl));
        assert_eq!(arena.find_single_neighbor(tl, Direction::North), None);
        assert_eq!(arena.find_single_neighbor(root, Direction::East), None);

        // Split the top-right cell; its bottom-left child borders BotRight from above
        // and TopLeft from the east.
        let [_, _, tr_bl, tr_br] = split(&mut arena, tr);
        assert_eq!(arena.find_single_neighbor(tr_bl, Direction::West), Some(tl));
        assert_eq!(arena.find_single_neighbor(tr_bl, Direction::South), Some(br));
        assert_eq!(arena.find_single_neighbor(br, Direction::North), Some(tr));

        let mut out = Vec::new();
        arena.add_smallest_neighbors(br, Direction::North, Rotation::Clockwise, &mut out);
        assert_eq!(out, vec![tr_bl, tr_br], "west to east along the north edge");
        out.clear();
        arena.add_smallest_neighbors(br, Direction::North, Rotation::CounterClockwise, &mut out);
        assert_eq!(out, vec![tr_br, tr_bl]);
        out.clear();
        arena.add_smallest_neighbors(tr_bl, Direction::West, Rotation::Clockwise, &mut out);
        assert_eq!(out, vec![tl], "coarser neighbor is reported once");
    }

    #[test]
    fn leaf_lookup_and_enumeration() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(root_placement(4.0, 2), NodeContent::unknown());
        let [tl, tr, bl, br] = split(&mut arena, root);
        let [a, b, c, d] = split(&mut arena, bl);
        assert_eq!(arena.leaf_containing(root, Point::new(-1.5, -0.5)), Some(a));
        assert_eq!(arena.leaf_containing(root, Point::new(1.0, 1.0)), Some(tr));
        assert_eq!(arena.leaf_containing(root, Point::new(0.0, 0.0)), Some(tr));
        assert_eq!(arena.leaf_containing(root, Point::new(3.0, 0.0)), None);
        let leaves: Vec<_> = arena.leaves(root).collect();
        assert_eq!(leaves, vec![tl, tr, a, b, c, d, br]);
        assert!(arena.can_override_subtree(root, ContentType::ClearOfObstacle, Overlap::Total));
    }
}
