// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural mutation of the tree: shape insertion, subdivision, merging, and root growth.
//!
//! Every content change and node destruction made here is reported to the [`Processor`] in
//! the same call, so its indices and area totals never lag behind the arena.

use kurbo::{Point, Vec2};
use tracing::debug;

use crate::content::{ContentType, NodeContent, Overlap, can_override};
use crate::error::MapError;
use crate::node::{NodeArena, Placement};
use crate::processor::Processor;
use crate::shape::MapShape;
use crate::types::{NodeId, Quadrant};

/// Mutable view over the arena and its processor.
#[derive(Debug)]
pub(crate) struct NodeEditor<'a> {
    pub(crate) nodes: &'a mut NodeArena,
    pub(crate) processor: &'a mut Processor,
}

impl NodeEditor<'_> {
    /// Allocate the initial root and give it `Unknown` content.
    pub(crate) fn create_root(&mut self, center: Point, side: f64, level: u8) -> NodeId {
        let root = self.nodes.alloc(
            Placement {
                center,
                side,
                level,
                quadrant: Quadrant::Root,
                parent: None,
            },
            NodeContent::invalid(),
        );
        self.force_set_content(root, NodeContent::unknown());
        root
    }

    /// Write `content` into every cell under `id` that `shape` touches.
    ///
    /// Cells the shape fully covers are set in one piece (collapsing their subtree when the
    /// override policy allows it for every leaf). Partially covered cells are split down to
    /// level 0, where the partial override rule decides. Returns whether anything changed.
    pub(crate) fn add_shape(
        &mut self,
        id: NodeId,
        shape: &MapShape,
        content: &NodeContent,
    ) -> bool {
        let (rect, is_leaf, can_subdivide) = {
            let node = self.nodes.node(id);
            if node.content == *content {
                return false;
            }
            (node.rect(), node.is_leaf(), node.can_subdivide())
        };
        if !shape.intersects_rect(rect) {
            return false;
        }

        if shape.contains_rect(rect) {
            if is_leaf {
                return self.try_set_content(id, content, Overlap::Total);
            }
            if self
                .nodes
                .can_override_subtree(id, content.content_type, Overlap::Total)
            {
                self.merge(id, content.stored());
                return true;
            }
        }

        if is_leaf && can_subdivide {
            self.subdivide(id);
        }

        match self.nodes.node(id).children {
            Some(children) => {
                let mut changed = false;
                for child in children {
                    changed |= self.add_shape(child, shape, content);
                }
                self.try_auto_merge(id);
                changed
            }
            None => self.try_set_content(id, content, Overlap::Partial),
        }
    }

    /// Apply the override policy and store `content` if it wins.
    pub(crate) fn try_set_content(
        &mut self,
        id: NodeId,
        content: &NodeContent,
        overlap: Overlap,
    ) -> bool {
        let current = self.nodes.content_type(id);
        if !can_override(current, content.content_type, overlap) {
            return false;
        }
        self.force_set_content(id, content.stored())
    }

    /// Store `content` unconditionally. Returns false if nothing changed.
    pub(crate) fn force_set_content(&mut self, id: NodeId, content: NodeContent) -> bool {
        let node = self.nodes.node_mut(id);
        if node.content == content {
            return false;
        }
        let old = node.content.content_type;
        let area = node.area();
        node.content = content;
        let new = node.content.content_type;
        if old != new {
            self.processor.on_content_type_changed(id, area, old, new);
        }
        true
    }

    /// Split a leaf into four children that inherit its content.
    pub(crate) fn subdivide(&mut self, id: NodeId) {
        let (level, content) = {
            let node = self.nodes.node(id);
            debug_assert!(
                node.is_leaf() && node.can_subdivide(),
                "only leaves above level 0 can be split"
            );
            (node.level, node.content.clone())
        };
        let children = Quadrant::CHILDREN.map(|q| {
            let (center, half) = {
                let node = self.nodes.node(id);
                (node.child_center(q), node.side * 0.5)
            };
            let child = self.nodes.alloc(
                Placement {
                    center,
                    side: half,
                    level: level - 1,
                    quadrant: q,
                    parent: Some(id),
                },
                content.clone(),
            );
            self.processor.on_content_type_changed(
                child,
                half * half,
                ContentType::Invalid,
                content.content_type,
            );
            child
        });
        self.nodes.node_mut(id).children = Some(children);
        self.force_set_content(id, NodeContent::subdivided());
    }

    /// Drop every descendant of `id` and give it `content`.
    pub(crate) fn merge(&mut self, id: NodeId, content: NodeContent) {
        self.destroy_descendants(id);
        self.force_set_content(id, content);
    }

    fn destroy_descendants(&mut self, id: NodeId) {
        let Some(children) = self.nodes.node_mut(id).children.take() else {
            return;
        };
        for child in children {
            self.destroy_descendants(child);
            let (area, ty) = {
                let node = self.nodes.node(child);
                (node.area(), node.content.content_type)
            };
            self.processor.on_node_destroyed(child, area, ty);
            debug_assert!(
                !self.processor.references(child),
                "processor still references a destroyed node"
            );
            self.nodes.free(child);
        }
    }

    /// Collapse `id` if its four children are leaves with identical content.
    pub(crate) fn try_auto_merge(&mut self, id: NodeId) -> bool {
        let Some(children) = self.nodes.node(id).children else {
            return false;
        };
        let first = &self.nodes.node(children[0]).content;
        if first.content_type == ContentType::Subdivided {
            return false;
        }
        if !children[1..]
            .iter()
            .all(|&c| self.nodes.node(c).content == *first)
        {
            return false;
        }
        let content = first.clone();
        self.merge(id, content);
        true
    }

    /// Wrap `root` in a parent one level up, extending the map towards `hint`.
    ///
    /// The old root keeps its position and becomes the child opposite the growth direction;
    /// the three new siblings start out `Unknown`. If the old root was an `Unknown` leaf the
    /// new root collapses back into a single `Unknown` leaf.
    pub(crate) fn upgrade_root(
        &mut self,
        root: NodeId,
        hint: Vec2,
        max_level: u8,
    ) -> Result<NodeId, MapError> {
        let (center, side, level) = {
            let node = self.nodes.node(root);
            (node.center, node.side, node.level)
        };
        if level >= max_level {
            return Err(MapError::ExpansionLimit { level, max_level });
        }
        let toward = Quadrant::towards(hint);
        let old_slot = toward.opposite();
        let (sx, sy) = toward.offset_sign();
        let new_center = center + Vec2::new(sx, sy) * (side * 0.5);

        // Subdivided is neither indexed nor explored: nothing to report for the new root.
        let new_root = self.nodes.alloc(
            Placement {
                center: new_center,
                side: side * 2.0,
                level: level + 1,
                quadrant: Quadrant::Root,
                parent: None,
            },
            NodeContent::subdivided(),
        );
        let children = Quadrant::CHILDREN.map(|q| {
            if q == old_slot {
                return root;
            }
            let center = self.nodes.node(new_root).child_center(q);
            let sibling = self.nodes.alloc(
                Placement {
                    center,
                    side,
                    level,
                    quadrant: q,
                    parent: Some(new_root),
                },
                NodeContent::unknown(),
            );
            self.processor.on_content_type_changed(
                sibling,
                side * side,
                ContentType::Invalid,
                ContentType::Unknown,
            );
            sibling
        });
        {
            let old = self.nodes.node_mut(root);
            old.parent = Some(new_root);
            old.quadrant = old_slot;
        }
        self.nodes.node_mut(new_root).children = Some(children);
        // An untouched old root is as unknown as its new siblings.
        self.try_auto_merge(new_root);
        debug!(
            level = level + 1,
            side = side * 2.0,
            x = new_center.x,
            y = new_center.y,
            "nav map root grew"
        );
        Ok(new_root)
    }

    /// Rewrite the leaf containing `point` if it still holds `expected`, then collapse any
    /// ancestors that became uniform.
    pub(crate) fn rewrite_leaf_at(
        &mut self,
        root: NodeId,
        point: Point,
        expected: ContentType,
        content: &NodeContent,
    ) -> bool {
        let Some(leaf) = self.nodes.leaf_containing(root, point) else {
            return false;
        };
        if self.nodes.content_type(leaf) != expected {
            return false;
        }
        if !self.try_set_content(leaf, content, Overlap::Total) {
            return false;
        }
        let mut parent = self.nodes.node(leaf).parent;
        while let Some(p) = parent {
            if !self.try_auto_merge(p) {
                break;
            }
            parent = self.nodes.node(p).parent;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Line, Rect};

    use super::*;
    use crate::config::MapConfig;
    use crate::shape::Quad;

    struct Fixture {
        nodes: NodeArena,
        processor: Processor,
        root: NodeId,
    }

    impl Fixture {
        /// A 4 m root at level 2 (1 m cells at level 0).
        fn new() -> Self {
            let config = MapConfig {
                min_cell_size: 1.0,
                initial_root_level: 2,
                max_root_level: 4,
                ..MapConfig::default()
            };
            let mut nodes = NodeArena::new();
            let mut processor = Processor::new(&config);
            let root = NodeEditor {
                nodes: &mut nodes,
                processor: &mut processor,
            }
            .create_root(Point::ORIGIN, 4.0, 2);
            Self {
                nodes,
                processor,
                root,
            }
        }

        fn editor(&mut self) -> NodeEditor<'_> {
            NodeEditor {
                nodes: &mut self.nodes,
                processor: &mut self.processor,
            }
        }
    }

    fn clear() -> NodeContent {
        NodeContent::new(ContentType::ClearOfObstacle)
    }

    #[test]
    fn covering_quad_sets_root_without_splitting() {
        let mut f = Fixture::new();
        let root = f.root;
        let quad = MapShape::from(Quad::from_rect(Rect::new(-3.0, -3.0, 3.0, 3.0)));
        assert!(f.editor().add_shape(root, &quad, &clear()), "root should change");
        assert!(f.nodes.node(root).is_leaf(), "no split for a covering quad");
        assert_eq!(f.nodes.content_type(root), ContentType::ClearOfObstacle);
        assert!((f.processor.explored_area() - 16.0).abs() < 1e-9);
        assert!(!f.editor().add_shape(root, &quad, &clear()), "same write is a no-op");
    }

    #[test]
    fn small_quad_splits_to_one_cell() {
        let mut f = Fixture::new();
        let root = f.root;
        let quad = MapShape::from(Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0)));
        let cube = NodeContent::new(ContentType::ObstacleCube);
        assert!(f.editor().add_shape(root, &quad, &cube), "cell should change");
        assert_eq!(f.nodes.len(), 9, "root, four children, four grandchildren");
        let leaf = f.nodes.leaf_containing(root, Point::new(0.5, 0.5)).unwrap();
        assert_eq!(f.nodes.node(leaf).level, 0);
        assert_eq!(f.nodes.content_type(leaf), ContentType::ObstacleCube);
        assert!(f.processor.has_content_type(ContentType::ObstacleCube));
        assert!((f.processor.explored_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_children_merge_back() {
        let mut f = Fixture::new();
        let root = f.root;
        let left = MapShape::from(Quad::from_rect(Rect::new(-2.0, -2.0, 0.0, 2.0)));
        let right = MapShape::from(Quad::from_rect(Rect::new(0.0, -2.0, 2.0, 2.0)));
        f.editor().add_shape(root, &left, &clear());
        assert!(!f.nodes.node(root).is_leaf(), "half-covered root must split");
        f.editor().add_shape(root, &right, &clear());
        assert!(f.nodes.node(root).is_leaf(), "uniform root must merge");
        assert_eq!(f.nodes.len(), 1);
        assert_eq!(f.nodes.content_type(root), ContentType::ClearOfObstacle);
    }

    #[test]
    fn removed_obstacle_is_stored_as_clear() {
        let mut f = Fixture::new();
        let root = f.root;
        let cell = MapShape::from(Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0)));
        f.editor()
            .add_shape(root, &cell, &NodeContent::new(ContentType::ObstacleCube));
        f.editor().add_shape(
            root,
            &cell,
            &NodeContent::new(ContentType::ObstacleCubeRemoved),
        );
        let leaf = f.nodes.leaf_containing(root, Point::new(0.5, 0.5)).unwrap();
        assert_eq!(f.nodes.content_type(leaf), ContentType::ClearOfObstacle);
        assert!(!f.processor.has_content_type(ContentType::ObstacleCube));
    }

    #[test]
    fn line_touches_cells_on_both_sides() {
        let mut f = Fixture::new();
        let root = f.root;
        let line = MapShape::from(Line::new((0.5, 1.0), (0.9, 1.0)));
        let edge = NodeContent::new(ContentType::InterestingEdge);
        f.editor().add_shape(root, &line, &edge);
        let edged = f
            .nodes
            .leaves(root)
            .filter(|&l| f.nodes.content_type(l) == ContentType::InterestingEdge)
            .count();
        assert_eq!(edged, 2, "one cell above and one below the segment");
        assert!((f.processor.interesting_edge_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn root_growth_keeps_old_root_in_place() {
        let mut f = Fixture::new();
        let old = f.root;
        let cover = MapShape::from(Quad::from_rect(Rect::new(-2.0, -2.0, 2.0, 2.0)));
        f.editor().add_shape(old, &cover, &clear());
        let new_root = f
            .editor()
            .upgrade_root(old, Vec2::new(5.0, 5.0), 4)
            .unwrap();
        let n = f.nodes.node(new_root);
        assert_eq!(n.level, 3);
        assert_eq!(n.center, Point::new(2.0, 2.0));
        assert_eq!(n.side, 8.0);
        assert_eq!(f.nodes.child(new_root, Quadrant::BotLeft), Some(old));
        assert_eq!(f.nodes.node(old).center, Point::ORIGIN);
        assert_eq!(f.nodes.node(old).parent, Some(new_root));
        let tr = f.nodes.child(new_root, Quadrant::TopRight).unwrap();
        assert_eq!(f.nodes.content_type(tr), ContentType::Unknown);
        assert_eq!(f.nodes.node(tr).center, Point::new(4.0, 4.0));

        let top = f.editor().upgrade_root(new_root, Vec2::new(-1.0, 1.0), 4).unwrap();
        assert_eq!(
            f.editor().upgrade_root(top, Vec2::new(1.0, 1.0), 4),
            Err(MapError::ExpansionLimit {
                level: 4,
                max_level: 4
            })
        );
    }

    #[test]
    fn growing_an_unknown_root_collapses() {
        let mut f = Fixture::new();
        let old = f.root;
        let new_root = f
            .editor()
            .upgrade_root(old, Vec2::new(-1.0, -1.0), 4)
            .unwrap();
        assert!(!f.nodes.is_alive(old), "old root merged away");
        assert!(f.nodes.node(new_root).is_leaf());
        assert_eq!(f.nodes.content_type(new_root), ContentType::Unknown);
        assert_eq!(f.nodes.node(new_root).center, Point::new(-2.0, -2.0));
        assert_eq!(f.nodes.len(), 1);
    }

    #[test]
    fn rewrite_merges_ancestors() {
        let mut f = Fixture::new();
        let root = f.root;
        let cell = MapShape::from(Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0)));
        f.editor()
            .add_shape(root, &cell, &NodeContent::new(ContentType::InterestingEdge));
        assert!(!f.editor().rewrite_leaf_at(
            root,
            Point::new(0.5, 0.5),
            ContentType::ObstacleCube,
            &NodeContent::unknown()
        ));
        assert!(f.editor().rewrite_leaf_at(
            root,
            Point::new(0.5, 0.5),
            ContentType::InterestingEdge,
            &NodeContent::unknown()
        ));
        assert!(f.nodes.node(root).is_leaf(), "all-unknown tree collapses to the root");
        assert_eq!(f.processor.interesting_edge_area(), 0.0);
    }
}
