// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The quadtree: owns the node arena, its processor and the current root.

use kurbo::{Affine, Line, Point, Rect};
use tracing::{debug, error};

use crate::border::BorderRegion;
use crate::config::MapConfig;
use crate::content::{ContentType, ContentTypes, NodeContent};
use crate::edit::NodeEditor;
use crate::error::MapError;
use crate::node::NodeArena;
use crate::processor::Processor;
use crate::shape::{MapShape, Quad, rect_contains_rect};
use crate::types::NodeId;

/// Summary of one leaf, as produced by [`NavMemoryMap::leaves`](crate::NavMemoryMap::leaves).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeafInfo {
    /// Center of the cell.
    pub center: Point,
    /// Side length of the cell, in meters.
    pub side_length: f64,
    /// Level of the cell (0 is the finest).
    pub level: u8,
    /// Content type of the cell.
    pub content_type: ContentType,
}

/// Adaptive quadtree over the map plane.
pub(crate) struct QuadTree {
    nodes: NodeArena,
    processor: Processor,
    root: NodeId,
    config: MapConfig,
}

impl core::fmt::Debug for QuadTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuadTree")
            .field("root", &self.root)
            .field("root_level", &self.root_level())
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl QuadTree {
    pub(crate) fn new(config: MapConfig) -> Self {
        let mut nodes = NodeArena::new();
        let mut processor = Processor::new(&config);
        let side = config.side_length_at(config.initial_root_level);
        let root = NodeEditor {
            nodes: &mut nodes,
            processor: &mut processor,
        }
        .create_root(config.origin, side, config.initial_root_level);
        Self {
            nodes,
            processor,
            root,
            config,
        }
    }

    fn editor(&mut self) -> NodeEditor<'_> {
        NodeEditor {
            nodes: &mut self.nodes,
            processor: &mut self.processor,
        }
    }

    pub(crate) fn config(&self) -> &MapConfig {
        &self.config
    }

    pub(crate) fn bounds(&self) -> Rect {
        self.nodes.node(self.root).rect()
    }

    pub(crate) fn root_level(&self) -> u8 {
        self.nodes.node(self.root).level
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Grow the root until it covers `region`.
    ///
    /// Each step doubles the side. A write gets at most
    /// [`MapConfig::max_growth_steps_per_write`] steps and never grows past
    /// [`MapConfig::max_root_level`].
    fn expand_to_fit(&mut self, region: Rect) -> Result<(), MapError> {
        let max_level = self.config.max_root_level;
        let attempts = usize::from(self.config.max_growth_steps_per_write);
        for _ in 0..attempts {
            let root = self.nodes.node(self.root);
            if rect_contains_rect(root.rect(), region) {
                return Ok(());
            }
            let (old_root, hint) = (self.root, region.center() - root.center);
            self.root = self.editor().upgrade_root(old_root, hint, max_level)?;
        }
        if rect_contains_rect(self.bounds(), region) {
            Ok(())
        } else {
            Err(MapError::InsufficientGrowth { attempts })
        }
    }

    /// Write `content` into the cells touched by `shape`, growing the root first if needed.
    pub(crate) fn add_shape(
        &mut self,
        shape: &MapShape,
        content: &NodeContent,
    ) -> Result<bool, MapError> {
        if !shape.is_finite() {
            return Err(MapError::NonFiniteShape);
        }
        self.expand_to_fit(shape.bounding_box())?;
        let root = self.root;
        Ok(self.editor().add_shape(root, shape, content))
    }

    /// Copy every explored leaf of `other` into this tree through `transform`.
    ///
    /// Leaves are written as quads so the usual override and merge rules apply; rotated
    /// cells land on this tree's grid at its own resolution.
    /// A leaf that cannot be placed is logged and skipped.
    pub(crate) fn merge(&mut self, other: &Self, transform: Affine) -> bool {
        let mut changed = false;
        for leaf in other.nodes.leaves(other.root) {
            let node = other.nodes.node(leaf);
            if matches!(
                node.content.content_type,
                ContentType::Unknown | ContentType::Invalid
            ) {
                continue;
            }
            let quad = Quad::from_rect(node.rect()).transformed(transform);
            let content = node.content.transformed(transform);
            match self.add_shape(&MapShape::Quad(quad), &content) {
                Ok(c) => changed |= c,
                Err(err) => error!(%err, "foreign map leaf dropped during merge"),
            }
        }
        if changed {
            debug!(nodes = self.node_count(), "merged foreign map");
        }
        changed
    }

    /// Reclassify indexed `filled` cells that touch a `filling` neighbor as `content`.
    pub(crate) fn fill_border(
        &mut self,
        filled: ContentType,
        filling: ContentTypes,
        content: &NodeContent,
    ) -> bool {
        let points = self
            .processor
            .border_fill_points(&self.nodes, filled, filling);
        self.rewrite_points(&points, filled, content)
    }

    /// Reclassify every `ty` cell as `content`, optionally only those centered in `within`.
    pub(crate) fn replace_content(
        &mut self,
        ty: ContentType,
        content: &NodeContent,
        within: Option<&Quad>,
    ) -> bool {
        let points = self
            .processor
            .content_points(&self.nodes, self.root, ty, within);
        self.rewrite_points(&points, ty, content)
    }

    fn rewrite_points(
        &mut self,
        points: &[Point],
        expected: ContentType,
        content: &NodeContent,
    ) -> bool {
        let root = self.root;
        let mut changed = false;
        for &p in points {
            changed |= self.editor().rewrite_leaf_at(root, p, expected, content);
        }
        changed
    }

    pub(crate) fn has_content_type(&self, ty: ContentType) -> bool {
        if self.processor.is_cacheable(ty) {
            self.processor.has_content_type(ty)
        } else {
            self.nodes
                .leaves(self.root)
                .any(|id| self.nodes.content_type(id) == ty)
        }
    }

    pub(crate) fn has_borders(&self, inner: ContentType, outer: ContentTypes) -> bool {
        self.processor.has_borders(&self.nodes, inner, outer)
    }

    pub(crate) fn get_borders(
        &mut self,
        inner: ContentType,
        outer: ContentTypes,
    ) -> Vec<BorderRegion> {
        self.processor.get_borders(&self.nodes, inner, outer)
    }

    pub(crate) fn has_collision_ray_with_types(
        &self,
        from: Point,
        to: Point,
        types: ContentTypes,
    ) -> bool {
        self.processor.has_collision_ray_with_types(
            &self.nodes,
            self.root,
            Line::new(from, to),
            types,
        )
    }

    pub(crate) fn explored_area(&self) -> f64 {
        self.processor.explored_area()
    }

    pub(crate) fn interesting_edge_area(&self) -> f64 {
        self.processor.interesting_edge_area()
    }

    pub(crate) fn content_at(&self, point: Point) -> Option<&NodeContent> {
        let leaf = self.nodes.leaf_containing(self.root, point)?;
        Some(&self.nodes.node(leaf).content)
    }

    pub(crate) fn leaves(&self) -> impl Iterator<Item = LeafInfo> + '_ {
        self.nodes.leaves(self.root).map(|id| {
            let node = self.nodes.node(id);
            LeafInfo {
                center: node.center,
                side_length: node.side,
                level: node.level,
                content_type: node.content.content_type,
            }
        })
    }

    /// Check every structural and bookkeeping invariant, panicking on the first violation.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        let mut explored = 0.0;
        let mut edges = 0.0;
        let mut stack = vec![self.root];
        assert!(
            self.nodes.node(self.root).parent.is_none(),
            "root must have no parent"
        );
        while let Some(id) = stack.pop() {
            assert!(self.nodes.is_alive(id), "reachable node {id:?} is dead");
            let node = self.nodes.node(id);
            let ty = node.content.content_type;
            assert_ne!(ty, ContentType::Invalid, "{id:?} was never written");
            match node.children {
                Some(children) => {
                    assert_eq!(ty, ContentType::Subdivided, "{id:?} has children");
                    let first = &self.nodes.node(children[0]).content;
                    let uniform = first.content_type != ContentType::Subdivided
                        && children
                            .iter()
                            .all(|&c| self.nodes.node(c).content == *first);
                    assert!(!uniform, "{id:?} should have been merged");
                    for c in children {
                        let child = self.nodes.node(c);
                        assert_eq!(child.parent, Some(id), "child {c:?} parent link");
                        assert_eq!(child.level + 1, node.level, "child {c:?} level");
                        assert!(
                            (child.side * 2.0 - node.side).abs() < 1e-9,
                            "child {c:?} side"
                        );
                        stack.push(c);
                    }
                }
                None => {
                    assert_ne!(ty, ContentType::Subdivided, "leaf {id:?} is subdivided");
                    assert!(
                        !matches!(
                            ty,
                            ContentType::ObstacleCubeRemoved | ContentType::ObstacleChargerRemoved
                        ),
                        "removed variants are never stored"
                    );
                    if ty.is_explored() {
                        explored += node.area();
                    }
                    if ty == ContentType::InterestingEdge {
                        edges += node.area();
                    }
                }
            }
            assert_eq!(
                self.processor.nodes_of_type(ty).any(|n| n == id),
                self.processor.is_cacheable(ty),
                "{id:?} index membership for {ty:?}"
            );
        }
        for ty in [
            ContentType::ObstacleCube,
            ContentType::ObstacleCharger,
            ContentType::ObstacleUnrecognized,
            ContentType::Cliff,
            ContentType::InterestingEdge,
            ContentType::NotInterestingEdge,
        ] {
            for id in self.processor.nodes_of_type(ty) {
                assert!(self.nodes.is_alive(id), "index holds dead {id:?}");
                assert_eq!(self.nodes.content_type(id), ty, "index type for {id:?}");
            }
        }
        assert!(
            (self.explored_area() - explored).abs() < 1e-6,
            "explored area {} != {explored}",
            self.explored_area()
        );
        assert!(
            (self.interesting_edge_area() - edges).abs() < 1e-6,
            "edge area {} != {edges}",
            self.interesting_edge_area()
        );
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Vec2;

    use super::*;
    use crate::content::ContentPayload;

    fn small_config() -> MapConfig {
        MapConfig {
            min_cell_size: 0.25,
            initial_root_level: 3,
            max_root_level: 6,
            ..MapConfig::default()
        }
    }

    fn quad(x0: f64, y0: f64, x1: f64, y1: f64) -> MapShape {
        MapShape::Quad(Quad::from_rect(Rect::new(x0, y0, x1, y1)))
    }

    #[test]
    fn small_obstacle_marks_one_path() {
        // Root is 2 m; the obstacle covers one 0.25 m cell.
        let mut tree = QuadTree::new(small_config());
        let cube = NodeContent::new(ContentType::ObstacleCube);
        assert_eq!(tree.add_shape(&quad(0.0, 0.0, 0.25, 0.25), &cube), Ok(true));
        tree.validate();
        let cubes: Vec<_> = tree
            .leaves()
            .filter(|l| l.content_type == ContentType::ObstacleCube)
            .collect();
        assert_eq!(cubes.len(), 1);
        assert_eq!(cubes[0].level, 0);
        assert!(
            tree.leaves()
                .filter(|l| l.content_type != ContentType::ObstacleCube)
                .all(|l| l.content_type == ContentType::Unknown),
            "siblings along the path stay unknown"
        );
        // Root, then four children per level down to level 0.
        assert_eq!(tree.node_count(), 1 + 4 * 3);
        assert_eq!(tree.add_shape(&quad(0.0, 0.0, 0.25, 0.25), &cube), Ok(false));
        assert_eq!(tree.node_count(), 13, "idempotent write keeps structure");
    }

    #[test]
    fn root_grows_towards_far_shapes() {
        let mut tree = QuadTree::new(small_config());
        let clear = NodeContent::new(ContentType::ClearOfObstacle);
        assert_eq!(tree.add_shape(&quad(3.0, 3.0, 3.5, 3.5), &clear), Ok(true));
        assert!(tree.root_level() > 3, "root must have grown");
        assert!(tree.bounds().contains(Point::new(3.25, 3.25)));
        assert!(tree.bounds().contains(Point::new(-0.9, -0.9)), "old area kept");
        tree.validate();

        let err = tree.add_shape(&quad(500.0, 500.0, 501.0, 501.0), &clear);
        assert!(
            matches!(err, Err(MapError::ExpansionLimit { max_level: 6, .. })),
            "{err:?}"
        );
        tree.validate();
        assert_eq!(
            tree.add_shape(
                &MapShape::Point(Point::new(f64::NAN, 0.0)),
                &clear
            ),
            Err(MapError::NonFiniteShape)
        );
    }

    #[test]
    fn growth_budget_is_per_write() {
        let mut tree = QuadTree::new(MapConfig {
            max_growth_steps_per_write: 1,
            ..small_config()
        });
        let clear = NodeContent::new(ContentType::ClearOfObstacle);
        // One step grows the 2 m root to 4 m over [-1, 3], still short of 3.5.
        assert_eq!(
            tree.add_shape(&quad(3.0, 3.0, 3.5, 3.5), &clear),
            Err(MapError::InsufficientGrowth { attempts: 1 })
        );
        assert_eq!(tree.root_level(), 4, "growth taken is kept");
        assert_eq!(tree.explored_area(), 0.0, "nothing written");
        tree.validate();

        // The next write gets a fresh step and fits.
        assert_eq!(tree.add_shape(&quad(3.0, 3.0, 3.5, 3.5), &clear), Ok(true));
        assert_eq!(tree.root_level(), 5);
        assert!((tree.explored_area() - 0.25).abs() < 1e-9);
        tree.validate();
    }

    #[test]
    fn fill_border_turns_adjacent_edges_uninteresting() {
        let mut tree = QuadTree::new(small_config());
        let edge = NodeContent::new(ContentType::InterestingEdge);
        let clear = NodeContent::new(ContentType::ClearOfObstacle);
        tree.add_shape(&quad(-1.0, -1.0, 1.0, 1.0), &clear).unwrap();
        tree.add_shape(&quad(0.0, 0.0, 0.5, 0.25), &edge).unwrap();
        tree.validate();
        assert!(tree.has_borders(ContentType::InterestingEdge, ContentTypes::CLEAR_OF_OBSTACLE));

        let uninteresting = NodeContent::new(ContentType::NotInterestingEdge);
        assert!(tree.fill_border(
            ContentType::InterestingEdge,
            ContentTypes::CLEAR_OF_OBSTACLE,
            &uninteresting
        ));
        tree.validate();
        assert!(!tree.has_borders(ContentType::InterestingEdge, ContentTypes::CLEAR_OF_OBSTACLE));
        assert!(!tree.has_content_type(ContentType::InterestingEdge));
        assert!(tree.has_content_type(ContentType::NotInterestingEdge));
        assert_eq!(tree.interesting_edge_area(), 0.0);
    }

    #[test]
    fn replace_within_quad_only() {
        let mut tree = QuadTree::new(small_config());
        let cube = NodeContent::new(ContentType::ObstacleCube);
        tree.add_shape(&quad(-1.0, -1.0, -0.75, -0.75), &cube).unwrap();
        tree.add_shape(&quad(0.75, 0.75, 1.0, 1.0), &cube).unwrap();
        let removed = NodeContent::new(ContentType::ObstacleCubeRemoved);
        let area = Quad::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(tree.replace_content(ContentType::ObstacleCube, &removed, Some(&area)));
        tree.validate();
        assert_eq!(
            tree.content_at(Point::new(0.9, 0.9)).map(|c| c.content_type),
            Some(ContentType::ClearOfObstacle)
        );
        assert_eq!(
            tree.content_at(Point::new(-0.9, -0.9)).map(|c| c.content_type),
            Some(ContentType::ObstacleCube)
        );
        assert!(tree.replace_content(ContentType::ObstacleCube, &removed, None));
        assert!(!tree.has_content_type(ContentType::ObstacleCube));
        tree.validate();
    }

    #[test]
    fn non_cacheable_queries_scan_leaves() {
        let mut tree = QuadTree::new(small_config());
        let charger = NodeContent::new(ContentType::ObstacleCharger);
        assert!(!tree.has_content_type(ContentType::ObstacleCharger));
        tree.add_shape(&quad(0.0, 0.0, 0.25, 0.25), &charger).unwrap();
        assert!(tree.has_content_type(ContentType::ObstacleCharger));
        let clear = NodeContent::new(ContentType::ClearOfObstacle);
        assert!(tree.replace_content(ContentType::ObstacleCharger, &clear, None));
        assert!(!tree.has_content_type(ContentType::ObstacleCharger));
        tree.validate();
    }

    #[test]
    fn merge_under_rotation() {
        let mut a = QuadTree::new(small_config());
        let mut b = QuadTree::new(small_config());
        let charger = NodeContent::new(ContentType::ObstacleCharger);
        b.add_shape(&quad(0.5, 0.0, 0.75, 0.25), &charger).unwrap();

        let quarter_turn = Affine::rotate(core::f64::consts::FRAC_PI_2);
        assert!(a.merge(&b, quarter_turn), "first merge writes the charger");
        a.validate();
        // (0.625, 0.125) rotates to (-0.125, 0.625).
        assert_eq!(
            a.content_at(Point::new(-0.125, 0.625)).map(|c| c.content_type),
            Some(ContentType::ObstacleCharger)
        );
        assert_eq!(
            a.content_at(Point::new(0.625, 0.125)).map(|c| c.content_type),
            Some(ContentType::Unknown)
        );
        assert!(!a.merge(&b, quarter_turn), "second merge is a no-op");
    }

    #[test]
    fn merge_rotates_cliff_payload() {
        let mut a = QuadTree::new(small_config());
        let mut b = QuadTree::new(small_config());
        let cliff = NodeContent::with_payload(
            ContentType::Cliff,
            ContentPayload::Cliff {
                direction: Vec2::new(1.0, 0.0),
            },
        );
        b.add_shape(&quad(0.0, 0.0, 0.25, 0.25), &cliff).unwrap();
        assert!(a.merge(&b, Affine::rotate(core::f64::consts::PI)), "cliff copied");
        let got = a.content_at(Point::new(-0.125, -0.125)).cloned();
        assert_eq!(
            got,
            Some(NodeContent::with_payload(
                ContentType::Cliff,
                ContentPayload::Cliff {
                    direction: Vec2::new(-1.0, 0.0)
                }
            ))
        );
    }

    #[test]
    fn merge_keeps_explored_cells_under_unknown() {
        let mut a = QuadTree::new(small_config());
        let clear = NodeContent::new(ContentType::ClearOfObstacle);
        a.add_shape(&quad(-1.0, -1.0, 1.0, 1.0), &clear).unwrap();
        let explored = a.explored_area();
        assert!((explored - 4.0).abs() < 1e-9, "got {explored}");

        // One charger cell; every other leaf of `b` is unknown.
        let mut b = QuadTree::new(small_config());
        let charger = NodeContent::new(ContentType::ObstacleCharger);
        b.add_shape(&quad(0.0, 0.0, 0.25, 0.25), &charger).unwrap();
        let unknown = b
            .leaves()
            .filter(|l| l.content_type == ContentType::Unknown)
            .count();
        assert!(unknown > 1, "got {unknown}");

        assert!(a.merge(&b, Affine::IDENTITY));
        a.validate();
        assert_eq!(
            a.content_at(Point::new(-0.5, -0.5)).map(|c| c.content_type),
            Some(ContentType::ClearOfObstacle)
        );
        assert_eq!(
            a.content_at(Point::new(0.125, 0.125)).map(|c| c.content_type),
            Some(ContentType::ObstacleCharger)
        );
        assert!(
            (a.explored_area() - explored).abs() < 1e-9,
            "unknown leaves must not erase explored floor"
        );
    }

    #[test]
    fn collision_ray_respects_boundary() {
        let mut tree = QuadTree::new(small_config());
        let cube = NodeContent::new(ContentType::ObstacleCube);
        tree.add_shape(&quad(0.0, 0.0, 0.25, 0.25), &cube).unwrap();
        let mask = ContentTypes::OBSTACLES;
        assert!(tree.has_collision_ray_with_types(
            Point::new(0.25, -1.0),
            Point::new(0.25, 1.0),
            mask
        ));
        assert!(!tree.has_collision_ray_with_types(
            Point::new(0.3, -1.0),
            Point::new(0.3, 1.0),
            mask
        ));
    }
}
