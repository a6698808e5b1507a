// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query accelerator attached to one tree.
//!
//! The processor keeps a set of live nodes per cacheable content type, running area totals,
//! and a memo of border results keyed by `(inner type, outer mask)`. It learns about every
//! content change and node destruction from the [`NodeEditor`](crate::edit::NodeEditor);
//! any notification marks every memoized border dirty.

use std::collections::{BTreeSet, HashMap};

use kurbo::{Line, Point};
use tracing::{trace, warn};

use crate::border::{
    BorderRegion, BorderWaypoint, find_borders, has_any_border, regions_from_waypoints,
};
use crate::config::MapConfig;
use crate::content::{ContentType, ContentTypes};
use crate::node::NodeArena;
use crate::shape::{MapShape, Quad};
use crate::types::{Direction, NodeId, Rotation};

#[derive(Debug)]
struct BorderCacheEntry {
    waypoints: Vec<BorderWaypoint>,
    dirty: bool,
}

/// Per-tree indices, statistics and border memo.
#[derive(Debug)]
pub(crate) struct Processor {
    cacheable: ContentTypes,
    angle_tolerance: f64,
    nodes_by_type: HashMap<ContentType, BTreeSet<NodeId>>,
    border_cache: HashMap<(ContentType, ContentTypes), BorderCacheEntry>,
    explored_area: f64,
    interesting_edge_area: f64,
}

impl Processor {
    pub(crate) fn new(config: &MapConfig) -> Self {
        Self {
            cacheable: config.cacheable_types,
            angle_tolerance: config.border_merge_angle_tolerance,
            nodes_by_type: HashMap::new(),
            border_cache: HashMap::new(),
            explored_area: 0.0,
            interesting_edge_area: 0.0,
        }
    }

    pub(crate) fn is_cacheable(&self, ty: ContentType) -> bool {
        ty.is_in(self.cacheable)
    }

    /// A node's content type changed from `old` to `new`.
    pub(crate) fn on_content_type_changed(
        &mut self,
        id: NodeId,
        area: f64,
        old: ContentType,
        new: ContentType,
    ) {
        if old == new {
            return;
        }
        self.remove_indexed(id, old);
        if self.is_cacheable(new) {
            self.nodes_by_type.entry(new).or_default().insert(id);
        }
        if old.is_explored() != new.is_explored() {
            self.explored_area += if new.is_explored() { area } else { -area };
        }
        let (was_edge, is_edge) = (
            old == ContentType::InterestingEdge,
            new == ContentType::InterestingEdge,
        );
        if was_edge != is_edge {
            self.interesting_edge_area += if is_edge { area } else { -area };
        }
        self.invalidate_borders();
    }

    /// A node holding `ty` is about to be freed.
    pub(crate) fn on_node_destroyed(&mut self, id: NodeId, area: f64, ty: ContentType) {
        self.remove_indexed(id, ty);
        if ty.is_explored() {
            self.explored_area -= area;
        }
        if ty == ContentType::InterestingEdge {
            self.interesting_edge_area -= area;
        }
        self.invalidate_borders();
    }

    fn remove_indexed(&mut self, id: NodeId, ty: ContentType) {
        if let Some(set) = self.nodes_by_type.get_mut(&ty) {
            set.remove(&id);
        }
    }

    fn invalidate_borders(&mut self) {
        for entry in self.border_cache.values_mut() {
            entry.dirty = true;
        }
    }

    /// Whether any index still holds `id`.
    pub(crate) fn references(&self, id: NodeId) -> bool {
        self.nodes_by_type.values().any(|set| set.contains(&id))
    }

    /// Indexed nodes of `ty`, in id order. Empty for non-cacheable types.
    pub(crate) fn nodes_of_type(&self, ty: ContentType) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_by_type.get(&ty).into_iter().flatten().copied()
    }

    /// Whether an indexed node of `ty` exists.
    pub(crate) fn has_content_type(&self, ty: ContentType) -> bool {
        self.nodes_by_type.get(&ty).is_some_and(|set| !set.is_empty())
    }

    pub(crate) fn explored_area(&self) -> f64 {
        self.explored_area.max(0.0)
    }

    pub(crate) fn interesting_edge_area(&self) -> f64 {
        self.interesting_edge_area.max(0.0)
    }

    pub(crate) fn has_borders(
        &self,
        nodes: &NodeArena,
        inner: ContentType,
        outer: ContentTypes,
    ) -> bool {
        if !self.is_cacheable(inner) {
            warn!(?inner, "border query on a non-indexed content type");
            return false;
        }
        if let Some(entry) = self.border_cache.get(&(inner, outer))
            && !entry.dirty
        {
            return !entry.waypoints.is_empty();
        }
        has_any_border(nodes, self.nodes_of_type(inner), outer)
    }

    pub(crate) fn get_borders(
        &mut self,
        nodes: &NodeArena,
        inner: ContentType,
        outer: ContentTypes,
    ) -> Vec<BorderRegion> {
        if !self.is_cacheable(inner) {
            warn!(?inner, "border query on a non-indexed content type");
            return Vec::new();
        }
        let fresh = self
            .border_cache
            .get(&(inner, outer))
            .is_some_and(|entry| !entry.dirty);
        if !fresh {
            let waypoints = find_borders(nodes, self.nodes_of_type(inner), inner, outer);
            trace!(
                ?inner,
                ?outer,
                waypoints = waypoints.len(),
                "recomputed borders"
            );
            self.border_cache.insert(
                (inner, outer),
                BorderCacheEntry {
                    waypoints,
                    dirty: false,
                },
            );
        }
        match self.border_cache.get(&(inner, outer)) {
            Some(entry) => regions_from_waypoints(nodes, &entry.waypoints, self.angle_tolerance),
            None => Vec::new(),
        }
    }

    /// Whether the segment `line` touches a leaf whose type is in `types`.
    ///
    /// A cell is entered when the segment intersects it with its boundary included, so a
    /// segment running exactly along a shared edge reports both cells.
    pub(crate) fn has_collision_ray_with_types(
        &self,
        nodes: &NodeArena,
        root: NodeId,
        line: Line,
        types: ContentTypes,
    ) -> bool {
        let shape = MapShape::Line(line);
        collides(nodes, root, &shape, types)
    }

    /// Centers of indexed `filled` nodes that touch a neighbor matching `filling`.
    pub(crate) fn border_fill_points(
        &self,
        nodes: &NodeArena,
        filled: ContentType,
        filling: ContentTypes,
    ) -> Vec<Point> {
        let mut neighbors = Vec::new();
        self.nodes_of_type(filled)
            .filter(|&id| {
                Direction::CLOCKWISE.iter().any(|&d| {
                    neighbors.clear();
                    nodes.add_smallest_neighbors(id, d, Rotation::Clockwise, &mut neighbors);
                    neighbors
                        .iter()
                        .any(|&n| nodes.content_type(n).is_in(filling))
                })
            })
            .map(|id| nodes.node(id).center)
            .collect()
    }

    /// Centers of nodes holding `ty`, optionally restricted to centers inside `within`.
    ///
    /// Uses the index when `ty` is cacheable and falls back to scanning leaves otherwise.
    pub(crate) fn content_points(
        &self,
        nodes: &NodeArena,
        root: NodeId,
        ty: ContentType,
        within: Option<&Quad>,
    ) -> Vec<Point> {
        let keep = |p: &Point| within.is_none_or(|q| q.contains_point(*p));
        if self.is_cacheable(ty) {
            self.nodes_of_type(ty)
                .map(|id| nodes.node(id).center)
                .filter(keep)
                .collect()
        } else {
            nodes
                .leaves(root)
                .filter(|&id| nodes.content_type(id) == ty)
                .map(|id| nodes.node(id).center)
                .filter(keep)
                .collect()
        }
    }
}

fn collides(nodes: &NodeArena, id: NodeId, shape: &MapShape, types: ContentTypes) -> bool {
    let node = nodes.node(id);
    if !shape.intersects_rect(node.rect()) {
        return false;
    }
    match node.children {
        None => node.content.content_type.is_in(types),
        Some(children) => children.iter().any(|&c| collides(nodes, c, shape, types)),
    }
}
