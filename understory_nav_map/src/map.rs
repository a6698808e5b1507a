// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public map type.

use kurbo::{Affine, Line, Point, Rect};
use tracing::error;

use crate::border::BorderRegion;
use crate::config::MapConfig;
use crate::content::{ContentPayload, ContentType, ContentTypes, NodeContent};
use crate::shape::{MapShape, Quad, Triangle};
use crate::tree::{LeafInfo, QuadTree};

/// Decaying memory of the robot's surroundings, as an adaptive quadtree of content cells.
///
/// Writes never fail loudly: a write the map cannot hold (one that would need the root to grow
/// past [`MapConfig::max_root_level`], or more than [`MapConfig::max_growth_steps_per_write`]
/// times) is logged and reported as unchanged.
///
/// Passing a payload to a type that does not take one, leaving it off a type that requires
/// one (see [`ContentType::requires_payload`]), or writing a control tag is a caller bug and
/// trips a debug assertion.
///
/// ```
/// use kurbo::{Point, Rect};
/// use understory_nav_map::{ContentType, ContentTypes, NavMemoryMap, Quad};
///
/// let mut map = NavMemoryMap::default();
/// let floor = Quad::from_rect(Rect::new(-0.5, -0.5, 0.5, 0.5));
/// assert!(map.add_quad(&floor, ContentType::ClearOfObstacle));
/// assert!(map.add_point(Point::new(0.11, 0.11), ContentType::ObstacleCube));
///
/// assert!(map.has_content_type(ContentType::ObstacleCube));
/// assert!(map.has_borders(ContentType::ObstacleCube, ContentTypes::CLEAR));
/// assert!(map.has_collision_ray_with_types(
///     Point::new(0.0, 0.11),
///     Point::new(0.3, 0.11),
///     ContentTypes::OBSTACLES,
/// ));
/// ```
#[derive(Debug)]
pub struct NavMemoryMap {
    tree: QuadTree,
}

impl Default for NavMemoryMap {
    fn default() -> Self {
        Self::new(MapConfig::default())
    }
}

impl NavMemoryMap {
    /// Create an all-unknown map.
    pub fn new(config: MapConfig) -> Self {
        debug_assert!(
            config.min_cell_size > 0.0 && config.min_cell_size.is_finite(),
            "min_cell_size must be positive"
        );
        debug_assert!(
            config.initial_root_level <= config.max_root_level,
            "initial root level above the maximum"
        );
        Self {
            tree: QuadTree::new(config),
        }
    }

    /// The configuration this map was built with.
    pub fn config(&self) -> &MapConfig {
        self.tree.config()
    }

    fn insert(&mut self, shape: MapShape, content: NodeContent) -> bool {
        let ty = content.content_type;
        debug_assert!(ty.is_insertable(), "{ty:?} is not an insertable content type");
        debug_assert_eq!(
            ty.requires_payload(),
            content.payload.is_some(),
            "payload contract violated for {ty:?}"
        );
        match self.tree.add_shape(&shape, &content) {
            Ok(changed) => changed,
            Err(err) => {
                error!(%err, content_type = ?ty, "nav map write dropped");
                false
            }
        }
    }

    /// Write `content_type` into every cell the quad touches. Returns whether anything changed.
    pub fn add_quad(&mut self, quad: &Quad, content_type: ContentType) -> bool {
        self.insert(MapShape::Quad(*quad), NodeContent::new(content_type))
    }

    /// [`add_quad`](Self::add_quad) for types that carry a payload.
    pub fn add_quad_with_payload(
        &mut self,
        quad: &Quad,
        content_type: ContentType,
        payload: ContentPayload,
    ) -> bool {
        self.insert(
            MapShape::Quad(*quad),
            NodeContent::with_payload(content_type, payload),
        )
    }

    /// Write `content_type` into every finest cell the segment touches.
    pub fn add_line(&mut self, line: Line, content_type: ContentType) -> bool {
        self.insert(MapShape::Line(line), NodeContent::new(content_type))
    }

    /// [`add_line`](Self::add_line) for types that carry a payload.
    pub fn add_line_with_payload(
        &mut self,
        line: Line,
        content_type: ContentType,
        payload: ContentPayload,
    ) -> bool {
        self.insert(
            MapShape::Line(line),
            NodeContent::with_payload(content_type, payload),
        )
    }

    /// Write `content_type` into every cell the triangle touches.
    pub fn add_triangle(&mut self, triangle: &Triangle, content_type: ContentType) -> bool {
        self.insert(MapShape::Triangle(*triangle), NodeContent::new(content_type))
    }

    /// [`add_triangle`](Self::add_triangle) for types that carry a payload.
    pub fn add_triangle_with_payload(
        &mut self,
        triangle: &Triangle,
        content_type: ContentType,
        payload: ContentPayload,
    ) -> bool {
        self.insert(
            MapShape::Triangle(*triangle),
            NodeContent::with_payload(content_type, payload),
        )
    }

    /// Write `content_type` into the finest cell(s) containing `point`.
    pub fn add_point(&mut self, point: Point, content_type: ContentType) -> bool {
        self.insert(MapShape::Point(point), NodeContent::new(content_type))
    }

    /// [`add_point`](Self::add_point) for types that carry a payload.
    pub fn add_point_with_payload(
        &mut self,
        point: Point,
        content_type: ContentType,
        payload: ContentPayload,
    ) -> bool {
        self.insert(
            MapShape::Point(point),
            NodeContent::with_payload(content_type, payload),
        )
    }

    /// Copy what `other` has seen into this map, with `transform` taking `other`'s frame to ours.
    ///
    /// Each explored leaf of `other` is re-inserted as a transformed quad, so under rotation
    /// the copied area snaps to this map's cells.
    pub fn merge(&mut self, other: &Self, transform: Affine) -> bool {
        debug_assert!(
            (self.config().min_cell_size - other.config().min_cell_size).abs() <= f64::EPSILON,
            "maps with different cell sizes cannot be merged"
        );
        self.tree.merge(&other.tree, transform)
    }

    /// Whether some `inner` cell touches a cell in `outer`.
    pub fn has_borders(&self, inner: ContentType, outer: ContentTypes) -> bool {
        self.tree.has_borders(inner, outer)
    }

    /// The borders between `inner` cells and `outer` cells, as polylines.
    ///
    /// Results are memoized until the next change to the map.
    pub fn get_borders(&mut self, inner: ContentType, outer: ContentTypes) -> Vec<BorderRegion> {
        self.tree.get_borders(inner, outer)
    }

    /// Whether the segment from `from` to `to` touches a cell whose type is in `types`.
    ///
    /// Cell boundaries count as inside.
    pub fn has_collision_ray_with_types(
        &self,
        from: Point,
        to: Point,
        types: ContentTypes,
    ) -> bool {
        self.tree.has_collision_ray_with_types(from, to, types)
    }

    /// Whether any cell holds `content_type`.
    pub fn has_content_type(&self, content_type: ContentType) -> bool {
        self.tree.has_content_type(content_type)
    }

    /// Total area of explored cells, in square meters.
    pub fn explored_region_area_m2(&self) -> f64 {
        self.tree.explored_area()
    }

    /// Total area of interesting-edge cells, in square meters.
    pub fn interesting_edge_area_m2(&self) -> f64 {
        self.tree.interesting_edge_area()
    }

    /// Turn every `filled` cell that touches a `filling` cell into `new_type`.
    pub fn fill_border(
        &mut self,
        filled: ContentType,
        filling: ContentTypes,
        new_type: ContentType,
    ) -> bool {
        debug_assert!(
            new_type.is_insertable() && !new_type.requires_payload(),
            "{new_type:?} cannot be used to fill a border"
        );
        self.tree
            .fill_border(filled, filling, &NodeContent::new(new_type))
    }

    /// Turn every `content_type` cell into `new_type`.
    pub fn replace_content(&mut self, content_type: ContentType, new_type: ContentType) -> bool {
        debug_assert!(
            new_type.is_insertable() && !new_type.requires_payload(),
            "{new_type:?} cannot be used as a replacement"
        );
        self.tree
            .replace_content(content_type, &NodeContent::new(new_type), None)
    }

    /// Turn every `content_type` cell whose center lies in `within` into `new_type`.
    pub fn replace_content_within(
        &mut self,
        within: &Quad,
        content_type: ContentType,
        new_type: ContentType,
    ) -> bool {
        debug_assert!(
            new_type.is_insertable() && !new_type.requires_payload(),
            "{new_type:?} cannot be used as a replacement"
        );
        self.tree
            .replace_content(content_type, &NodeContent::new(new_type), Some(within))
    }

    /// Content of the smallest cell containing `point`, or `None` outside the map.
    pub fn content_at(&self, point: Point) -> Option<&NodeContent> {
        self.tree.content_at(point)
    }

    /// Every leaf cell, depth first.
    pub fn leaves(&self) -> impl Iterator<Item = LeafInfo> + '_ {
        self.tree.leaves()
    }

    /// Area currently covered by the map.
    pub fn bounds(&self) -> Rect {
        self.tree.bounds()
    }

    /// Level of the root cell.
    pub fn root_level(&self) -> u8 {
        self.tree.root_level()
    }

    /// Number of live cells, including subdivided ones.
    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }
}
