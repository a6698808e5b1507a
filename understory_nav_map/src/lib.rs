// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Nav Map: a Kurbo-native adaptive quadtree for robot navigation memory.
//!
//! The map remembers what a mobile robot has seen around it: explored floor, obstacles by kind,
//! cliffs, and vision edges. Observations arrive as quads, lines, triangles and points tagged
//! with a [`ContentType`]; the map stores them in square cells that split where detail is
//! needed and merge back when four siblings agree.
//!
//! - Writes follow a fixed precedence ([`can_override`]): cliffs are sticky, recognized
//!   obstacles are not erased by vision edges, and "removed" observations only clear the
//!   obstacle kind they name.
//! - The root grows on demand towards shapes written outside it, up to
//!   [`MapConfig::max_root_level`].
//! - Border queries trace the boundary between one content type and a [`ContentTypes`] mask
//!   into polylines with outward normals, used to pick exploration frontiers.
//! - Ray queries answer whether a segment touches any cell of a set of types.
//!
//! ## Frame and units
//!
//! Coordinates are meters in a y-up frame: [`Direction::North`] is `+y`, [`Direction::East`]
//! is `+x`. A level-0 cell has side [`MapConfig::min_cell_size`] and every level doubles it.
//! Cell boundaries count as inside for point, line and ray tests; two polygons only touch
//! a cell when they overlap it with positive area.
//!
//! ## API overview
//!
//! - [`NavMemoryMap`]: the map; all writes and queries go through it.
//! - [`MapConfig`]: construction parameters.
//! - [`ContentType`], [`ContentTypes`], [`ContentPayload`], [`NodeContent`]: what a cell holds.
//! - [`Quad`], [`Triangle`]: write shapes (plus [`kurbo::Line`] and [`kurbo::Point`]).
//! - [`BorderRegion`], [`BorderSegment`]: border query results.
//! - [`LeafInfo`]: read-only leaf enumeration for rendering or snapshots.
//!
//! ## Minimal usage
//!
//! ```
//! use kurbo::{Point, Rect};
//! use understory_nav_map::{ContentType, ContentTypes, MapConfig, NavMemoryMap, Quad};
//!
//! let mut map = NavMemoryMap::new(MapConfig {
//!     min_cell_size: 0.1,
//!     initial_root_level: 4,
//!     ..MapConfig::default()
//! });
//!
//! // The robot sees a patch of free floor with an unexplained obstacle at its edge.
//! map.add_quad(&Quad::from_rect(Rect::new(-0.4, -0.4, 0.4, 0.4)), ContentType::ClearOfObstacle);
//! let obstacle = Quad::from_rect(Rect::new(0.4, 0.0, 0.5, 0.1));
//! map.add_quad(&obstacle, ContentType::ObstacleUnrecognized);
//!
//! assert!(map.explored_region_area_m2() > 0.6);
//! assert!(map.has_collision_ray_with_types(
//!     Point::new(0.0, 0.05),
//!     Point::new(0.6, 0.05),
//!     ContentTypes::OBSTACLES,
//! ));
//!
//! // The obstacle has clear floor on one side and unknown space elsewhere.
//! let borders = map.get_borders(ContentType::ObstacleUnrecognized, ContentTypes::CLEAR);
//! assert_eq!(borders.len(), 1);
//! assert_eq!(borders[0].segments[0].normal.x, -1.0);
//! ```
//!
//! ### Growing and merging
//!
//! ```
//! use kurbo::{Affine, Point, Rect};
//! use understory_nav_map::{ContentType, NavMemoryMap, Quad};
//!
//! let mut here = NavMemoryMap::default();
//! let mut there = NavMemoryMap::default();
//! there.add_quad(&Quad::from_rect(Rect::new(2.0, 2.0, 2.2, 2.2)), ContentType::ObstacleCharger);
//! assert!(there.root_level() > here.root_level());
//!
//! // `there` was recorded with its origin one meter east of ours.
//! here.merge(&there, Affine::translate((1.0, 0.0)));
//! assert_eq!(
//!     here.content_at(Point::new(3.1, 2.1)).map(|c| c.content_type),
//!     Some(ContentType::ObstacleCharger)
//! );
//! ```
//!
//! With the `serde` feature, [`MapConfig`], [`LeafInfo`] and the content types implement
//! `Serialize` and `Deserialize`.

mod border;
mod config;
mod content;
mod edit;
mod error;
mod map;
mod node;
mod processor;
mod shape;
mod tree;
mod types;

pub use border::{BorderRegion, BorderSegment};
pub use config::MapConfig;
pub use content::{ContentPayload, ContentType, ContentTypes, NodeContent, Overlap, can_override};
pub use error::MapError;
pub use map::NavMemoryMap;
pub use shape::{Quad, Triangle};
pub use tree::LeafInfo;
pub use types::Direction;
