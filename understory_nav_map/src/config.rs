// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Map construction parameters.

use kurbo::Point;

use crate::content::ContentTypes;

/// Construction parameters for a [`NavMemoryMap`](crate::NavMemoryMap).
///
/// The root starts at `initial_root_level`, so its side length is
/// `min_cell_size * 2^initial_root_level`. With the defaults that is 2.56 m of 2 cm cells.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct MapConfig {
    /// Center of the initial root.
    pub origin: Point,
    /// Side length of a level-0 cell, in meters.
    pub min_cell_size: f64,
    /// Level of the root at construction.
    pub initial_root_level: u8,
    /// The root never grows beyond this level; writes that would need it are dropped.
    pub max_root_level: u8,
    /// Root growth steps a single write may take before it is dropped.
    pub max_growth_steps_per_write: u8,
    /// Maximum turn, in radians, between consecutive border points merged into one segment.
    pub border_merge_angle_tolerance: f64,
    /// Content types whose nodes are indexed for fast lookup and border queries.
    pub cacheable_types: ContentTypes,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            origin: Point::ORIGIN,
            min_cell_size: 0.02,
            initial_root_level: 7,
            max_root_level: 16,
            max_growth_steps_per_write: 8,
            border_merge_angle_tolerance: 10.0_f64.to_radians(),
            cacheable_types: ContentTypes::default(),
        }
    }
}

impl MapConfig {
    /// Side length of a cell at `level`.
    pub fn side_length_at(&self, level: u8) -> f64 {
        self.min_cell_size * 2.0_f64.powi(i32::from(level))
    }
}
