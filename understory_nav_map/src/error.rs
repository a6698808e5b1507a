// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Write errors.

use thiserror::Error;

/// Reasons a write can be rejected before it touches any cell.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MapError {
    /// The root would have to grow past the configured maximum level.
    #[error("map root cannot grow past level {max_level} (currently level {level})")]
    ExpansionLimit {
        /// Level of the root when growth was refused.
        level: u8,
        /// Configured maximum root level.
        max_level: u8,
    },
    /// The root used its per-write growth budget and still does not cover the shape.
    ///
    /// The growth already taken is kept.
    #[error("shape still outside the map after {attempts} growth steps")]
    InsufficientGrowth {
        /// Number of growth steps taken.
        attempts: usize,
    },
    /// The shape has NaN or infinite coordinates.
    #[error("shape has non-finite coordinates")]
    NonFiniteShape,
}
