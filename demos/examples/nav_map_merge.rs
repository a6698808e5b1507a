// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Merge a map recorded in another frame.
//!
//! Run:
//! - `cargo run -p understory_nav_map_demos --example nav_map_merge`

use core::f64::consts::FRAC_PI_2;

use kurbo::{Affine, Point, Rect};
use understory_nav_map::{ContentType, MapConfig, NavMemoryMap, Quad};

fn main() {
    tracing_subscriber::fmt::init();

    let config = MapConfig {
        min_cell_size: 0.05,
        initial_root_level: 5,
        ..MapConfig::default()
    };
    let mut current = NavMemoryMap::new(config.clone());
    let mut previous = NavMemoryMap::new(config);

    previous.add_quad(
        &Quad::from_rect(Rect::new(0.0, -0.3, 0.6, 0.3)),
        ContentType::ClearOfObstacle,
    );
    previous.add_quad(
        &Quad::from_rect(Rect::new(0.5, 0.0, 0.6, 0.1)),
        ContentType::ObstacleCharger,
    );

    // The previous session's frame is rotated a quarter turn and shifted.
    let to_current = Affine::translate((0.2, 0.0)) * Affine::rotate(FRAC_PI_2);
    let changed = current.merge(&previous, to_current);
    println!("merge changed the map: {changed}");

    let charger_was = Point::new(0.55, 0.05);
    let charger_is = to_current * charger_was;
    let found = current.content_at(charger_is).map(|c| c.content_type);
    println!("charger at {charger_is:?}: {found:?}");
    assert_eq!(found, Some(ContentType::ObstacleCharger));

    let counts = current.leaves().fold([0_usize; 2], |mut acc, leaf| {
        match leaf.content_type {
            ContentType::Unknown => acc[0] += 1,
            _ => acc[1] += 1,
        }
        acc
    });
    println!("{} unknown leaves, {} known leaves", counts[0], counts[1]);
}
