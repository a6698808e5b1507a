// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nav map basics.
//!
//! Sweep some clear floor, drop an obstacle and a cliff into it, then ask for frontiers,
//! a collision ray, and area statistics.
//!
//! Run:
//! - `cargo run -p understory_nav_map_demos --example nav_map_basics`

use kurbo::{Line, Point, Rect, Vec2};
use understory_nav_map::{ContentPayload, ContentType, ContentTypes, MapConfig, NavMemoryMap, Quad};

fn main() {
    tracing_subscriber::fmt::init();

    let mut map = NavMemoryMap::new(MapConfig {
        min_cell_size: 0.05,
        initial_root_level: 5,
        ..MapConfig::default()
    });
    println!("root: level {} covering {:?}", map.root_level(), map.bounds());

    // What the camera saw ahead of the robot.
    map.add_quad(
        &Quad::from_rect(Rect::new(-0.4, -0.4, 0.8, 0.4)),
        ContentType::ClearOfObstacle,
    );
    map.add_quad(
        &Quad::from_rect(Rect::new(0.3, -0.1, 0.4, 0.1)),
        ContentType::ObstacleCube,
    );
    map.add_line_with_payload(
        Line::new((0.8, -0.4), (0.8, 0.4)),
        ContentType::Cliff,
        ContentPayload::Cliff {
            direction: Vec2::new(1.0, 0.0),
        },
    );
    map.add_line(Line::new((-0.4, 0.4), (0.8, 0.4)), ContentType::InterestingEdge);

    // Something far away forces the root to grow.
    map.add_point(Point::new(3.0, 0.0), ContentType::ObstacleUnrecognized);
    println!(
        "after growth: level {} covering {:?}, {} nodes",
        map.root_level(),
        map.bounds(),
        map.node_count()
    );

    println!("explored: {:.3} m^2", map.explored_region_area_m2());
    println!("interesting edges: {:.3} m^2", map.interesting_edge_area_m2());

    let blocked = map.has_collision_ray_with_types(
        Point::new(0.0, 0.0),
        Point::new(0.7, 0.0),
        ContentTypes::OBSTACLES | ContentTypes::CLIFF,
    );
    println!("path to (0.7, 0) blocked: {blocked}");
    assert!(blocked, "the cube sits on the path");

    for (i, region) in map
        .get_borders(ContentType::InterestingEdge, ContentTypes::UNKNOWN)
        .iter()
        .enumerate()
    {
        println!("frontier {i}:");
        for s in &region.segments {
            println!("  {:?} -> {:?} facing {:?}", s.from, s.to, s.normal);
        }
    }

    for region in map.get_borders(ContentType::Cliff, ContentTypes::CLEAR) {
        for s in &region.segments {
            println!("cliff edge {:?} -> {:?}, payload {:?}", s.from, s.to, s.payload);
        }
    }

    // The robot looked closer: the edges next to clear floor were nothing.
    map.fill_border(
        ContentType::InterestingEdge,
        ContentTypes::CLEAR_OF_OBSTACLE,
        ContentType::NotInterestingEdge,
    );
    println!(
        "interesting edges after cleanup: {:.3} m^2",
        map.interesting_edge_area_m2()
    );
}
