// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Border tracing between cells of one content type and cells matching an outer mask.
//!
//! A border is found as a list of waypoints, one per (inner cell, outer neighbor) adjacency,
//! in walk order. The walk goes clockwise around each inner cell and hops into adjacent inner
//! cells, stepping back out through the edge it entered by once the inner cell is done, so
//! consecutive waypoints follow the boundary. Every (cell, side, neighbor index) triple changes
//! state at most twice, which bounds the walk by the number of cell sides.
//! Waypoints are then reduced to polylines with [`regions_from_waypoints`].

use std::collections::HashMap;

use kurbo::{Point, Vec2};

use crate::content::{ContentPayload, ContentType, ContentTypes};
use crate::node::NodeArena;
use crate::types::{Direction, NodeId, Rotation};

/// One straight piece of a border.
#[derive(Clone, Debug, PartialEq)]
pub struct BorderSegment {
    /// Start point.
    pub from: Point,
    /// End point.
    pub to: Point,
    /// Unit vector pointing from the inner side towards the outer side.
    pub normal: Vec2,
    /// Payload of the outer cells (or of the inner cells when the outer ones carry none).
    pub payload: Option<ContentPayload>,
}

/// A connected run of border segments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BorderRegion {
    /// Segments in walk order; each starts where the previous one ended.
    pub segments: Vec<BorderSegment>,
}

/// An adjacency between an inner cell and an outer neighbor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct BorderWaypoint {
    pub(crate) from: NodeId,
    pub(crate) to: NodeId,
    pub(crate) direction: Direction,
    /// Last waypoint of a walk.
    pub(crate) is_end: bool,
}

/// Walk state of one neighbor entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scan {
    Pending,
    /// Edge a walk hopped in through; it may be crossed back once.
    Entered,
    Done,
}

#[derive(Debug)]
struct SideScan {
    neighbors: Vec<NodeId>,
    state: Vec<Scan>,
}

/// State of one `find_borders` run.
#[derive(Debug)]
struct BorderWalk<'a> {
    nodes: &'a NodeArena,
    inner: ContentType,
    outer: ContentTypes,
    sides: HashMap<(NodeId, Direction), SideScan>,
    waypoints: Vec<BorderWaypoint>,
}

/// Trace every border between `inner_nodes` (all of type `inner`) and neighbors matching
/// `outer`.
pub(crate) fn find_borders(
    nodes: &NodeArena,
    inner_nodes: impl IntoIterator<Item = NodeId>,
    inner: ContentType,
    outer: ContentTypes,
) -> Vec<BorderWaypoint> {
    let mut walk = BorderWalk {
        nodes,
        inner,
        outer,
        sides: HashMap::new(),
        waypoints: Vec::new(),
    };
    for node in inner_nodes {
        debug_assert_eq!(
            nodes.content_type(node),
            inner,
            "indexed node has the wrong type"
        );
        for direction in Direction::CLOCKWISE {
            let len = walk.side(node, direction).neighbors.len();
            for idx in 0..len {
                let side = walk.side(node, direction);
                if side.state[idx] != Scan::Pending {
                    continue;
                }
                let neighbor = side.neighbors[idx];
                if nodes.content_type(neighbor).is_in(outer) {
                    walk.trace(node, direction, idx);
                }
            }
        }
    }
    walk.waypoints
}

/// Cheap existence check: does any of `inner_nodes` touch a cell matching `outer`?
pub(crate) fn has_any_border(
    nodes: &NodeArena,
    inner_nodes: impl IntoIterator<Item = NodeId>,
    outer: ContentTypes,
) -> bool {
    let mut neighbors = Vec::new();
    for node in inner_nodes {
        for direction in Direction::CLOCKWISE {
            neighbors.clear();
            nodes.add_smallest_neighbors(node, direction, Rotation::Clockwise, &mut neighbors);
            if neighbors
                .iter()
                .any(|&n| nodes.content_type(n).is_in(outer))
            {
                return true;
            }
        }
    }
    false
}

impl BorderWalk<'_> {
    fn side(&mut self, node: NodeId, direction: Direction) -> &mut SideScan {
        let nodes = self.nodes;
        self.sides.entry((node, direction)).or_insert_with(|| {
            let mut neighbors = Vec::new();
            nodes.add_smallest_neighbors(node, direction, Rotation::Clockwise, &mut neighbors);
            let state = vec![Scan::Pending; neighbors.len()];
            SideScan { neighbors, state }
        })
    }

    /// Follow the border starting at neighbor `idx` of `node`'s `direction` side.
    fn trace(&mut self, mut node: NodeId, mut direction: Direction, mut idx: usize) {
        let start = self.waypoints.len();
        let mut rotations = 0_u8;
        loop {
            let side = self.side(node, direction);
            if idx >= side.neighbors.len() {
                // Turn the corner, but never spin around a cell with nothing left to scan.
                if rotations >= 4 {
                    break;
                }
                direction = direction.rotated(Rotation::Clockwise);
                idx = 0;
                rotations += 1;
                continue;
            }
            let neighbor = side.neighbors[idx];
            match side.state[idx] {
                Scan::Done => break,
                Scan::Entered => {
                    // Back to the cell we came from, right after the edge we left it by.
                    side.state[idx] = Scan::Done;
                    let back = direction.opposite();
                    let back_side = self.side(neighbor, back);
                    let Some(back_idx) = back_side.neighbors.iter().position(|&n| n == node) else {
                        break;
                    };
                    node = neighbor;
                    direction = back;
                    idx = back_idx + 1;
                    rotations = 0;
                    continue;
                }
                Scan::Pending => side.state[idx] = Scan::Done,
            }
            let ty = self.nodes.content_type(neighbor);
            if ty.is_in(self.outer) {
                self.waypoints.push(BorderWaypoint {
                    from: node,
                    to: neighbor,
                    direction,
                    is_end: false,
                });
                idx += 1;
            } else if ty == self.inner {
                let back = direction.opposite();
                let back_side = self.side(neighbor, back);
                let Some(back_idx) = back_side.neighbors.iter().position(|&n| n == node) else {
                    break;
                };
                back_side.state[back_idx] = Scan::Entered;
                node = neighbor;
                direction = back;
                idx = back_idx + 1;
                rotations = 0;
            } else {
                break;
            }
        }
        if self.waypoints.len() > start
            && let Some(last) = self.waypoints.last_mut()
        {
            last.is_end = true;
        }
    }
}

/// Geometry and payload of one waypoint.
#[derive(Debug)]
struct Sample {
    point: Point,
    normal: Vec2,
    /// Half of the shared edge, along the border.
    half_edge: Vec2,
    payload: Option<ContentPayload>,
}

fn sample(nodes: &NodeArena, waypoint: &BorderWaypoint) -> Sample {
    let from = nodes.node(waypoint.from);
    let to = nodes.node(waypoint.to);
    let normal = waypoint.direction.unit();
    let (point, side) = if from.side <= to.side {
        (from.center + normal * (from.side * 0.5), from.side)
    } else {
        (to.center - normal * (to.side * 0.5), to.side)
    };
    let tangent = waypoint.direction.rotated(Rotation::Clockwise).unit();
    Sample {
        point,
        normal,
        half_edge: tangent * (side * 0.5),
        payload: to.content.payload.or(from.content.payload),
    }
}

#[derive(Debug)]
struct SegmentBuilder {
    from: Point,
    to: Point,
    normal_sum: Vec2,
    payload: Option<ContentPayload>,
    points: usize,
}

impl SegmentBuilder {
    fn start(sample: &Sample) -> Self {
        Self {
            from: sample.point,
            to: sample.point,
            normal_sum: sample.normal,
            payload: sample.payload,
            points: 1,
        }
    }

    fn finish(self, first: &Sample) -> BorderSegment {
        let normal = if self.normal_sum.hypot2() > 0.0 {
            self.normal_sum.normalize()
        } else {
            first.normal
        };
        let (from, to) = if self.points == 1 {
            (first.point - first.half_edge, first.point + first.half_edge)
        } else {
            (self.from, self.to)
        };
        BorderSegment {
            from,
            to,
            normal,
            payload: self.payload,
        }
    }
}

/// Reduce waypoints (in walk order, regions terminated by `is_end`) to polylines.
///
/// A point extends the current segment while it keeps within `angle_tolerance` radians of
/// the segment's direction and carries a compatible payload; otherwise a new segment starts
/// at the previous point.
pub(crate) fn regions_from_waypoints(
    nodes: &NodeArena,
    waypoints: &[BorderWaypoint],
    angle_tolerance: f64,
) -> Vec<BorderRegion> {
    let mut regions = Vec::new();
    let mut segments = Vec::new();
    let mut current: Option<(SegmentBuilder, Sample)> = None;

    for waypoint in waypoints {
        let s = sample(nodes, waypoint);
        current = Some(match current.take() {
            None => {
                let builder = SegmentBuilder::start(&s);
                (builder, s)
            }
            Some((mut builder, first)) => {
                let step = s.point - builder.to;
                let compatible = ContentPayload::is_border_compatible(
                    builder.payload.as_ref(),
                    s.payload.as_ref(),
                );
                let straight = builder.points == 1
                    || step.hypot2() == 0.0
                    || angle_between(builder.to - builder.from, step) <= angle_tolerance;
                if compatible && straight {
                    builder.to = s.point;
                    builder.normal_sum += s.normal;
                    builder.points += 1;
                    (builder, first)
                } else {
                    let prev = builder.to;
                    segments.push(builder.finish(&first));
                    let next = SegmentBuilder {
                        from: prev,
                        to: s.point,
                        normal_sum: s.normal,
                        payload: s.payload,
                        points: 2,
                    };
                    (next, s)
                }
            }
        });
        if waypoint.is_end {
            if let Some((builder, first)) = current.take() {
                segments.push(builder.finish(&first));
            }
            regions.push(BorderRegion {
                segments: core::mem::take(&mut segments),
            });
        }
    }
    if let Some((builder, first)) = current {
        segments.push(builder.finish(&first));
    }
    if !segments.is_empty() {
        regions.push(BorderRegion { segments });
    }
    regions
}

fn angle_between(a: Vec2, b: Vec2) -> f64 {
    a.cross(b).atan2(a.dot(b)).abs()
}
