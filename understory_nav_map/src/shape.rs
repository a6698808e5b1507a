// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observation shapes and their relation to axis-aligned cells.
//!
//! Boundary handling differs by kind:
//! - Points and lines are tested inclusively, so a segment that grazes a cell edge touches it.
//!   Collision rays go through the same test.
//! - Triangles and quads must overlap a cell with positive area, so a quad that exactly tiles a
//!   cell does not leak into its neighbors.

use kurbo::{Affine, Line, Point, Rect, Vec2};

/// Slack used for all geometric comparisons, in map units.
const EPSILON: f64 = 1e-9;

/// A convex quadrilateral given by its corners in perimeter order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quad {
    /// Corners in clockwise or counter-clockwise order.
    pub corners: [Point; 4],
}

impl Quad {
    /// Create a quad from four corners in perimeter order.
    pub const fn new(a: Point, b: Point, c: Point, d: Point) -> Self {
        Self {
            corners: [a, b, c, d],
        }
    }

    /// The quad covering an axis-aligned rectangle.
    pub const fn from_rect(rect: Rect) -> Self {
        Self::new(
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        )
    }

    /// Map every corner through `transform`.
    pub fn transformed(&self, transform: Affine) -> Self {
        Self {
            corners: self.corners.map(|p| transform * p),
        }
    }

    /// Axis-aligned bounds.
    pub fn bounding_box(&self) -> Rect {
        bbox(&self.corners)
    }

    /// Whether `point` lies inside or on the boundary.
    pub fn contains_point(&self, point: Point) -> bool {
        convex_contains(&self.corners, point)
    }
}

/// A triangle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle {
    /// Corners in either winding.
    pub corners: [Point; 3],
}

impl Triangle {
    /// Create a triangle from its corners.
    pub const fn new(a: Point, b: Point, c: Point) -> Self {
        Self { corners: [a, b, c] }
    }

    /// Map every corner through `transform`.
    pub fn transformed(&self, transform: Affine) -> Self {
        Self {
            corners: self.corners.map(|p| transform * p),
        }
    }

    /// Axis-aligned bounds.
    pub fn bounding_box(&self) -> Rect {
        bbox(&self.corners)
    }
}

/// Any shape an observation can be reported as.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum MapShape {
    /// A single location.
    Point(Point),
    /// A segment.
    Line(Line),
    /// A triangle.
    Triangle(Triangle),
    /// A convex quad.
    Quad(Quad),
}

impl MapShape {
    /// Axis-aligned bounds of the shape.
    pub(crate) fn bounding_box(&self) -> Rect {
        match self {
            Self::Point(p) => Rect::from_points(*p, *p),
            Self::Line(l) => Rect::from_points(l.p0, l.p1),
            Self::Triangle(t) => t.bounding_box(),
            Self::Quad(q) => q.bounding_box(),
        }
    }

    /// Whether every coordinate is finite.
    pub(crate) fn is_finite(&self) -> bool {
        self.points().iter().all(|p| p.is_finite())
    }

    /// Whether the shape touches `rect` (see the module docs for boundary rules).
    pub(crate) fn intersects_rect(&self, rect: Rect) -> bool {
        let cell = rect_corners(rect);
        match self {
            Self::Point(p) => rect_contains_point(rect, *p),
            Self::Line(l) => sat_overlap(&[l.p0, l.p1], &cell, Boundary::Inclusive),
            Self::Triangle(t) => sat_overlap(&t.corners, &cell, Boundary::Exclusive),
            Self::Quad(q) => sat_overlap(&q.corners, &cell, Boundary::Exclusive),
        }
    }

    /// Whether the shape covers all of `rect`. Points and lines never cover a cell.
    pub(crate) fn contains_rect(&self, rect: Rect) -> bool {
        let polygon: &[Point] = match self {
            Self::Point(_) | Self::Line(_) => return false,
            Self::Triangle(t) => &t.corners,
            Self::Quad(q) => &q.corners,
        };
        rect_corners(rect)
            .iter()
            .all(|&corner| convex_contains(polygon, corner))
    }

    fn points(&self) -> Vec<Point> {
        match self {
            Self::Point(p) => vec![*p],
            Self::Line(l) => vec![l.p0, l.p1],
            Self::Triangle(t) => t.corners.to_vec(),
            Self::Quad(q) => q.corners.to_vec(),
        }
    }
}

impl From<Line> for MapShape {
    fn from(l: Line) -> Self {
        Self::Line(l)
    }
}

impl From<Quad> for MapShape {
    fn from(q: Quad) -> Self {
        Self::Quad(q)
    }
}

/// Inclusive point-in-rect test (kurbo's `Rect::contains` excludes the far edges).
pub(crate) fn rect_contains_point(rect: Rect, p: Point) -> bool {
    p.x >= rect.x0 - EPSILON
        && p.x <= rect.x1 + EPSILON
        && p.y >= rect.y0 - EPSILON
        && p.y <= rect.y1 + EPSILON
}

/// Inclusive rect-in-rect test.
pub(crate) fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    rect_contains_point(outer, Point::new(inner.x0, inner.y0))
        && rect_contains_point(outer, Point::new(inner.x1, inner.y1))
}

fn rect_corners(rect: Rect) -> [Point; 4] {
    Quad::from_rect(rect).corners
}

fn bbox(points: &[Point]) -> Rect {
    let first = points[0];
    points[1..]
        .iter()
        .fold(Rect::from_points(first, first), |r, p| r.union_pt(*p))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Boundary {
    /// Touching counts as overlapping.
    Inclusive,
    /// Overlap needs positive extent on every axis.
    Exclusive,
}

/// Separating-axis test between two convex point sets (either may be degenerate).
fn sat_overlap(a: &[Point], b: &[Point], boundary: Boundary) -> bool {
    let axes = edge_normals(a).chain(edge_normals(b));
    for axis in axes {
        let (a_min, a_max) = project(a, axis);
        let (b_min, b_max) = project(b, axis);
        let separated = match boundary {
            Boundary::Inclusive => a_max < b_min - EPSILON || b_max < a_min - EPSILON,
            Boundary::Exclusive => a_max <= b_min + EPSILON || b_max <= a_min + EPSILON,
        };
        if separated {
            return false;
        }
    }
    true
}

fn edge_normals(points: &[Point]) -> impl Iterator<Item = Vec2> + '_ {
    let n = points.len();
    // A segment has one edge; closing it again would repeat the same axis.
    let edges = if n == 2 { 1 } else { n };
    (0..edges).filter_map(move |i| {
        let d = points[(i + 1) % n] - points[i];
        let normal = Vec2::new(-d.y, d.x);
        (normal.length() > EPSILON).then_some(normal)
    })
}

fn project(points: &[Point], axis: Vec2) -> (f64, f64) {
    points
        .iter()
        .map(|p| p.to_vec2().dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// Boundary-inclusive containment for a convex polygon of either winding.
fn convex_contains(polygon: &[Point], p: Point) -> bool {
    let n = polygon.len();
    let mut sign = 0.0_f64;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let edge = b - a;
        let len = edge.length();
        if len <= EPSILON {
            continue;
        }
        // Signed distance of `p` from the edge line.
        let dist = edge.cross(p - a) / len;
        if dist.abs() <= EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = dist.signum();
        } else if dist.signum() != sign {
            return false;
        }
    }
    polygon_area(polygon) > EPSILON
}

fn polygon_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    let twice: f64 = (0..n)
        .map(|i| polygon[i].to_vec2().cross(polygon[(i + 1) % n].to_vec2()))
        .sum();
    twice.abs() * 0.5
}
