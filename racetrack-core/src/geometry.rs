//! Lattice geometry for the racetrack: points, velocities, segments, and the
//! exact segment-intersection test every crash decision depends on.
//!
//! Coordinates are small integers, so collinearity and parallelism are decided
//! with `i64` cross products. Floating point only appears once an intersection
//! point has to be located, and integral intersection points come out exact.

use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn step(self, velocity: Velocity) -> Self {
        self.offset(velocity.u, velocity.v)
    }

    /// The 3x3 block centred on this point, x-offset outer, y-offset inner.
    pub fn neighborhood(self) -> impl Iterator<Item = Point> {
        (-1..=1).flat_map(move |dx| (-1..=1).map(move |dy| self.offset(dx, dy)))
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        dx.hypot(dy)
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for [i32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Velocity {
    pub u: i32,
    pub v: i32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity::new(0, 0);

    pub const fn new(u: i32, v: i32) -> Self {
        Self { u, v }
    }

    pub fn is_zero(self) -> bool {
        self.u == 0 && self.v == 0
    }

    pub fn accelerate(self, accel: Velocity) -> Self {
        Self::new(self.u + accel.u, self.v + accel.v)
    }

    pub fn delta_from(self, previous: Velocity) -> Self {
        Self::new(self.u - previous.u, self.v - previous.v)
    }

    /// Every velocity reachable with one acceleration in `[-2, 2]` per axis,
    /// u-component outer, v-component inner.
    pub fn successors(self) -> impl Iterator<Item = Velocity> {
        (-2..=2).flat_map(move |du| (-2..=2).map(move |dv| self.accelerate(Velocity::new(du, dv))))
    }

    pub fn is_legal_successor_of(self, previous: Velocity) -> bool {
        let accel = self.delta_from(previous);
        accel.u.abs() <= 2 && accel.v.abs() <= 2
    }
}

impl From<[i32; 2]> for Velocity {
    fn from([u, v]: [i32; 2]) -> Self {
        Self::new(u, v)
    }
}

impl From<Velocity> for [i32; 2] {
    fn from(velocity: Velocity) -> Self {
        [velocity.u, velocity.v]
    }
}

impl fmt::Display for Velocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.u, self.v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(Point, Velocity)", into = "(Point, Velocity)")]
pub struct State {
    pub position: Point,
    pub velocity: Velocity,
}

impl State {
    pub const fn new(position: Point, velocity: Velocity) -> Self {
        Self { position, velocity }
    }

    /// Position and velocity after committing to `velocity` this turn.
    pub fn advance(self, velocity: Velocity) -> Self {
        Self::new(self.position.step(velocity), velocity)
    }
}

impl From<(Point, Velocity)> for State {
    fn from((position, velocity): (Point, Velocity)) -> Self {
        Self::new(position, velocity)
    }
}

impl From<State> for (Point, Velocity) {
    fn from(state: State) -> Self {
        (state.position, state.velocity)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.position, self.velocity)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[Point; 2]", into = "[Point; 2]")]
pub struct Edge {
    pub a: Point,
    pub b: Point,
}

impl Edge {
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn reversed(self) -> Self {
        Self::new(self.b, self.a)
    }

    pub fn is_vertical(&self) -> bool {
        self.a.x == self.b.x
    }

    pub fn is_horizontal(&self) -> bool {
        self.a.y == self.b.y
    }

    pub fn is_axis_aligned(&self) -> bool {
        self.is_vertical() || self.is_horizontal()
    }

    /// Integer lattice points of an axis-aligned edge, in increasing order.
    /// A slanted edge is walked along x at the first endpoint's y.
    pub fn lattice_points(&self) -> impl Iterator<Item = Point> {
        let Edge { a, b } = *self;
        let (fixed, lo, hi, vertical) = if a.x == b.x {
            (a.x, a.y.min(b.y), a.y.max(b.y), true)
        } else {
            (a.y, a.x.min(b.x), a.x.max(b.x), false)
        };
        (lo..=hi).map(move |t| {
            if vertical {
                Point::new(fixed, t)
            } else {
                Point::new(t, fixed)
            }
        })
    }
}

impl From<[Point; 2]> for Edge {
    fn from([a, b]: [Point; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<Edge> for [Point; 2] {
    fn from(edge: Edge) -> Self {
        [edge.a, edge.b]
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} -> {}]", self.a, self.b)
    }
}

/// True when `segment` touches any wall. Shared endpoints count.
pub fn crash(segment: Edge, walls: &[Edge]) -> bool {
    walls.iter().any(|wall| intersect(segment, *wall))
}

/// Exact intersection test for two closed segments.
pub fn intersect(e1: Edge, e2: Edge) -> bool {
    let (x1a, y1a) = (i64::from(e1.a.x), i64::from(e1.a.y));
    let (x1b, y1b) = (i64::from(e1.b.x), i64::from(e1.b.y));
    let (x2a, y2a) = (i64::from(e2.a.x), i64::from(e2.a.y));
    let dx1 = x1a - x1b;
    let dy1 = y1a - y1b;
    let dx2 = x2a - i64::from(e2.b.x);
    let dy2 = y2a - i64::from(e2.b.y);

    if dx1 == 0 && dx2 == 0 {
        if x1a != x2a {
            return false;
        }
        return collinear_overlap(e1, e2);
    }

    let (x, y) = if dx2 == 0 {
        // e2 vertical, e1 not
        let y = ((x2a - x1a) * dy1) as f64 / dx1 as f64 + y1a as f64;
        (x2a as f64, y)
    } else if dx1 == 0 {
        let y = ((x1a - x2a) * dy2) as f64 / dx2 as f64 + y2a as f64;
        (x1a as f64, y)
    } else {
        if dy1 * dx2 == dx1 * dy2 {
            // parallel; collinear only if the intercepts agree
            if dx2 * dx1 * (y2a - y1a) != dy2 * dx1 * x2a - dy1 * dx2 * x1a {
                return false;
            }
            return collinear_overlap(e1, e2);
        }
        let x = (dx2 * dx1 * (y2a - y1a) - dy2 * dx1 * x2a + dy1 * dx2 * x1a) as f64
            / (dx2 * dy1 - dy2 * dx1) as f64;
        let y = (dy2 * dy1 * (x2a - x1a) - dx2 * dy1 * y2a + dx1 * dy2 * y1a) as f64
            / (dy2 * dx1 - dx2 * dy1) as f64;
        (x, y)
    };

    point_in_segment(x, y, e1) && point_in_segment(x, y, e2)
}

fn collinear_overlap(e1: Edge, e2: Edge) -> bool {
    let on = |p: Point, e: Edge| point_in_segment(f64::from(p.x), f64::from(p.y), e);
    on(e1.a, e2) || on(e1.b, e2) || on(e2.a, e1) || on(e2.b, e1)
}

/// Bounding-box containment for a point already known to be collinear with
/// `edge`. The y test only matters for vertical edges.
pub fn point_in_segment(x: f64, y: f64, edge: Edge) -> bool {
    let within = |v: f64, a: i32, b: i32| {
        let (a, b) = (f64::from(a), f64::from(b));
        (a <= v && v <= b) || (b <= v && v <= a)
    };
    within(x, edge.a.x, edge.b.x) && within(y, edge.a.y, edge.b.y)
}

/// Smallest Euclidean distance from `point` to a lattice point of `finish`.
pub fn distance_to_finish(point: Point, finish: Edge) -> f64 {
    finish
        .lattice_points()
        .map(|target| point.distance_to(target))
        .fold(f64::INFINITY, f64::min)
}

/// Like [`distance_to_finish`], but only through straight lines that stay
/// clear of every wall. Infinite when the finish is not directly visible.
pub fn visible_distance_to_finish(point: Point, finish: Edge, walls: &[Edge]) -> f64 {
    finish
        .lattice_points()
        .filter(|target| !crash(Edge::new(point, *target), walls))
        .map(|target| point.distance_to(target))
        .fold(f64::INFINITY, f64::min)
}
