use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::geometry::{Edge, Point};

/// Inclusive box `[0..=xmax] x [0..=ymax]` every legal position lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub xmax: i32,
    pub ymax: i32,
}

impl Bounds {
    /// Box of the walls, widened to cover any extra points (finish line,
    /// start) the walls fail to enclose.
    pub fn enclosing(walls: &[Edge], extra: &[Point]) -> Self {
        let points = walls.iter().flat_map(|w| [w.a, w.b]).chain(extra.iter().copied());
        let (xmax, ymax) = points.fold((0, 0), |(xm, ym), p| (xm.max(p.x), ym.max(p.y)));
        Self { xmax, ymax }
    }

    pub fn contains(&self, p: Point) -> bool {
        (0..=self.xmax).contains(&p.x) && (0..=self.ymax).contains(&p.y)
    }

    pub fn width(&self) -> usize {
        (self.xmax + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.ymax + 1) as usize
    }

    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }
}

/// Band of cells around the finish line: `margin` cells past each end along
/// the line, and `margin` cells to either side across it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinishRing {
    finish: Edge,
    margin: i32,
}

impl FinishRing {
    pub fn new(finish: Edge, margin: i32) -> Self {
        Self { finish, margin }
    }

    pub fn contains(&self, p: Point) -> bool {
        let Edge { a, b } = self.finish;
        let m = self.margin;
        if a.x == b.x {
            (p.x - a.x).abs() <= m && a.y.min(b.y) - m <= p.y && p.y <= a.y.max(b.y) + m
        } else {
            (p.y - a.y).abs() <= m && a.x.min(b.x) - m <= p.x && p.x <= a.x.max(b.x) + m
        }
    }
}

/// Immutable per-race facts shared by every engine call.
#[derive(Clone, Debug)]
pub struct RaceContext {
    finish: Edge,
    walls: Vec<Edge>,
    bounds: Bounds,
    finish_ring: FinishRing,
    near_ring: FinishRing,
}

impl RaceContext {
    pub fn new(finish: Edge, walls: Vec<Edge>, start: Option<Point>) -> Result<Self, RaceError> {
        if !finish.is_axis_aligned() {
            return Err(RaceError::FinishNotAxisAligned { finish });
        }
        let mut extra = vec![finish.a, finish.b];
        extra.extend(start);
        if let Some(point) = walls
            .iter()
            .flat_map(|w| [w.a, w.b])
            .chain(extra.iter().copied())
            .find(|p| p.x < 0 || p.y < 0)
        {
            return Err(RaceError::NegativeCoordinate { point });
        }

        let bounds = Bounds::enclosing(&walls, &extra);
        Ok(Self {
            finish,
            walls,
            bounds,
            finish_ring: FinishRing::new(finish, 1),
            near_ring: FinishRing::new(finish, 2),
        })
    }

    pub fn finish(&self) -> Edge {
        self.finish
    }

    pub fn walls(&self) -> &[Edge] {
        &self.walls
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// On the finish line or one cell off it.
    pub fn in_finish_ring(&self, p: Point) -> bool {
        self.finish_ring.contains(p)
    }

    /// Wider two-cell band used by the adversary and crash shortcuts.
    pub fn near_finish(&self, p: Point) -> bool {
        self.near_ring.contains(p)
    }

    pub fn same_track(&self, finish: Edge, walls: &[Edge]) -> bool {
        self.finish == finish && self.walls == walls
    }
}
