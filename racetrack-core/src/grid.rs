//! Heuristic distance table over the track.
//!
//! The table is filled by one breadth-first sweep outward from the finish
//! line. Each cell first tries a clear straight line to the finish; cells
//! without one take the cheapest already-finite 8-neighbour plus the step
//! length. Cells are visited once, so concave obstacles can leave values above
//! the true shortest distance (or at +inf when the sweep reaches a cell before
//! any route around the obstacle has been filled in). Searches downstream are
//! tuned against exactly these values.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::geometry::{crash, visible_distance_to_finish, Edge, Point};
use crate::track::{Bounds, RaceContext};

const DIAGONAL_STEP: f64 = std::f64::consts::SQRT_2;

#[derive(Clone, Debug, PartialEq)]
pub struct HeuristicGrid {
    finish: Edge,
    walls: Vec<Edge>,
    bounds: Bounds,
    cells: Vec<f64>,
}

/// Serializable form of a grid. JSON has no infinity, so unreachable cells
/// are stored as `null`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub finish: Edge,
    pub walls: Vec<Edge>,
    pub bounds: Bounds,
    pub cells: Vec<Option<f64>>,
}

impl HeuristicGrid {
    pub fn build(race: &RaceContext) -> Self {
        let started = Instant::now();
        let bounds = race.bounds();
        let finish = race.finish();
        let walls = race.walls();
        let mut grid = Self {
            finish,
            walls: walls.to_vec(),
            bounds,
            cells: vec![f64::INFINITY; bounds.cell_count()],
        };

        let mut seen: HashSet<Point> = HashSet::new();
        let mut queue: VecDeque<Point> = VecDeque::new();

        let finish_cells: Vec<Point> = finish
            .lattice_points()
            .filter(|p| bounds.contains(*p))
            .collect();
        for cell in &finish_cells {
            grid.set(*cell, 0.0);
            seen.insert(*cell);
        }
        for cell in &finish_cells {
            for n in cell.neighborhood() {
                if bounds.contains(n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }

        while let Some(cell) = queue.pop_front() {
            let mut value = visible_distance_to_finish(cell, finish, walls);
            if value.is_infinite() {
                for n in cell.neighborhood() {
                    if n == cell || !bounds.contains(n) {
                        continue;
                    }
                    let base = grid.cells[grid.index(n)];
                    if base.is_infinite() || crash(Edge::new(cell, n), walls) {
                        continue;
                    }
                    let step = if n.x == cell.x || n.y == cell.y {
                        1.0
                    } else {
                        DIAGONAL_STEP
                    };
                    value = value.min(base + step);
                }
            }
            grid.set(cell, value);

            for n in cell.neighborhood() {
                if bounds.contains(n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }

        tracing::info!(
            width = bounds.width(),
            height = bounds.height(),
            reachable = grid.cells.iter().filter(|v| v.is_finite()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "heuristic grid built"
        );
        grid
    }

    fn index(&self, p: Point) -> usize {
        p.x as usize * self.bounds.height() + p.y as usize
    }

    fn set(&mut self, p: Point, value: f64) {
        let idx = self.index(p);
        self.cells[idx] = value;
    }

    /// Heuristic value at `p`; +inf outside the bounds.
    pub fn get(&self, p: Point) -> f64 {
        if self.bounds.contains(p) {
            self.cells[self.index(p)]
        } else {
            f64::INFINITY
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Built for this finish line and wall set.
    pub fn matches(&self, race: &RaceContext) -> bool {
        race.same_track(self.finish, &self.walls) && self.bounds == race.bounds()
    }

    pub fn to_snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            finish: self.finish,
            walls: self.walls.clone(),
            bounds: self.bounds,
            cells: self
                .cells
                .iter()
                .map(|v| if v.is_finite() { Some(*v) } else { None })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: GridSnapshot) -> Result<Self, RaceError> {
        let expected = snapshot.bounds.cell_count();
        if snapshot.cells.len() != expected {
            return Err(RaceError::GridShapeMismatch {
                expected,
                actual: snapshot.cells.len(),
            });
        }
        Ok(Self {
            finish: snapshot.finish,
            walls: snapshot.walls,
            bounds: snapshot.bounds,
            cells: snapshot
                .cells
                .into_iter()
                .map(|v| v.unwrap_or(f64::INFINITY))
                .collect(),
        })
    }
}

/// Holds at most one grid, keyed by the finish line and walls it was built for.
#[derive(Debug, Default)]
pub struct GridCache {
    grid: Option<Arc<HeuristicGrid>>,
}

impl GridCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, race: &RaceContext) -> Option<Arc<HeuristicGrid>> {
        self.grid.as_ref().filter(|g| g.matches(race)).cloned()
    }

    pub fn get_or_build(&mut self, race: &RaceContext) -> Arc<HeuristicGrid> {
        if let Some(grid) = self.get(race) {
            return grid;
        }
        if self.grid.is_some() {
            tracing::debug!("cached grid belongs to another track; rebuilding");
        }
        let grid = Arc::new(HeuristicGrid::build(race));
        self.grid = Some(Arc::clone(&grid));
        grid
    }

    pub fn insert(&mut self, grid: Arc<HeuristicGrid>) {
        self.grid = Some(grid);
    }

    pub fn invalidate(&mut self) {
        self.grid = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(x1: i32, y1: i32, x2: i32, y2: i32) -> Edge {
        Edge::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    fn boxed(width: i32, height: i32) -> Vec<Edge> {
        vec![
            edge(0, 0, width, 0),
            edge(width, 0, width, height),
            edge(width, height, 0, height),
            edge(0, height, 0, 0),
        ]
    }

    #[test]
    fn finish_cells_are_zero_and_values_non_negative() {
        let mut walls = boxed(12, 8);
        walls.push(edge(6, 2, 6, 8));
        let race = RaceContext::new(edge(9, 1, 11, 1), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        for x in 9..=11 {
            assert_eq!(grid.get(Point::new(x, 1)), 0.0);
        }
        for x in 0..=12 {
            for y in 0..=8 {
                let v = grid.get(Point::new(x, y));
                assert!(v.is_infinite() || v >= 0.0, "cell ({x},{y}) = {v}");
            }
        }
    }

    #[test]
    fn open_field_uses_straight_line_distance() {
        let race = RaceContext::new(edge(0, 0, 0, 2), vec![], Some(Point::new(5, 0))).unwrap();
        let grid = HeuristicGrid::build(&race);
        assert_eq!(grid.get(Point::new(5, 1)), 5.0);
        assert_eq!(grid.get(Point::new(3, 2)), 3.0);
        assert!(grid.get(Point::new(6, 0)).is_infinite());
    }

    #[test]
    fn enclosed_pocket_stays_unreachable() {
        let mut walls = boxed(12, 8);
        // sealed 3x3 room in the upper right
        walls.push(edge(8, 4, 11, 4));
        walls.push(edge(8, 4, 8, 7));
        walls.push(edge(8, 7, 11, 7));
        walls.push(edge(11, 4, 11, 7));
        let race = RaceContext::new(edge(2, 1, 4, 1), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        assert!(grid.get(Point::new(9, 5)).is_infinite());
        assert!(grid.get(Point::new(10, 6)).is_infinite());
        assert!(grid.get(Point::new(5, 5)).is_finite());
    }

    #[test]
    fn cells_behind_short_wall_relax_from_neighbours() {
        let mut walls = boxed(10, 10);
        walls.push(edge(3, 3, 3, 7));
        let race = RaceContext::new(edge(1, 4, 1, 6), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        let behind = grid.get(Point::new(5, 5));
        assert!(behind.is_finite());
        assert!(behind > 6.0, "must route around the wall, got {behind}");
        assert!(grid.get(Point::new(4, 5)) < behind);
    }

    #[test]
    fn snapshot_preserves_unreachable_cells() {
        let mut walls = boxed(6, 6);
        walls.push(edge(3, 0, 3, 6));
        let race = RaceContext::new(edge(1, 2, 1, 4), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        let json = serde_json::to_string(&grid.to_snapshot()).unwrap();
        let back: GridSnapshot = serde_json::from_str(&json).unwrap();
        let restored = HeuristicGrid::from_snapshot(back).unwrap();
        assert_eq!(restored, grid);
        assert!(restored.get(Point::new(5, 3)).is_infinite());
    }

    #[test]
    fn snapshot_with_wrong_cell_count_is_rejected() {
        let race = RaceContext::new(edge(0, 0, 0, 2), vec![], Some(Point::new(3, 0))).unwrap();
        let mut snapshot = HeuristicGrid::build(&race).to_snapshot();
        snapshot.cells.pop();
        assert!(matches!(
            HeuristicGrid::from_snapshot(snapshot),
            Err(RaceError::GridShapeMismatch { .. })
        ));
    }

    #[test]
    fn cache_rebuilds_only_for_a_different_track() {
        let a = RaceContext::new(edge(0, 0, 0, 2), vec![], Some(Point::new(4, 0))).unwrap();
        let b = RaceContext::new(edge(0, 0, 0, 3), vec![], Some(Point::new(4, 0))).unwrap();
        let mut cache = GridCache::new();
        let first = cache.get_or_build(&a);
        let again = cache.get_or_build(&a);
        assert!(Arc::ptr_eq(&first, &again));
        assert!(cache.get(&b).is_none());
        let other = cache.get_or_build(&b);
        assert!(!Arc::ptr_eq(&first, &other));
        cache.invalidate();
        assert!(cache.get(&b).is_none());
    }
}
