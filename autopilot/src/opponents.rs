use anyhow::{anyhow, Result};
use racetrack_core::geometry::intersect;
use racetrack_core::rng::SeededRng;
use racetrack_core::{Edge, Point, RaceContext, Velocity};

/// Perturbs the mover's chosen velocity. The returned error vector is added to
/// the displacement, each component in `[-1, 1]`.
#[derive(Clone, Debug)]
pub enum Opponent {
    Null,
    Random { rng: SeededRng },
    WallSeeker,
}

impl Opponent {
    pub fn from_id(id: &str, seed: u32) -> Result<Self> {
        match id {
            "null" => Ok(Self::Null),
            "random" => Ok(Self::Random {
                rng: SeededRng::new(seed),
            }),
            "wall-seeker" => Ok(Self::WallSeeker),
            _ => Err(anyhow!(
                "unknown opponent '{id}'. available: {}",
                opponent_ids().join(", ")
            )),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Random { .. } => "random",
            Self::WallSeeker => "wall-seeker",
        }
    }

    /// Seeded opponents give different races per seed; the rest don't.
    pub fn uses_seed(&self) -> bool {
        matches!(self, Self::Random { .. })
    }

    pub fn error(&mut self, position: Point, velocity: Velocity, race: &RaceContext) -> Velocity {
        match self {
            Self::Null => Velocity::ZERO,
            Self::Random { rng } => {
                let q = rng.next_inclusive(-1, 1);
                let r = rng.next_inclusive(-1, 1);
                Velocity::new(q, r)
            }
            Self::WallSeeker => wall_seeker_error(position, velocity, race),
        }
    }
}

pub fn opponent_ids() -> Vec<&'static str> {
    vec!["null", "random", "wall-seeker"]
}

pub fn describe_opponents() -> Vec<(&'static str, &'static str)> {
    vec![
        ("null", "Never perturbs the move."),
        ("random", "Uniform error in [-1, 1] per axis from a seeded RNG."),
        (
            "wall-seeker",
            "Pushes the landing point as close to a wall as it can.",
        ),
    ]
}

/// Error that lands the mover nearest to some wall. A stopped mover is left
/// alone.
fn wall_seeker_error(position: Point, velocity: Velocity, race: &RaceContext) -> Velocity {
    if velocity.is_zero() {
        return Velocity::ZERO;
    }
    let landing = position.step(velocity);
    let mut best = Velocity::ZERO;
    let mut best_distance = f64::INFINITY;
    for q in -1..=1 {
        for r in -1..=1 {
            let pushed = landing.offset(q, r);
            for wall in race.walls() {
                let d = distance_to_wall(pushed, *wall, race.finish());
                if d < best_distance {
                    best_distance = d;
                    best = Velocity::new(q, r);
                }
            }
        }
    }
    best
}

/// Distance to the nearest lattice point of `wall` reachable in a straight
/// line without crossing the finish.
fn distance_to_wall(point: Point, wall: Edge, finish: Edge) -> f64 {
    wall.lattice_points()
        .filter(|target| !intersect(Edge::new(point, *target), finish))
        .map(|target| point.distance_to(target))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(x1: i32, y1: i32, x2: i32, y2: i32) -> Edge {
        Edge::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    fn race_with_wall() -> RaceContext {
        RaceContext::new(edge(1, 1, 1, 3), vec![edge(10, 0, 10, 8)], None).unwrap()
    }

    #[test]
    fn null_never_perturbs() {
        let race = race_with_wall();
        let mut opponent = Opponent::from_id("null", 0).unwrap();
        assert_eq!(
            opponent.error(Point::new(4, 4), Velocity::new(2, 1), &race),
            Velocity::ZERO
        );
    }

    #[test]
    fn random_errors_stay_in_range_and_replay_per_seed() {
        let race = race_with_wall();
        let mut a = Opponent::from_id("random", 0xC0FF_EE11).unwrap();
        let mut b = Opponent::from_id("random", 0xC0FF_EE11).unwrap();
        for _ in 0..200 {
            let e = a.error(Point::new(4, 4), Velocity::new(1, 0), &race);
            assert!((-1..=1).contains(&e.u) && (-1..=1).contains(&e.v));
            assert_eq!(e, b.error(Point::new(4, 4), Velocity::new(1, 0), &race));
        }
    }

    #[test]
    fn wall_seeker_pushes_toward_the_wall() {
        let race = race_with_wall();
        let mut opponent = Opponent::WallSeeker;
        // lands on (7, 4); the wall is at x = 10 and every row of the 3x3
        // window is equally close, so the first one scanned wins
        let e = opponent.error(Point::new(5, 4), Velocity::new(2, 0), &race);
        assert_eq!(e, Velocity::new(1, -1));
        assert_eq!(
            opponent.error(Point::new(5, 4), Velocity::ZERO, &race),
            Velocity::ZERO
        );
    }

    #[test]
    fn wall_seeker_without_walls_does_nothing() {
        let race = RaceContext::new(edge(0, 0, 0, 2), vec![], Some(Point::new(5, 0))).unwrap();
        let e = Opponent::WallSeeker.error(Point::new(5, 0), Velocity::new(-2, 0), &race);
        assert_eq!(e, Velocity::ZERO);
    }

    #[test]
    fn unknown_opponent_is_an_error() {
        assert!(Opponent::from_id("telepath", 1).is_err());
    }
}
