use crate::geometry::{crash, Edge, Point, State};
use crate::grid::HeuristicGrid;
use crate::track::RaceContext;

/// Cost of standing in `state`: heuristic distance at the position plus a
/// stopping-distance term. Lower is better. Returns `-inf` for a finished
/// race (parked in the finish ring) and `+inf` off the track.
pub fn evaluate(race: &RaceContext, grid: &HeuristicGrid, state: State) -> f64 {
    let State { position, velocity } = state;
    if velocity.is_zero() && race.in_finish_ring(position) {
        return f64::NEG_INFINITY;
    }
    if !race.bounds().contains(position) {
        return f64::INFINITY;
    }

    let base = grid.get(position);
    let walls = race.walls();
    let (au, av) = (velocity.u.abs(), velocity.v.abs());

    let sdu = au * (au - 1) / 2;
    let sdv = av * (av - 1) / 2;
    let sd = f64::from(sdu.max(sdv));

    let stop = position.offset(sdu * velocity.u.signum(), sdv * velocity.v.signum());
    let mut penalty = sd;
    if crash(Edge::new(position, stop), walls) {
        penalty += 1.1 * f64::from(au * au + av * av).sqrt();
    } else {
        penalty -= sd / 10.0;
    }

    let slow = position.offset(
        slow_stop(au) * velocity.u.signum(),
        slow_stop(av) * velocity.v.signum(),
    );
    if !crash(Edge::new(position, slow), walls) {
        let finish = race.finish();
        if race.in_finish_ring(slow) {
            penalty -= sd / 4.0;
        } else if [
            Point::new(finish.a.x, slow.y),
            Point::new(finish.b.x, slow.y),
            Point::new(slow.x, finish.a.y),
            Point::new(slow.x, finish.b.y),
        ]
        .into_iter()
        .any(|p| race.in_finish_ring(p))
        {
            penalty -= sd / 10.0;
        }
    }

    base + penalty
}

/// Distance covered while braking as gently as the rules allow.
fn slow_stop(speed: i32) -> i32 {
    if speed % 2 == 0 {
        (speed - 2) * speed / 4
    } else {
        (speed - 1) * speed / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Velocity;

    fn edge(x1: i32, y1: i32, x2: i32, y2: i32) -> Edge {
        Edge::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    fn state(x: i32, y: i32, u: i32, v: i32) -> State {
        State::new(Point::new(x, y), Velocity::new(u, v))
    }

    fn open_track() -> (RaceContext, HeuristicGrid) {
        let walls = vec![
            edge(0, 0, 20, 0),
            edge(20, 0, 20, 10),
            edge(20, 10, 0, 10),
            edge(0, 10, 0, 0),
        ];
        let race = RaceContext::new(edge(2, 3, 2, 6), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        (race, grid)
    }

    #[test]
    fn parked_in_finish_ring_is_a_win() {
        let (race, grid) = open_track();
        for (x, y) in [(2, 3), (1, 2), (3, 7), (2, 5)] {
            assert_eq!(evaluate(&race, &grid, state(x, y, 0, 0)), f64::NEG_INFINITY);
        }
        assert!(evaluate(&race, &grid, state(2, 4, 1, 0)).is_finite());
        assert!(evaluate(&race, &grid, state(4, 4, 0, 0)).is_finite());
    }

    #[test]
    fn stationary_value_is_grid_value() {
        let (race, grid) = open_track();
        let p = Point::new(9, 4);
        assert_eq!(evaluate(&race, &grid, State::new(p, Velocity::ZERO)), grid.get(p));
    }

    #[test]
    fn off_track_is_infinite() {
        let (race, grid) = open_track();
        assert_eq!(evaluate(&race, &grid, state(25, 4, 1, 0)), f64::INFINITY);
    }

    #[test]
    fn slow_stop_distances() {
        assert_eq!(
            [0, 1, 2, 3, 4, 5, 6].map(slow_stop),
            [0, 0, 0, 1, 2, 5, 6]
        );
    }

    #[test]
    fn wall_across_stopping_path_raises_cost() {
        let (race, grid) = open_track();
        // speed 4 east from (10, 8): fastest stop lands at (16, 8)
        let s = state(10, 8, 4, 0);
        let clear = evaluate(&race, &grid, s);

        let mut walls = race.walls().to_vec();
        walls.push(edge(13, 7, 13, 9));
        let blocked_race = RaceContext::new(race.finish(), walls, None).unwrap();
        let blocked = evaluate(&blocked_race, &grid, s);

        assert!(blocked > clear, "blocked={blocked} clear={clear}");
    }
}
