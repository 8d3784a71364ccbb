//! Top-level move selection: score every reachable velocity with the search,
//! then drop candidates the adversary could crash or that repeat old ground.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::frontier::{Frontier, FrontierEntry};
use crate::geometry::{crash, Edge, Point, State, Velocity};
use crate::grid::HeuristicGrid;
use crate::search::{adversary_choice, alpha_beta_until, Ply, Window, NEVER_STOP};
use crate::track::RaceContext;

pub const DEFAULT_SEARCH_DEPTH: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChooserConfig {
    pub depth: u32,
}

impl Default for ChooserConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_SEARCH_DEPTH,
        }
    }
}

/// Outcome of one turn's deliberation. `entries` still have to be committed
/// to the frontier by whoever owns it.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub velocity: Velocity,
    pub value: f64,
    /// No candidate survived the filters; the current velocity was kept.
    pub fell_back: bool,
    pub entries: Vec<FrontierEntry>,
}

impl Decision {
    pub fn commit(&self, frontier: &mut Frontier) {
        frontier.extend(self.entries.iter().copied());
    }
}

/// Picks the next velocity for `state`. `on_improvement` sees every candidate
/// that becomes the provisional best, so a caller racing a deadline always has
/// something to fall back on.
pub fn choose_velocity(
    race: &RaceContext,
    grid: &HeuristicGrid,
    frontier: &Frontier,
    state: State,
    config: ChooserConfig,
    on_improvement: &mut dyn FnMut(Velocity),
) -> Decision {
    choose_velocity_until(race, grid, frontier, state, config, &NEVER_STOP, on_improvement)
}

/// [`choose_velocity`] for a caller that may abandon the search. Once `stop`
/// is raised the remaining candidates are skipped and the returned decision
/// only reflects what was scored before; callers are expected to discard it.
pub fn choose_velocity_until(
    race: &RaceContext,
    grid: &HeuristicGrid,
    frontier: &Frontier,
    state: State,
    config: ChooserConfig,
    stop: &AtomicBool,
    on_improvement: &mut dyn FnMut(Velocity),
) -> Decision {
    let origin = state.position;
    let mut best_value = f64::INFINITY;
    let mut best: Option<Velocity> = None;

    for velocity in state.velocity.successors() {
        let landing = state.advance(velocity);
        let value = alpha_beta_until(
            race,
            grid,
            landing,
            config.depth,
            Window::FULL,
            Ply::Adversary,
            stop,
        );
        if stop.load(Ordering::Relaxed) {
            tracing::debug!(%state, "search cancelled");
            break;
        }
        tracing::debug!(%velocity, value, "candidate scored");
        if value >= best_value {
            continue;
        }

        let pushed_to = adversary_choice(race, grid, landing);
        if adversary_can_crash(race, origin, landing.position) {
            tracing::debug!(%velocity, "rejected: adversary can force a crash");
            continue;
        }
        if !race.in_finish_ring(landing.position) {
            let accel = velocity.delta_from(state.velocity);
            let repeats = frontier.contains(&FrontierEntry::stopped_at(landing.position))
                || frontier.contains(&FrontierEntry::transition(state, accel))
                || frontier.contains(&FrontierEntry::position(pushed_to));
            if repeats {
                tracing::debug!(%velocity, "rejected: revisits the frontier");
                continue;
            }
        }

        best_value = value;
        best = Some(velocity);
        on_improvement(velocity);
    }

    let fell_back = best.is_none();
    let velocity = best.unwrap_or(state.velocity);
    if fell_back && !stop.load(Ordering::Relaxed) {
        tracing::warn!(%state, "no candidate survived the filters; keeping velocity");
    }
    let destination = origin.step(velocity);
    Decision {
        velocity,
        value: best_value,
        fell_back,
        entries: vec![
            FrontierEntry::position(origin),
            FrontierEntry::stopped_at(destination),
            FrontierEntry::transition(state, velocity.delta_from(state.velocity)),
        ],
    }
}

/// True when some cell of the 3x3 block around `destination` is reached from
/// `origin` through a wall. Stopping in place near the finish is always safe.
fn adversary_can_crash(race: &RaceContext, origin: Point, destination: Point) -> bool {
    if origin == destination && race.near_finish(destination) {
        return false;
    }
    destination
        .neighborhood()
        .any(|p| crash(Edge::new(origin, p), race.walls()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::alpha_beta;

    fn edge(x1: i32, y1: i32, x2: i32, y2: i32) -> Edge {
        Edge::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    fn corridor() -> (RaceContext, HeuristicGrid) {
        let walls = vec![
            edge(0, 0, 20, 0),
            edge(20, 0, 20, 8),
            edge(20, 8, 0, 8),
            edge(0, 8, 0, 0),
            edge(10, 0, 10, 3),
        ];
        let race = RaceContext::new(edge(2, 2, 2, 6), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        (race, grid)
    }

    fn choose(
        race: &RaceContext,
        grid: &HeuristicGrid,
        frontier: &Frontier,
        state: State,
    ) -> Decision {
        choose_velocity(race, grid, frontier, state, ChooserConfig::default(), &mut |_| {})
    }

    #[test]
    fn chosen_move_never_crosses_a_wall() {
        let (race, grid) = corridor();
        let starts = [
            State::new(Point::new(15, 4), Velocity::ZERO),
            State::new(Point::new(12, 2), Velocity::new(-2, 0)),
            State::new(Point::new(17, 6), Velocity::new(1, 1)),
            State::new(Point::new(6, 5), Velocity::new(-1, -1)),
        ];
        for state in starts {
            let decision = choose(&race, &grid, &Frontier::new(), state);
            if decision.fell_back {
                continue;
            }
            let segment = Edge::new(state.position, state.position.step(decision.velocity));
            assert!(!crash(segment, race.walls()), "{state} -> {}", decision.velocity);
            assert!(decision.velocity.is_legal_successor_of(state.velocity));
        }
    }

    #[test]
    fn decision_lists_the_three_frontier_entries() {
        let (race, grid) = corridor();
        let state = State::new(Point::new(15, 4), Velocity::ZERO);
        let decision = choose(&race, &grid, &Frontier::new(), state);
        let destination = state.position.step(decision.velocity);
        assert_eq!(
            decision.entries,
            vec![
                FrontierEntry::position(state.position),
                FrontierEntry::stopped_at(destination),
                FrontierEntry::transition(state, decision.velocity),
            ]
        );

        let mut frontier = Frontier::new();
        decision.commit(&mut frontier);
        assert_eq!(frontier.len(), 3);
    }

    #[test]
    fn visited_destination_is_avoided() {
        let (race, grid) = corridor();
        let state = State::new(Point::new(15, 4), Velocity::ZERO);
        let first = choose(&race, &grid, &Frontier::new(), state);
        assert!(!first.fell_back);

        let mut frontier = Frontier::new();
        frontier.append(FrontierEntry::stopped_at(state.position.step(first.velocity)));
        let second = choose(&race, &grid, &frontier, state);
        assert_ne!(second.velocity, first.velocity);
    }

    #[test]
    fn visited_transition_alone_rejects_the_move() {
        let (race, grid) = corridor();
        let state = State::new(Point::new(15, 4), Velocity::ZERO);
        let first = choose(&race, &grid, &Frontier::new(), state);
        assert!(!first.fell_back);
        assert!(!race.in_finish_ring(state.position.step(first.velocity)));

        let accel = first.velocity.delta_from(state.velocity);
        let mut frontier = Frontier::new();
        frontier.append(FrontierEntry::transition(state, accel));
        let second = choose(&race, &grid, &frontier, state);
        assert!(!second.fell_back);
        assert_ne!(second.velocity, first.velocity);
    }

    #[test]
    fn finish_ring_destination_ignores_the_frontier() {
        let (race, grid) = corridor();
        // several moves tie next to the finish; the first of them lands in the ring
        let state = State::new(Point::new(4, 4), Velocity::ZERO);
        let first = choose(&race, &grid, &Frontier::new(), state);
        let destination = state.position.step(first.velocity);
        assert!(race.in_finish_ring(destination));

        let landing = state.advance(first.velocity);
        let accel = first.velocity.delta_from(state.velocity);
        let mut frontier = Frontier::new();
        frontier.append(FrontierEntry::stopped_at(destination));
        frontier.append(FrontierEntry::transition(state, accel));
        frontier.append(FrontierEntry::position(adversary_choice(&race, &grid, landing)));
        let second = choose(&race, &grid, &frontier, state);
        assert_eq!(second.velocity, first.velocity);
        assert!(!second.fell_back);
    }

    #[test]
    fn crashable_best_move_loses_to_a_safe_one() {
        let (race, grid) = corridor();
        // braking to a stop beside the tip of the inner wall scores best, but
        // the adversary can shove the car onto the tip at (10, 3)
        let state = State::new(Point::new(9, 4), Velocity::new(2, 0));
        let depth = ChooserConfig::default().depth;
        let mut unfiltered = state.velocity;
        let mut unfiltered_value = f64::INFINITY;
        for velocity in state.velocity.successors() {
            let landing = state.advance(velocity);
            let value = alpha_beta(&race, &grid, landing, depth, Window::FULL, Ply::Adversary);
            if value < unfiltered_value {
                unfiltered = velocity;
                unfiltered_value = value;
            }
        }
        let unfiltered_landing = state.position.step(unfiltered);
        assert!(!crash(Edge::new(state.position, unfiltered_landing), race.walls()));
        assert!(adversary_can_crash(&race, state.position, unfiltered_landing));

        let decision = choose(&race, &grid, &Frontier::new(), state);
        assert!(!decision.fell_back);
        assert_ne!(decision.velocity, unfiltered);
        assert!(decision.value > unfiltered_value);
        let landing = state.position.step(decision.velocity);
        assert!(!adversary_can_crash(&race, state.position, landing));
    }

    #[test]
    fn raised_stop_flag_skips_every_candidate() {
        let (race, grid) = corridor();
        let state = State::new(Point::new(15, 4), Velocity::new(-1, 0));
        let stop = AtomicBool::new(true);
        let mut seen = Vec::new();
        let decision = choose_velocity_until(
            &race,
            &grid,
            &Frontier::new(),
            state,
            ChooserConfig::default(),
            &stop,
            &mut |v| seen.push(v),
        );
        assert!(seen.is_empty());
        assert!(decision.fell_back);
        assert_eq!(decision.velocity, state.velocity);
    }

    #[test]
    fn falls_back_to_current_velocity_when_boxed_in() {
        // a 2x2 cell: every destination's neighbourhood touches a wall
        let walls = vec![
            edge(0, 0, 2, 0),
            edge(2, 0, 2, 2),
            edge(2, 2, 0, 2),
            edge(0, 2, 0, 0),
            edge(6, 0, 6, 4),
        ];
        let race = RaceContext::new(edge(6, 1, 6, 3), walls, None).unwrap();
        let grid = HeuristicGrid::build(&race);
        let state = State::new(Point::new(1, 1), Velocity::new(1, 0));
        let mut seen = Vec::new();
        let decision = choose_velocity(
            &race,
            &grid,
            &Frontier::new(),
            state,
            ChooserConfig::default(),
            &mut |v| seen.push(v),
        );
        assert!(decision.fell_back);
        assert_eq!(decision.velocity, state.velocity);
        assert!(seen.is_empty());
        assert_eq!(decision.value, f64::INFINITY);
    }

    #[test]
    fn provisional_callback_sees_the_final_choice_last() {
        let (race, grid) = corridor();
        let state = State::new(Point::new(15, 4), Velocity::ZERO);
        let mut seen = Vec::new();
        let decision = choose_velocity(
            &race,
            &grid,
            &Frontier::new(),
            state,
            ChooserConfig::default(),
            &mut |v| seen.push(v),
        );
        assert_eq!(seen.last(), Some(&decision.velocity));
    }
}
