use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use racetrack_core::eval::evaluate;
use racetrack_core::geometry::{crash, distance_to_finish};
use racetrack_core::{
    choose_velocity_until, ChooserConfig, Decision, Edge, Frontier, HeuristicGrid, RaceContext,
    State, Velocity,
};

/// A per-turn strategy. Drivers are stateless between turns: everything they
/// remember lives in the frontier the harness hands them. `stop` is raised
/// when the harness gives up on the turn; a driver should return promptly
/// once it sees it.
pub trait Driver: Send + Sync {
    fn id(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn plan(
        &self,
        race: &RaceContext,
        grid: &HeuristicGrid,
        frontier: &Frontier,
        state: State,
        stop: &AtomicBool,
        on_improvement: &mut dyn FnMut(Velocity),
    ) -> Decision;
}

/// Alpha-beta against the perturbing adversary, with crash and cycle filters.
pub struct AlphaBetaDriver {
    config: ChooserConfig,
}

impl AlphaBetaDriver {
    pub fn new(config: ChooserConfig) -> Self {
        Self { config }
    }
}

impl Driver for AlphaBetaDriver {
    fn id(&self) -> &'static str {
        "alphabeta"
    }

    fn description(&self) -> &'static str {
        "Depth-limited alpha-beta against the adversary with crash and cycle filters."
    }

    fn plan(
        &self,
        race: &RaceContext,
        grid: &HeuristicGrid,
        frontier: &Frontier,
        state: State,
        stop: &AtomicBool,
        on_improvement: &mut dyn FnMut(Velocity),
    ) -> Decision {
        choose_velocity_until(race, grid, frontier, state, self.config, stop, on_improvement)
    }
}

/// One-step lookahead that ignores the opponent and never looks at the
/// frontier. Useful as a baseline; it crashes a lot.
pub struct GreedyDriver;

impl Driver for GreedyDriver {
    fn id(&self) -> &'static str {
        "greedy"
    }

    fn description(&self) -> &'static str {
        "Lowest one-step evaluation among non-crashing moves; ignores the opponent."
    }

    fn plan(
        &self,
        race: &RaceContext,
        grid: &HeuristicGrid,
        _frontier: &Frontier,
        state: State,
        stop: &AtomicBool,
        on_improvement: &mut dyn FnMut(Velocity),
    ) -> Decision {
        let velocity = state.velocity;
        if distance_to_finish(state.position, race.finish()) <= 1.0
            && velocity.u.abs() <= 2
            && velocity.v.abs() <= 2
        {
            on_improvement(Velocity::ZERO);
            return Decision {
                velocity: Velocity::ZERO,
                value: f64::NEG_INFINITY,
                fell_back: false,
                entries: Vec::new(),
            };
        }

        let mut best = None;
        let mut best_value = f64::INFINITY;
        for candidate in velocity.successors() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let next = state.advance(candidate);
            if crash(Edge::new(state.position, next.position), race.walls()) {
                continue;
            }
            let value = evaluate(race, grid, next);
            if value < best_value {
                best_value = value;
                best = Some(candidate);
                on_improvement(candidate);
            }
        }
        Decision {
            velocity: best.unwrap_or(velocity),
            value: best_value,
            fell_back: best.is_none(),
            entries: Vec::new(),
        }
    }
}

pub fn driver_ids() -> Vec<&'static str> {
    vec!["alphabeta", "greedy"]
}

pub fn describe_drivers() -> Vec<(&'static str, &'static str)> {
    let chooser = ChooserConfig::default();
    vec![
        ("alphabeta", AlphaBetaDriver::new(chooser).description()),
        ("greedy", GreedyDriver.description()),
    ]
}

pub fn create_driver(id: &str, chooser: ChooserConfig) -> Option<Arc<dyn Driver>> {
    match id {
        "alphabeta" => Some(Arc::new(AlphaBetaDriver::new(chooser))),
        "greedy" => Some(Arc::new(GreedyDriver)),
        _ => None,
    }
}
