use crate::config::HarnessConfig;
use crate::drivers::{create_driver, driver_ids};
use crate::harness::{Harness, InitOutcome, TurnOutcome};
use crate::opponents::Opponent;
use crate::problem::RaceProblem;
use crate::store::StateStore;
use anyhow::{anyhow, Result};
use racetrack_core::geometry::{crash, distance_to_finish};
use racetrack_core::{Edge, Point, State, Velocity};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceOutcome {
    Win,
    Crash,
    WrongMove,
    TurnLimit,
}

impl RaceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Crash => "crash",
            Self::WrongMove => "wrong_move",
            Self::TurnLimit => "turn_limit",
        }
    }
}

/// One executed move: where the mover aimed and where the opponent put it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSegment {
    pub turn: u32,
    pub from: Point,
    pub velocity: Velocity,
    pub error: Velocity,
    pub intended: Point,
    pub actual: Point,
    /// Velocity came from a timed-out search.
    pub provisional: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RaceReport {
    pub problem: String,
    pub driver_id: String,
    pub opponent_id: String,
    pub seed: u32,
    pub outcome: RaceOutcome,
    pub turns: u32,
    pub final_state: State,
    pub timeouts: u32,
    pub fallbacks: u32,
    pub elapsed_ms: u64,
    pub segments: Vec<MoveSegment>,
}

/// Stopped within one cell of the finish line.
pub fn goal_reached(state: State, finish: Edge) -> bool {
    state.velocity.is_zero() && distance_to_finish(state.position, finish) <= 1.0
}

pub fn run_race(
    problem: &RaceProblem,
    driver_id: &str,
    opponent_id: &str,
    seed: u32,
    config: HarnessConfig,
) -> Result<RaceReport> {
    let mut harness = build_harness(problem, driver_id, config)?;
    let mut opponent = Opponent::from_id(opponent_id, seed)?;
    Ok(run_with_harness(
        &mut harness,
        problem,
        &mut opponent,
        seed,
        config.max_turns,
    ))
}

/// Same as [`run_race`], with the grid and frontier kept in `store` between turns.
pub fn run_race_with_store(
    problem: &RaceProblem,
    driver_id: &str,
    opponent_id: &str,
    seed: u32,
    config: HarnessConfig,
    store: StateStore,
) -> Result<RaceReport> {
    let mut harness = build_harness(problem, driver_id, config)?.with_store(store);
    let mut opponent = Opponent::from_id(opponent_id, seed)?;
    Ok(run_with_harness(
        &mut harness,
        problem,
        &mut opponent,
        seed,
        config.max_turns,
    ))
}

fn build_harness(problem: &RaceProblem, driver_id: &str, config: HarnessConfig) -> Result<Harness> {
    let driver = create_driver(driver_id, config.chooser()).ok_or_else(|| {
        anyhow!(
            "unknown driver '{driver_id}'. available: {}",
            driver_ids().join(", ")
        )
    })?;
    Harness::new(driver, problem.context()?, config)
}

pub fn run_with_harness(
    harness: &mut Harness,
    problem: &RaceProblem,
    opponent: &mut Opponent,
    seed: u32,
    max_turns: u32,
) -> RaceReport {
    let started = Instant::now();
    tracing::info!(
        problem = %problem.label,
        driver = harness.driver_id(),
        opponent = opponent.id(),
        seed,
        "race starting"
    );

    let init = harness.initialize();
    if init == InitOutcome::TimedOut {
        tracing::warn!(problem = %problem.label, "racing without a prebuilt grid");
    }

    let finish = problem.finish;
    let mut state = State::new(problem.start, Velocity::ZERO);
    let mut segments = Vec::new();
    let mut outcome = RaceOutcome::TurnLimit;

    for turn in 0..max_turns {
        if goal_reached(state, finish) {
            outcome = RaceOutcome::Win;
            break;
        }

        let (velocity, provisional) = match harness.turn(state) {
            TurnOutcome::Move(velocity) => (velocity, false),
            TurnOutcome::TimedOut {
                provisional: Some(velocity),
            } => (velocity, true),
            TurnOutcome::TimedOut { provisional: None } => {
                tracing::warn!(turn, "no move before the deadline");
                outcome = RaceOutcome::WrongMove;
                break;
            }
            TurnOutcome::Malformed(reason) => {
                tracing::warn!(turn, %reason, "malformed move");
                outcome = RaceOutcome::WrongMove;
                break;
            }
        };

        let error = opponent.error(state.position, velocity, harness.race());
        let intended = state.position.step(velocity);
        let actual = intended.offset(error.u, error.v);
        segments.push(MoveSegment {
            turn,
            from: state.position,
            velocity,
            error,
            intended,
            actual,
            provisional,
        });

        if crash(Edge::new(state.position, actual), &problem.walls) {
            outcome = RaceOutcome::Crash;
            break;
        }
        state = State::new(actual, velocity);
    }
    if outcome == RaceOutcome::TurnLimit && goal_reached(state, finish) {
        outcome = RaceOutcome::Win;
    }

    let stats = harness.stats();
    let report = RaceReport {
        problem: problem.label.clone(),
        driver_id: harness.driver_id().to_string(),
        opponent_id: opponent.id().to_string(),
        seed,
        outcome,
        turns: segments.len() as u32,
        final_state: state,
        timeouts: stats.timeouts,
        fallbacks: stats.fallbacks,
        elapsed_ms: started.elapsed().as_millis() as u64,
        segments,
    };
    tracing::info!(
        problem = %report.problem,
        outcome = report.outcome.as_str(),
        turns = report.turns,
        elapsed_ms = report.elapsed_ms,
        "race finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_needs_zero_velocity_and_distance_one() {
        let finish = Edge::new(Point::new(0, 0), Point::new(0, 2));
        assert!(goal_reached(State::new(Point::new(1, 1), Velocity::ZERO), finish));
        assert!(!goal_reached(State::new(Point::new(1, 3), Velocity::ZERO), finish));
        assert!(!goal_reached(
            State::new(Point::new(0, 1), Velocity::new(1, 0)),
            finish
        ));
    }

    #[test]
    fn unknown_driver_is_an_error() {
        let problem = crate::problem::sample_problem("open-field").unwrap();
        assert!(run_race(&problem, "nope", "null", 1, HarnessConfig::default()).is_err());
    }

    #[test]
    fn both_entry_points_list_the_available_drivers() {
        let problem = crate::problem::sample_problem("open-field").unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::open(tmp.path()).unwrap();
        let errors = [
            run_race(&problem, "nope", "null", 1, HarnessConfig::default()).unwrap_err(),
            run_race_with_store(&problem, "nope", "null", 1, HarnessConfig::default(), store)
                .unwrap_err(),
        ];
        for err in errors {
            let message = err.to_string();
            assert!(message.contains("unknown driver 'nope'"), "{message}");
            for id in driver_ids() {
                assert!(message.contains(id), "{message}");
            }
        }
    }
}
