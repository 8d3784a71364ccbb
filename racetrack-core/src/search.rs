//! Depth-limited alpha-beta over alternating adversary and mover plies.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::eval::evaluate;
use crate::geometry::{Point, State};
use crate::grid::HeuristicGrid;
use crate::track::RaceContext;

/// Whose turn it is inside the search tree. The adversary nudges the position
/// within its 3x3 neighbourhood and wants the cost high; the mover picks the
/// next velocity and wants it low.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ply {
    Adversary,
    Mover,
}

impl Ply {
    pub fn next(self) -> Self {
        match self {
            Self::Adversary => Self::Mover,
            Self::Mover => Self::Adversary,
        }
    }

    /// Value this ply starts from before seeing any child.
    fn worst(self) -> f64 {
        match self {
            Self::Adversary => f64::NEG_INFINITY,
            Self::Mover => f64::INFINITY,
        }
    }

    /// True when `candidate` is strictly better than `best` for this ply.
    fn prefers(self, candidate: f64, best: f64) -> bool {
        match self {
            Self::Adversary => candidate > best,
            Self::Mover => candidate < best,
        }
    }
}

/// Search window, `alpha <= beta`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub alpha: f64,
    pub beta: f64,
}

impl Window {
    pub const FULL: Window = Window {
        alpha: f64::NEG_INFINITY,
        beta: f64::INFINITY,
    };

    /// Cut-off test for a ply that has reached `best`.
    fn cuts(&self, ply: Ply, best: f64) -> bool {
        match ply {
            Ply::Adversary => best >= self.beta,
            Ply::Mover => best <= self.alpha,
        }
    }

    fn tighten(&mut self, ply: Ply, best: f64) {
        match ply {
            Ply::Adversary => self.alpha = self.alpha.max(best),
            Ply::Mover => self.beta = self.beta.min(best),
        }
    }
}

/// Never raised; backs the uncancellable entry points.
pub(crate) static NEVER_STOP: AtomicBool = AtomicBool::new(false);

pub fn alpha_beta(
    race: &RaceContext,
    grid: &HeuristicGrid,
    state: State,
    depth: u32,
    window: Window,
    ply: Ply,
) -> f64 {
    alpha_beta_until(race, grid, state, depth, window, ply, &NEVER_STOP)
}

/// [`alpha_beta`] that gives up as soon as `stop` is raised. Every node checks
/// the flag; a cancelled subtree scores `+inf` and its value is meaningless.
pub fn alpha_beta_until(
    race: &RaceContext,
    grid: &HeuristicGrid,
    state: State,
    depth: u32,
    mut window: Window,
    ply: Ply,
    stop: &AtomicBool,
) -> f64 {
    if stop.load(Ordering::Relaxed) || !race.bounds().contains(state.position) {
        return f64::INFINITY;
    }
    let value = evaluate(race, grid, state);
    if depth == 0 || value == f64::NEG_INFINITY {
        return value;
    }
    if ply == Ply::Adversary && state.velocity.is_zero() {
        return value;
    }

    let children: Box<dyn Iterator<Item = State>> = match ply {
        Ply::Adversary => Box::new(
            state
                .position
                .neighborhood()
                .map(move |p| State::new(p, state.velocity)),
        ),
        Ply::Mover => Box::new(state.velocity.successors().map(move |v| state.advance(v))),
    };

    let mut best = ply.worst();
    for child in children {
        let score = alpha_beta_until(race, grid, child, depth - 1, window, ply.next(), stop);
        if ply.prefers(score, best) {
            best = score;
        }
        if window.cuts(ply, best) {
            return best;
        }
        window.tighten(ply, best);
    }
    best
}

/// Landing spot the adversary would pick for a mover arriving in `state`.
/// A stopped mover near the finish is left where it is.
pub fn adversary_choice(race: &RaceContext, grid: &HeuristicGrid, state: State) -> Point {
    if state.velocity.is_zero() && race.near_finish(state.position) {
        return state.position;
    }
    let mut best = f64::NEG_INFINITY;
    let mut choice = state.position;
    for p in state.position.neighborhood() {
        let value = evaluate(race, grid, State::new(p, state.velocity));
        if value > best {
            best = value;
            choice = p;
        }
    }
    choice
}
