pub mod chooser;
pub mod error;
pub mod eval;
pub mod frontier;
pub mod geometry;
pub mod grid;
pub mod rng;
pub mod search;
pub mod track;

pub use chooser::{choose_velocity, choose_velocity_until, ChooserConfig, Decision};
pub use error::RaceError;
pub use frontier::{Frontier, FrontierEntry};
pub use geometry::{Edge, Point, State, Velocity};
pub use grid::{GridCache, HeuristicGrid};
pub use track::{Bounds, RaceContext};
