use core::fmt;

use crate::geometry::{Edge, Point};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaceError {
    FinishNotAxisAligned { finish: Edge },
    NegativeCoordinate { point: Point },
    GridShapeMismatch { expected: usize, actual: usize },
}

impl fmt::Display for RaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FinishNotAxisAligned { finish } => write!(
                f,
                "finish line {finish} must be vertical or horizontal"
            ),
            Self::NegativeCoordinate { point } => {
                write!(f, "negative coordinate in track geometry: {point}")
            }
            Self::GridShapeMismatch { expected, actual } => write!(
                f,
                "grid cell count mismatch: expected {expected}, got {actual}"
            ),
        }
    }
}

impl std::error::Error for RaceError {}
