use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, State, Velocity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrontierEntry {
    VisitedPosition { position: Point },
    VisitedState { state: State },
    VisitedTransition { from: State, accel: Velocity },
}

impl FrontierEntry {
    pub fn position(position: Point) -> Self {
        Self::VisitedPosition { position }
    }

    /// Marker for "arrived at `position` and could have stopped there".
    pub fn stopped_at(position: Point) -> Self {
        Self::VisitedState {
            state: State::new(position, Velocity::ZERO),
        }
    }

    pub fn transition(from: State, accel: Velocity) -> Self {
        Self::VisitedTransition { from, accel }
    }
}

/// Append-only record of where the mover has been during one race.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<FrontierEntry>", into = "Vec<FrontierEntry>")]
pub struct Frontier {
    entries: Vec<FrontierEntry>,
    index: HashSet<FrontierEntry>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, entry: &FrontierEntry) -> bool {
        self.index.contains(entry)
    }

    /// Records `entry`. Returns false when it was already present.
    pub fn append(&mut self, entry: FrontierEntry) -> bool {
        if !self.index.insert(entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were first recorded.
    pub fn iter(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.entries.iter()
    }
}

impl Extend<FrontierEntry> for Frontier {
    fn extend<I: IntoIterator<Item = FrontierEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.append(entry);
        }
    }
}

impl From<Vec<FrontierEntry>> for Frontier {
    fn from(entries: Vec<FrontierEntry>) -> Self {
        let mut frontier = Self::new();
        frontier.extend(entries);
        frontier
    }
}

impl From<Frontier> for Vec<FrontierEntry> {
    fn from(frontier: Frontier) -> Self {
        frontier.entries
    }
}
