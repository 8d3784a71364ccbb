//! On-disk race state for process-per-turn use: the heuristic grid (written
//! once) and the frontier (rewritten every turn). Every write goes to a
//! temporary file in the same directory and is then renamed over the target,
//! so a reader sees either the old file or the new one.

use anyhow::{Context, Result};
use racetrack_core::grid::GridSnapshot;
use racetrack_core::{Frontier, HeuristicGrid, RaceContext};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const GRID_FILE: &str = "grid.json";
const FRONTIER_FILE: &str = "frontier.json";

#[derive(Clone, Debug)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed creating state dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn grid_path(&self) -> PathBuf {
        self.dir.join(GRID_FILE)
    }

    pub fn frontier_path(&self) -> PathBuf {
        self.dir.join(FRONTIER_FILE)
    }

    pub fn save_grid(&self, grid: &HeuristicGrid) -> Result<()> {
        write_json_atomic(&self.grid_path(), &grid.to_snapshot())
    }

    /// Stored grid for this track, or `None` when it is missing, unreadable,
    /// or was built for a different finish line or wall set.
    pub fn load_grid(&self, race: &RaceContext) -> Option<HeuristicGrid> {
        let path = self.grid_path();
        if !path.exists() {
            return None;
        }
        let snapshot: GridSnapshot = match read_json(&path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(path = %path.display(), "discarding unreadable grid: {err:#}");
                return None;
            }
        };
        let grid = match HeuristicGrid::from_snapshot(snapshot) {
            Ok(grid) => grid,
            Err(err) => {
                tracing::warn!(path = %path.display(), "discarding malformed grid: {err}");
                return None;
            }
        };
        if !grid.matches(race) {
            tracing::warn!(path = %path.display(), "stored grid belongs to another track");
            return None;
        }
        Some(grid)
    }

    pub fn save_frontier(&self, frontier: &Frontier) -> Result<()> {
        write_json_atomic(&self.frontier_path(), frontier)
    }

    /// Stored frontier, or an empty one when nothing usable is on disk.
    pub fn load_frontier(&self) -> Frontier {
        let path = self.frontier_path();
        if !path.exists() {
            return Frontier::new();
        }
        match read_json(&path) {
            Ok(frontier) => frontier,
            Err(err) => {
                tracing::warn!(path = %path.display(), "starting with an empty frontier: {err:#}");
                Frontier::new()
            }
        }
    }

    /// Removes stored state so the next race starts clean.
    pub fn reset(&self) -> Result<()> {
        for path in [self.grid_path(), self.frontier_path()] {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed removing {}", path.display()))?;
            }
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("malformed json in {}", path.display()))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let encoded = serde_json::to_vec(value).context("failed to serialize state")?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed creating temp file in {}", dir.display()))?;
    tmp.write_all(&encoded)
        .with_context(|| format!("failed writing temp file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed syncing temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed publishing {}", path.display()))?;
    Ok(())
}
