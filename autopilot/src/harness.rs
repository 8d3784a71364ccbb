//! Runs drivers under wall-clock deadlines.
//!
//! Each turn's search runs on tokio's blocking pool and is raced against the
//! turn deadline. The driver works on owned snapshots and hands back the
//! frontier entries it wants recorded; the harness commits them only when the
//! result arrives in time. A search that overruns is told to stop and can
//! never leave the frontier or the stored grid half-written.
//!
//! Grid builds and searches share a single worker slot. A turn waits for the
//! slot inside its own deadline, so an overrunning search or initialization
//! is never joined by a second one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use racetrack_core::{Frontier, GridCache, HeuristicGrid, RaceContext, State, Velocity};
use tokio::runtime::Runtime;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::HarnessConfig;
use crate::drivers::Driver;
use crate::store::StateStore;

/// What a driver produced for one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Move(Velocity),
    /// The driver returned an illegal velocity or died.
    Malformed(String),
    /// No result within the deadline. `provisional` is the best move the
    /// driver had published before it was cut off.
    TimedOut { provisional: Option<Velocity> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// A grid for this track was already cached or stored.
    Ready,
    Built,
    /// The build overran its budget. It keeps the worker slot until it
    /// finishes and the first turn after that adopts its grid.
    TimedOut,
    Failed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HarnessStats {
    pub turns: u32,
    pub timeouts: u32,
    pub fallbacks: u32,
}

pub struct Harness {
    runtime: Option<Runtime>,
    driver: Arc<dyn Driver>,
    race: Arc<RaceContext>,
    config: HarnessConfig,
    grids: GridCache,
    /// One permit: held by whichever grid build or search is running.
    worker_slot: Arc<Semaphore>,
    pending_grid: Option<JoinHandle<Arc<HeuristicGrid>>>,
    frontier: Frontier,
    store: Option<StateStore>,
    stats: HarnessStats,
}

impl Harness {
    pub fn new(driver: Arc<dyn Driver>, race: RaceContext, config: HarnessConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("failed to build harness runtime")?;
        Ok(Self {
            runtime: Some(runtime),
            driver,
            race: Arc::new(race),
            config,
            grids: GridCache::new(),
            worker_slot: Arc::new(Semaphore::new(1)),
            pending_grid: None,
            frontier: Frontier::new(),
            store: None,
            stats: HarnessStats::default(),
        })
    }

    /// Backs the harness with on-disk state, picking up whatever a previous
    /// process left there.
    pub fn with_store(mut self, store: StateStore) -> Self {
        if let Some(grid) = store.load_grid(&self.race) {
            self.grids.insert(Arc::new(grid));
        }
        self.frontier = store.load_frontier();
        self.store = Some(store);
        self
    }

    pub fn race(&self) -> &RaceContext {
        &self.race
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn stats(&self) -> HarnessStats {
        self.stats
    }

    pub fn driver_id(&self) -> &'static str {
        self.driver.id()
    }

    /// Builds (and stores) the heuristic grid under the init deadline.
    pub fn initialize(&mut self) -> InitOutcome {
        if self.grids.get(&self.race).is_some() {
            return InitOutcome::Ready;
        }
        let started = Instant::now();
        let deadline = self.config.init_deadline;
        let Some(slot) = self.claim_worker_slot(deadline) else {
            tracing::error!(
                timeout_ms = deadline.as_millis() as u64,
                "initialization timed out waiting for the running search"
            );
            return InitOutcome::TimedOut;
        };
        let Some(runtime) = self.runtime.as_ref() else {
            return InitOutcome::Failed;
        };

        let race = Arc::clone(&self.race);
        let store = self.store.clone();
        let mut task = runtime.spawn_blocking(move || {
            let _slot = slot;
            let grid = HeuristicGrid::build(&race);
            if let Some(store) = store {
                if let Err(err) = store.save_grid(&grid) {
                    tracing::warn!("failed to store heuristic grid: {err:#}");
                }
            }
            Arc::new(grid)
        });

        let remaining = deadline.saturating_sub(started.elapsed());
        let joined = runtime.block_on(async {
            tokio::select! {
                joined = &mut task => Some(joined),
                _ = tokio::time::sleep(remaining) => None,
            }
        });

        match joined {
            Some(Ok(grid)) => {
                tracing::info!(elapsed_ms = elapsed_ms(started), "initialization complete");
                self.grids.insert(grid);
                InitOutcome::Built
            }
            Some(Err(err)) => {
                tracing::error!("grid build task failed: {err}");
                InitOutcome::Failed
            }
            None => {
                tracing::error!(
                    timeout_ms = deadline.as_millis() as u64,
                    "initialization timed out; the first turn will wait for the grid"
                );
                self.pending_grid = Some(task);
                InitOutcome::TimedOut
            }
        }
    }

    /// Asks the driver for the velocity to use from `state`.
    pub fn turn(&mut self, state: State) -> TurnOutcome {
        self.stats.turns += 1;
        if self.runtime.is_none() {
            return TurnOutcome::Malformed("harness runtime is shut down".to_string());
        }

        let started = Instant::now();
        let deadline = self.config.turn_deadline;
        let Some(slot) = self.claim_worker_slot(deadline) else {
            self.stats.timeouts += 1;
            tracing::error!(
                %state,
                timeout_ms = deadline.as_millis() as u64,
                "turn timed out waiting for the previous search"
            );
            return TurnOutcome::TimedOut { provisional: None };
        };
        // Holding the slot means any overrun init build has returned.
        self.adopt_pending_grid();
        let Some(runtime) = self.runtime.as_ref() else {
            return TurnOutcome::Malformed("harness runtime is shut down".to_string());
        };

        let cached = self.grids.get(&self.race);
        let race = Arc::clone(&self.race);
        let driver = Arc::clone(&self.driver);
        let frontier = self.frontier.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let (provisional_tx, provisional_rx) = watch::channel(None::<Velocity>);

        let task = runtime.spawn_blocking({
            let stop = Arc::clone(&stop);
            move || {
                let _slot = slot;
                let grid = cached.unwrap_or_else(|| Arc::new(HeuristicGrid::build(&race)));
                let decision = driver.plan(&race, &grid, &frontier, state, &stop, &mut |velocity| {
                    let _ = provisional_tx.send(Some(velocity));
                });
                (grid, decision)
            }
        });

        let remaining = deadline.saturating_sub(started.elapsed());
        let joined = runtime.block_on(async {
            tokio::select! {
                joined = task => Some(joined),
                _ = tokio::time::sleep(remaining) => None,
            }
        });

        let (grid, decision) = match joined {
            None => {
                stop.store(true, Ordering::Relaxed);
                self.stats.timeouts += 1;
                let provisional = *provisional_rx.borrow();
                let provisional = provisional.filter(|v| v.is_legal_successor_of(state.velocity));
                tracing::error!(
                    %state,
                    timeout_ms = deadline.as_millis() as u64,
                    provisional = ?provisional,
                    "turn timed out"
                );
                return TurnOutcome::TimedOut { provisional };
            }
            Some(Err(err)) => {
                tracing::error!(%state, "driver task failed: {err}");
                return TurnOutcome::Malformed(format!("driver task failed: {err}"));
            }
            Some(Ok(result)) => result,
        };

        if self.grids.get(&self.race).is_none() {
            if let Some(store) = &self.store {
                if let Err(err) = store.save_grid(&grid) {
                    tracing::warn!("failed to store heuristic grid: {err:#}");
                }
            }
            self.grids.insert(grid);
        }
        if !decision.velocity.is_legal_successor_of(state.velocity) {
            return TurnOutcome::Malformed(format!(
                "velocity {} is not reachable from {}",
                decision.velocity, state.velocity
            ));
        }
        if decision.fell_back {
            self.stats.fallbacks += 1;
        }

        decision.commit(&mut self.frontier);
        if let Some(store) = &self.store {
            if let Err(err) = store.save_frontier(&self.frontier) {
                tracing::error!("failed to persist frontier: {err:#}");
            }
        }
        tracing::debug!(
            %state,
            velocity = %decision.velocity,
            value = decision.value,
            elapsed_ms = elapsed_ms(started),
            "turn decided"
        );
        TurnOutcome::Move(decision.velocity)
    }

    /// Waits up to `budget` for whatever holds the worker slot to finish.
    fn claim_worker_slot(&self, budget: Duration) -> Option<OwnedSemaphorePermit> {
        let runtime = self.runtime.as_ref()?;
        let slot = Arc::clone(&self.worker_slot);
        runtime.block_on(async {
            match tokio::time::timeout(budget, slot.acquire_owned()).await {
                Ok(Ok(permit)) => Some(permit),
                Ok(Err(_)) | Err(_) => None,
            }
        })
    }

    /// Takes over an initialization build that finished after its deadline.
    fn adopt_pending_grid(&mut self) {
        let (Some(handle), Some(runtime)) = (self.pending_grid.take(), self.runtime.as_ref()) else {
            return;
        };
        match runtime.block_on(handle) {
            Ok(grid) => {
                tracing::info!("adopting late heuristic grid");
                if self.grids.get(&self.race).is_none() {
                    self.grids.insert(grid);
                }
            }
            Err(err) => tracing::warn!("late grid build failed: {err}"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        // An abandoned search may not have noticed its stop flag yet.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
