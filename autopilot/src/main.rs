use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use racetrack_autopilot::benchmark::{
    resolve_drivers, resolve_opponents, run_benchmark, BenchmarkConfig,
};
use racetrack_autopilot::config::HarnessConfig;
use racetrack_autopilot::drivers::{create_driver, describe_drivers, driver_ids, Driver};
use racetrack_autopilot::harness::{Harness, TurnOutcome};
use racetrack_autopilot::opponents::describe_opponents;
use racetrack_autopilot::problem::{describe_problems, load_problem, resolve_problems};
use racetrack_autopilot::runner::{run_race, run_race_with_store};
use racetrack_autopilot::store::StateStore;
use racetrack_autopilot::util::{
    now_unix_s, parse_pair, parse_seed, parse_seed_csv, seed_sequence, seed_to_hex,
    write_json_pretty,
};
use racetrack_core::{Point, State, Velocity};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "racetrack-autopilot")]
#[command(about = "Adversarial racetrack driver: single races, per-turn hooks and benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `RACETRACK_*` environment defaults.
#[derive(Args, Debug, Clone, Copy)]
struct LimitArgs {
    #[arg(long)]
    depth: Option<u32>,
    #[arg(long)]
    turn_deadline_ms: Option<u64>,
    #[arg(long)]
    init_deadline_ms: Option<u64>,
    #[arg(long)]
    max_turns: Option<u32>,
}

impl LimitArgs {
    fn harness_config(self) -> HarnessConfig {
        HarnessConfig::from_env().with_overrides(
            self.depth,
            self.turn_deadline_ms,
            self.init_deadline_ms,
            self.max_turns,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available drivers and opponents
    ListDrivers,
    /// List built-in race problems
    ListProblems,
    /// Run one race and print its outcome
    Race {
        /// Built-in problem label or path to a problem JSON file
        #[arg(long)]
        problem: String,
        #[arg(long, default_value = "alphabeta")]
        driver: String,
        #[arg(long, default_value = "null")]
        opponent: String,
        #[arg(long, default_value = "0x00000001")]
        seed: String,
        #[command(flatten)]
        limits: LimitArgs,
        /// Write the full race report (every move segment) as JSON
        #[arg(long)]
        output: Option<PathBuf>,
        /// Keep grid and frontier on disk between turns
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
    /// Build and store the heuristic grid for a problem, clearing old race state
    Init {
        #[arg(long)]
        problem: String,
        #[arg(long)]
        state_dir: PathBuf,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Choose the velocity for one turn using stored race state
    Turn {
        #[arg(long)]
        problem: String,
        #[arg(long)]
        state_dir: PathBuf,
        /// Current position as `x,y`
        #[arg(long, allow_hyphen_values = true)]
        position: String,
        /// Current velocity as `u,v`
        #[arg(long, allow_hyphen_values = true)]
        velocity: String,
        #[arg(long, default_value = "alphabeta")]
        driver: String,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Race every driver on every problem against every opponent
    Benchmark {
        #[arg(long)]
        drivers: Option<String>,
        #[arg(long)]
        problems: Option<String>,
        #[arg(long)]
        opponents: Option<String>,
        #[arg(long)]
        seeds: Option<String>,
        #[arg(long)]
        seed_start: Option<String>,
        #[arg(long, default_value_t = 4)]
        seed_count: u32,
        #[command(flatten)]
        limits: LimitArgs,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Also write one JSON report per race under `races/`
        #[arg(long, default_value_t = false)]
        save_races: bool,
        #[arg(long)]
        jobs: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match Cli::parse().command {
        Commands::ListDrivers => {
            for (id, description) in describe_drivers() {
                println!("driver   {id:12} {description}");
            }
            for (id, description) in describe_opponents() {
                println!("opponent {id:12} {description}");
            }
        }
        Commands::ListProblems => {
            for (label, description) in describe_problems() {
                println!("{label:12} {description}");
            }
        }
        Commands::Race {
            problem,
            driver,
            opponent,
            seed,
            limits,
            output,
            state_dir,
        } => {
            let problem = load_problem(&problem)?;
            let seed = parse_seed(&seed)?;
            let config = limits.harness_config();
            let report = match state_dir {
                Some(dir) => {
                    let store = StateStore::open(dir)?;
                    store.reset()?;
                    run_race_with_store(&problem, &driver, &opponent, seed, config, store)?
                }
                None => run_race(&problem, &driver, &opponent, seed, config)?,
            };

            println!("problem={}", report.problem);
            println!("driver={}", report.driver_id);
            println!("opponent={}", report.opponent_id);
            println!("seed={}", seed_to_hex(report.seed));
            println!("outcome={}", report.outcome.as_str());
            println!("turns={}", report.turns);
            println!(
                "final_position={},{}",
                report.final_state.position.x, report.final_state.position.y
            );
            println!("timeouts={}", report.timeouts);
            println!("fallbacks={}", report.fallbacks);
            println!("elapsed_ms={}", report.elapsed_ms);
            if let Some(path) = output {
                write_json_pretty(&path, &report)?;
                println!("output={}", path.display());
            }
        }
        Commands::Init {
            problem,
            state_dir,
            limits,
        } => {
            let problem = load_problem(&problem)?;
            let store = StateStore::open(&state_dir)?;
            store.reset()?;
            let config = limits.harness_config();
            let driver = driver_or_err("alphabeta", config)?;
            let mut harness = Harness::new(driver, problem.context()?, config)?.with_store(store);
            let outcome = harness.initialize();
            println!("problem={}", problem.label);
            println!("init={outcome:?}");
            println!("state_dir={}", state_dir.display());
        }
        Commands::Turn {
            problem,
            state_dir,
            position,
            velocity,
            driver,
            limits,
        } => {
            let problem = load_problem(&problem)?;
            let (x, y) = parse_pair(&position)?;
            let (u, v) = parse_pair(&velocity)?;
            let state = State::new(Point::new(x, y), Velocity::new(u, v));
            let config = limits.harness_config();
            let driver = driver_or_err(&driver, config)?;
            let store = StateStore::open(&state_dir)?;
            let mut harness = Harness::new(driver, problem.context()?, config)?.with_store(store);

            let chosen = match harness.turn(state) {
                TurnOutcome::Move(velocity) => velocity,
                TurnOutcome::TimedOut {
                    provisional: Some(velocity),
                } => {
                    println!("provisional=true");
                    velocity
                }
                TurnOutcome::TimedOut { provisional: None } => {
                    return Err(anyhow!("turn timed out without a provisional move"));
                }
                TurnOutcome::Malformed(reason) => {
                    return Err(anyhow!("driver produced a malformed move: {reason}"));
                }
            };
            println!("velocity={},{}", chosen.u, chosen.v);
            println!("frontier={}", harness.frontier().len());
        }
        Commands::Benchmark {
            drivers,
            problems,
            opponents,
            seeds,
            seed_start,
            seed_count,
            limits,
            out_dir,
            save_races,
            jobs,
        } => {
            let drivers = resolve_drivers(drivers.as_deref())?;
            let problems = resolve_problems(problems.as_deref())?;
            let opponents = resolve_opponents(opponents.as_deref())?;
            let seeds = match seeds {
                Some(csv) => parse_seed_csv(&csv)?,
                None => {
                    let start = match seed_start {
                        Some(start) => parse_seed(&start)?,
                        None => 0xACE0_0001,
                    };
                    seed_sequence(start, seed_count)
                }
            };
            let out_dir = out_dir
                .unwrap_or_else(|| PathBuf::from(format!("benchmarks/race-{}", now_unix_s())));

            let report = run_benchmark(BenchmarkConfig {
                drivers,
                problems,
                opponents,
                seeds,
                harness: limits.harness_config(),
                out_dir: out_dir.clone(),
                save_races,
                jobs,
            })?;

            println!("runs={}", report.run_count);
            println!(
                "jobs={}",
                report
                    .jobs
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("out_dir={}", out_dir.display());
            println!("rankings:");
            for (idx, driver) in report.driver_rankings.iter().enumerate() {
                let avg_turns = driver
                    .avg_turns_to_win
                    .map(|turns| format!("{turns:.1}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {}. {}  win_rate={:.0}% wins={} crashes={} wrong_moves={} turn_limits={} avg_turns_to_win={} avg_ms={:.1}",
                    idx + 1,
                    driver.driver_id,
                    driver.win_rate * 100.0,
                    driver.wins,
                    driver.crashes,
                    driver.wrong_moves,
                    driver.turn_limits,
                    avg_turns,
                    driver.avg_elapsed_ms,
                );
            }
        }
    }

    Ok(())
}

fn driver_or_err(id: &str, config: HarnessConfig) -> Result<Arc<dyn Driver>> {
    create_driver(id, config.chooser()).ok_or_else(|| {
        anyhow!(
            "unknown driver '{id}'. available: {}",
            driver_ids().join(", ")
        )
    })
}
