use crate::config::HarnessConfig;
use crate::drivers::{create_driver, driver_ids};
use crate::opponents::Opponent;
use crate::problem::RaceProblem;
use crate::runner::{run_race, RaceOutcome, RaceReport};
use crate::util::{now_unix_s, seed_to_hex, write_json_pretty};
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub drivers: Vec<String>,
    pub problems: Vec<RaceProblem>,
    pub opponents: Vec<String>,
    pub seeds: Vec<u32>,
    pub harness: HarnessConfig,
    pub out_dir: PathBuf,
    pub save_races: bool,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub driver_id: String,
    pub problem: String,
    pub opponent_id: String,
    pub seed: u32,
    pub seed_hex: String,
    pub outcome: RaceOutcome,
    pub turns: u32,
    pub timeouts: u32,
    pub fallbacks: u32,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverAggregate {
    pub driver_id: String,
    pub runs: usize,
    pub wins: usize,
    pub crashes: usize,
    pub wrong_moves: usize,
    pub turn_limits: usize,
    pub win_rate: f64,
    /// Mean turns over winning runs only.
    pub avg_turns_to_win: Option<f64>,
    pub avg_elapsed_ms: f64,
    pub timeouts: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_unix_s: u64,
    pub max_turns: u32,
    pub search_depth: u32,
    pub turn_deadline_ms: u64,
    pub jobs: Option<usize>,
    pub drivers: Vec<String>,
    pub problems: Vec<String>,
    pub opponents: Vec<String>,
    pub seeds: Vec<u32>,
    pub run_count: usize,
    pub driver_rankings: Vec<DriverAggregate>,
    pub runs: Vec<RunRecord>,
}

pub fn resolve_drivers(input: Option<&str>) -> Result<Vec<String>> {
    resolve_ids(input, driver_ids(), "--drivers")
}

pub fn resolve_opponents(input: Option<&str>) -> Result<Vec<String>> {
    resolve_ids(input, crate::opponents::opponent_ids(), "--opponents")
}

fn resolve_ids(input: Option<&str>, all: Vec<&'static str>, flag: &str) -> Result<Vec<String>> {
    match input {
        None => Ok(all.iter().map(|id| (*id).to_string()).collect()),
        Some(raw) => {
            let ids: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect();
            if ids.is_empty() {
                return Err(anyhow!("{flag} resolved to empty list"));
            }
            Ok(ids)
        }
    }
}

#[derive(Clone, Debug)]
struct RunJob<'a> {
    driver_id: &'a str,
    problem: &'a RaceProblem,
    opponent_id: &'a str,
    seed: u32,
}

pub fn run_benchmark(config: BenchmarkConfig) -> Result<BenchmarkReport> {
    if config.seeds.is_empty() {
        return Err(anyhow!("benchmark requires at least one seed"));
    }
    if config.drivers.is_empty() {
        return Err(anyhow!("benchmark requires at least one driver"));
    }
    if config.problems.is_empty() {
        return Err(anyhow!("benchmark requires at least one problem"));
    }
    if let Some(jobs) = config.jobs {
        if jobs == 0 {
            return Err(anyhow!("benchmark --jobs must be >= 1 when provided"));
        }
    }
    for driver_id in &config.drivers {
        if create_driver(driver_id, config.harness.chooser()).is_none() {
            return Err(anyhow!(
                "unknown driver '{driver_id}'. available: {}",
                driver_ids().join(", ")
            ));
        }
    }
    let mut seeded = HashMap::new();
    for opponent_id in &config.opponents {
        let opponent = Opponent::from_id(opponent_id, 0)?;
        seeded.insert(opponent_id.as_str(), opponent.uses_seed());
    }
    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed creating {}", config.out_dir.display()))?;

    // deterministic opponents would replay the same race for every seed
    let mut run_jobs = Vec::new();
    for driver_id in &config.drivers {
        for problem in &config.problems {
            for opponent_id in &config.opponents {
                let seeds = if seeded[opponent_id.as_str()] {
                    &config.seeds[..]
                } else {
                    &config.seeds[..1]
                };
                for seed in seeds {
                    run_jobs.push(RunJob {
                        driver_id,
                        problem,
                        opponent_id,
                        seed: *seed,
                    });
                }
            }
        }
    }

    let run_one = |job: &RunJob| -> Result<RaceReport> {
        run_race(
            job.problem,
            job.driver_id,
            job.opponent_id,
            job.seed,
            config.harness,
        )
        .with_context(|| {
            format!(
                "benchmark run failed for driver={} problem={} opponent={} seed={:#x}",
                job.driver_id, job.problem.label, job.opponent_id, job.seed
            )
        })
    };

    let run_results: Vec<Result<RaceReport>> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| run_jobs.par_iter().map(run_one).collect())
    } else {
        run_jobs.par_iter().map(run_one).collect()
    };

    let mut reports = Vec::with_capacity(run_results.len());
    for result in run_results {
        reports.push(result?);
    }

    let rankings = rank_drivers(&reports);

    let mut run_records: Vec<RunRecord> = reports
        .iter()
        .map(|report| RunRecord {
            driver_id: report.driver_id.clone(),
            problem: report.problem.clone(),
            opponent_id: report.opponent_id.clone(),
            seed: report.seed,
            seed_hex: seed_to_hex(report.seed),
            outcome: report.outcome,
            turns: report.turns,
            timeouts: report.timeouts,
            fallbacks: report.fallbacks,
            elapsed_ms: report.elapsed_ms,
        })
        .collect();
    run_records.sort_by(|a, b| {
        a.driver_id
            .cmp(&b.driver_id)
            .then_with(|| a.problem.cmp(&b.problem))
            .then_with(|| a.opponent_id.cmp(&b.opponent_id))
            .then_with(|| a.seed.cmp(&b.seed))
    });

    if config.save_races {
        save_race_reports(&config.out_dir, &reports)?;
    }
    write_runs_csv(&config.out_dir.join("runs.csv"), &run_records)?;
    write_rankings_csv(&config.out_dir.join("rankings.csv"), &rankings)?;

    let report = BenchmarkReport {
        generated_unix_s: now_unix_s(),
        max_turns: config.harness.max_turns,
        search_depth: config.harness.search_depth,
        turn_deadline_ms: config.harness.turn_deadline.as_millis() as u64,
        jobs: config.jobs,
        drivers: config.drivers,
        problems: config.problems.iter().map(|p| p.label.clone()).collect(),
        opponents: config.opponents,
        seeds: config.seeds,
        run_count: run_records.len(),
        driver_rankings: rankings,
        runs: run_records,
    };
    write_json_pretty(&config.out_dir.join("summary.json"), &report)?;

    Ok(report)
}

fn rank_drivers(reports: &[RaceReport]) -> Vec<DriverAggregate> {
    let mut grouped: HashMap<&str, Vec<&RaceReport>> = HashMap::new();
    for report in reports {
        grouped
            .entry(report.driver_id.as_str())
            .or_default()
            .push(report);
    }

    let mut rankings = Vec::new();
    for (driver_id, runs) in grouped {
        let count = |outcome: RaceOutcome| runs.iter().filter(|r| r.outcome == outcome).count();
        let wins = count(RaceOutcome::Win);
        let win_turns: Vec<f64> = runs
            .iter()
            .filter(|r| r.outcome == RaceOutcome::Win)
            .map(|r| f64::from(r.turns))
            .collect();
        let avg_turns_to_win =
            (!win_turns.is_empty()).then(|| win_turns.iter().sum::<f64>() / win_turns.len() as f64);
        rankings.push(DriverAggregate {
            driver_id: driver_id.to_string(),
            runs: runs.len(),
            wins,
            crashes: count(RaceOutcome::Crash),
            wrong_moves: count(RaceOutcome::WrongMove),
            turn_limits: count(RaceOutcome::TurnLimit),
            win_rate: wins as f64 / runs.len() as f64,
            avg_turns_to_win,
            avg_elapsed_ms: runs.iter().map(|r| r.elapsed_ms as f64).sum::<f64>()
                / runs.len() as f64,
            timeouts: runs.iter().map(|r| r.timeouts).sum(),
        });
    }

    rankings.sort_by(|a, b| {
        b.win_rate
            .total_cmp(&a.win_rate)
            .then_with(|| {
                let turns = |agg: &DriverAggregate| agg.avg_turns_to_win.unwrap_or(f64::INFINITY);
                turns(a).total_cmp(&turns(b))
            })
            .then_with(|| a.avg_elapsed_ms.total_cmp(&b.avg_elapsed_ms))
    });
    rankings
}

fn save_race_reports(out_dir: &Path, reports: &[RaceReport]) -> Result<()> {
    let race_dir = out_dir.join("races");
    fs::create_dir_all(&race_dir)
        .with_context(|| format!("failed creating {}", race_dir.display()))?;
    for report in reports {
        let name = format!(
            "{}-{}-{}-seed{:08x}-{}.json",
            report.driver_id,
            report.problem,
            report.opponent_id,
            report.seed,
            report.outcome.as_str()
        );
        write_json_pretty(&race_dir.join(name), report)?;
    }
    Ok(())
}

fn write_runs_csv(path: &Path, rows: &[RunRecord]) -> Result<()> {
    let mut csv = String::from(
        "driver_id,problem,opponent_id,seed_hex,seed,outcome,turns,timeouts,fallbacks,elapsed_ms\n",
    );
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            row.driver_id,
            row.problem,
            row.opponent_id,
            row.seed_hex,
            row.seed,
            row.outcome.as_str(),
            row.turns,
            row.timeouts,
            row.fallbacks,
            row.elapsed_ms
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}

fn write_rankings_csv(path: &Path, rows: &[DriverAggregate]) -> Result<()> {
    let mut csv = String::from(
        "rank,driver_id,runs,wins,crashes,wrong_moves,turn_limits,win_rate,avg_turns_to_win,avg_elapsed_ms,timeouts\n",
    );
    for (idx, row) in rows.iter().enumerate() {
        let avg_turns = row
            .avg_turns_to_win
            .map(|turns| format!("{turns:.2}"))
            .unwrap_or_default();
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{:.4},{},{:.1},{}\n",
            idx + 1,
            row.driver_id,
            row.runs,
            row.wins,
            row.crashes,
            row.wrong_moves,
            row.turn_limits,
            row.win_rate,
            avg_turns,
            row.avg_elapsed_ms,
            row.timeouts
        ));
    }
    fs::write(path, csv).with_context(|| format!("failed writing {}", path.display()))
}
