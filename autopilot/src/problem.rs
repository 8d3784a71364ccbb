use anyhow::{anyhow, Context, Result};
use racetrack_core::{Edge, Point, RaceContext};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A race as handed to the harness: where the car starts, the finish line it
/// must stop next to, and the walls it must not touch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceProblem {
    pub label: String,
    pub start: Point,
    pub finish: Edge,
    pub walls: Vec<Edge>,
}

impl RaceProblem {
    pub fn context(&self) -> Result<RaceContext> {
        RaceContext::new(self.finish, self.walls.clone(), Some(self.start))
            .with_context(|| format!("invalid race problem '{}'", self.label))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let problem: Self = serde_json::from_slice(bytes).context("malformed race problem json")?;
        problem.context()?;
        Ok(problem)
    }
}

fn edge(x1: i32, y1: i32, x2: i32, y2: i32) -> Edge {
    Edge::new(Point::new(x1, y1), Point::new(x2, y2))
}

fn boxed(width: i32, height: i32) -> Vec<Edge> {
    vec![
        edge(0, 0, width, 0),
        edge(width, 0, width, height),
        edge(width, height, 0, height),
        edge(0, height, 0, 0),
    ]
}

struct SampleProblem {
    label: &'static str,
    description: &'static str,
    build: fn() -> RaceProblem,
}

fn sample(label: &str, start: Point, finish: Edge, walls: Vec<Edge>) -> RaceProblem {
    RaceProblem {
        label: label.to_string(),
        start,
        finish,
        walls,
    }
}

fn open_field() -> RaceProblem {
    sample("open-field", Point::new(5, 0), edge(0, 0, 0, 2), Vec::new())
}

fn corridor() -> RaceProblem {
    let mut walls = boxed(20, 8);
    walls.push(edge(10, 0, 10, 3));
    sample("corridor", Point::new(17, 4), edge(2, 2, 2, 6), walls)
}

fn pillar() -> RaceProblem {
    let mut walls = boxed(24, 14);
    walls.push(edge(12, 4, 12, 10));
    sample("pillar", Point::new(3, 7), edge(20, 6, 20, 8), walls)
}

fn hook() -> RaceProblem {
    let mut walls = boxed(24, 14);
    walls.push(edge(8, 0, 8, 9));
    sample("hook", Point::new(16, 3), edge(3, 1, 3, 4), walls)
}

fn zigzag() -> RaceProblem {
    let mut walls = boxed(30, 16);
    walls.push(edge(8, 0, 8, 10));
    walls.push(edge(18, 6, 18, 16));
    sample("zigzag", Point::new(3, 3), edge(26, 10, 26, 13), walls)
}

const SAMPLE_PROBLEMS: &[SampleProblem] = &[
    SampleProblem {
        label: "open-field",
        description: "No walls; short run west to a three-cell finish line.",
        build: open_field,
    },
    SampleProblem {
        label: "corridor",
        description: "Low stub wall halfway down a narrow corridor.",
        build: corridor,
    },
    SampleProblem {
        label: "pillar",
        description: "Free-standing pillar between the start and the finish.",
        build: pillar,
    },
    SampleProblem {
        label: "hook",
        description: "Finish tucked behind a tall wall hanging from the floor.",
        build: hook,
    },
    SampleProblem {
        label: "zigzag",
        description: "Two staggered baffles; the heuristic grid is at its weakest here.",
        build: zigzag,
    },
];

pub fn problem_labels() -> Vec<&'static str> {
    SAMPLE_PROBLEMS.iter().map(|p| p.label).collect()
}

pub fn describe_problems() -> Vec<(&'static str, &'static str)> {
    SAMPLE_PROBLEMS
        .iter()
        .map(|p| (p.label, p.description))
        .collect()
}

pub fn sample_problem(label: &str) -> Option<RaceProblem> {
    SAMPLE_PROBLEMS
        .iter()
        .find(|p| p.label == label)
        .map(|p| (p.build)())
}

/// Resolves a built-in label first, then falls back to a JSON file path.
pub fn load_problem(source: &str) -> Result<RaceProblem> {
    if let Some(problem) = sample_problem(source) {
        return Ok(problem);
    }
    let path = Path::new(source);
    if !path.exists() {
        let available = problem_labels().join(", ");
        return Err(anyhow!(
            "unknown problem '{source}' (not a file). built-in: {available}"
        ));
    }
    let bytes =
        fs::read(path).with_context(|| format!("failed reading problem {}", path.display()))?;
    RaceProblem::from_json(&bytes).with_context(|| format!("in {}", path.display()))
}

/// Comma-separated problem labels or paths; `None` selects every sample.
pub fn resolve_problems(input: Option<&str>) -> Result<Vec<RaceProblem>> {
    let Some(raw) = input else {
        return Ok(SAMPLE_PROBLEMS.iter().map(|p| (p.build)()).collect());
    };
    let problems = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(load_problem)
        .collect::<Result<Vec<_>>>()?;
    if problems.is_empty() {
        return Err(anyhow!("--problems resolved to empty list"));
    }
    Ok(problems)
}
