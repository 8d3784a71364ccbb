use std::env;
use std::time::Duration;

use racetrack_core::chooser::DEFAULT_SEARCH_DEPTH;
use racetrack_core::ChooserConfig;

pub const DEFAULT_TURN_DEADLINE_MS: u64 = 5_000;
pub const DEFAULT_INIT_DEADLINE_MS: u64 = 5_000;
pub const DEFAULT_MAX_TURNS: u32 = 200;

/// Limits a race is run under. Environment first, CLI flags on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    pub search_depth: u32,
    pub turn_deadline: Duration,
    pub init_deadline: Duration,
    pub max_turns: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            search_depth: DEFAULT_SEARCH_DEPTH,
            turn_deadline: Duration::from_millis(DEFAULT_TURN_DEADLINE_MS),
            init_deadline: Duration::from_millis(DEFAULT_INIT_DEADLINE_MS),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Self {
        Self {
            search_depth: read_env_u32("RACETRACK_SEARCH_DEPTH", DEFAULT_SEARCH_DEPTH),
            turn_deadline: Duration::from_millis(read_env_u64(
                "RACETRACK_TURN_DEADLINE_MS",
                DEFAULT_TURN_DEADLINE_MS,
            )),
            init_deadline: Duration::from_millis(read_env_u64(
                "RACETRACK_INIT_DEADLINE_MS",
                DEFAULT_INIT_DEADLINE_MS,
            )),
            max_turns: read_env_u32("RACETRACK_MAX_TURNS", DEFAULT_MAX_TURNS),
        }
    }

    /// Applies whichever overrides were given on the command line.
    pub fn with_overrides(
        mut self,
        search_depth: Option<u32>,
        turn_deadline_ms: Option<u64>,
        init_deadline_ms: Option<u64>,
        max_turns: Option<u32>,
    ) -> Self {
        if let Some(depth) = search_depth.filter(|depth| *depth > 0) {
            self.search_depth = depth;
        }
        if let Some(ms) = turn_deadline_ms.filter(|ms| *ms > 0) {
            self.turn_deadline = Duration::from_millis(ms);
        }
        if let Some(ms) = init_deadline_ms.filter(|ms| *ms > 0) {
            self.init_deadline = Duration::from_millis(ms);
        }
        if let Some(turns) = max_turns.filter(|turns| *turns > 0) {
            self.max_turns = turns;
        }
        self
    }

    pub fn chooser(&self) -> ChooserConfig {
        ChooserConfig {
            depth: self.search_depth,
        }
    }
}

pub fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub fn read_env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_zero_env_values_fall_back() {
        assert_eq!(read_env_u32("RACETRACK_TEST_UNSET_VARIABLE", 7), 7);
        env::set_var("RACETRACK_TEST_ZERO_VARIABLE", "0");
        assert_eq!(read_env_u64("RACETRACK_TEST_ZERO_VARIABLE", 9), 9);
        env::set_var("RACETRACK_TEST_JUNK_VARIABLE", "soon");
        assert_eq!(read_env_u32("RACETRACK_TEST_JUNK_VARIABLE", 3), 3);
        env::set_var("RACETRACK_TEST_GOOD_VARIABLE", "12");
        assert_eq!(read_env_u32("RACETRACK_TEST_GOOD_VARIABLE", 3), 12);
    }

    #[test]
    fn cli_overrides_win_over_defaults() {
        let config = HarnessConfig::default().with_overrides(Some(2), Some(250), None, Some(0));
        assert_eq!(config.search_depth, 2);
        assert_eq!(config.turn_deadline, Duration::from_millis(250));
        assert_eq!(config.init_deadline, Duration::from_millis(DEFAULT_INIT_DEADLINE_MS));
        assert_eq!(config.max_turns, DEFAULT_MAX_TURNS);
        assert_eq!(config.chooser().depth, 2);
    }

    #[test]
    fn zero_depth_override_is_ignored_like_the_env_var() {
        let config = HarnessConfig::default().with_overrides(Some(0), None, None, None);
        assert_eq!(config.search_depth, HarnessConfig::default().search_depth);
        assert!(config.chooser().depth > 0);
    }
}
