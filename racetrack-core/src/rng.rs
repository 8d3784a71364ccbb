use serde::{Deserialize, Serialize};

/// Xorshift32 generator; deterministic per seed so races can be replayed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0xDEAD_BEEF } else { seed },
        }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        self.state
    }

    /// Uniform integer in `min..=max`.
    pub fn next_inclusive(&mut self, min: i32, max: i32) -> i32 {
        debug_assert!(max >= min);
        let span = (max - min + 1) as u32;
        min + (self.next() % span) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_seed_is_remapped() {
        assert_eq!(SeededRng::new(0).state(), 0xDEAD_BEEF);
    }

    #[test]
    fn inclusive_range_stays_in_bounds() {
        let mut rng = SeededRng::new(0x1234_5678);
        for _ in 0..1_000 {
            let value = rng.next_inclusive(-1, 1);
            assert!((-1..=1).contains(&value));
        }
    }
}
