pub mod benchmark;
pub mod config;
pub mod drivers;
pub mod harness;
pub mod opponents;
pub mod problem;
pub mod runner;
pub mod store;
pub mod util;
