pub mod job;
pub mod run_stats;
