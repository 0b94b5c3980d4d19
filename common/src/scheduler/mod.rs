// Scheduler module: sweep and auto check-in timers plus the job bodies
// they drive

pub mod engine;
pub mod runner;

pub use engine::{SchedulerConfig, SchedulerEngine};
pub use runner::JobRunner;
