// Common library for the seatkeeper daemon and its tests

pub mod config;
pub mod credential;
pub mod db;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod telemetry;
