// src/lib.rs
pub mod config;
pub mod health;
pub mod metrics;
pub mod probe;
pub mod server;

pub use health::{Health, HealthError, HealthStatus};
pub use probe::{HttpProbe, Probe, ProbeError};
pub use server::StatusHandler;
