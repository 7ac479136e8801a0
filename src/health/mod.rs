// src/health/mod.rs
mod entry;
mod registry;
mod status;

pub use entry::{run_single, CheckEntry};
pub use registry::{Health, HealthError};
pub use status::{CheckStatus, HealthStatus};
