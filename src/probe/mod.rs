// src/probe/mod.rs
mod http;

pub use http::HttpProbe;

use async_trait::async_trait;

/// A unit of work that reports whether some dependency is usable right now.
///
/// Probes run on the scheduling task with the registry unlocked, so they may
/// block on I/O for as long as they need. Anything they share with other
/// code must be synchronised by the probe itself.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn evaluate(&self) -> Result<(), ProbeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    Transport(reqwest::Error),

    #[error("reading response body: {0}")]
    Body(reqwest::Error),

    #[error("HTTP status code {0} returned")]
    Status(u16),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProbeError {
    /// Convenience for probes that only have a description to report.
    pub fn msg(description: impl std::fmt::Display) -> Self {
        ProbeError::Other(anyhow::anyhow!("{}", description))
    }
}
