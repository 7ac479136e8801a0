// src/probe/http.rs
use super::{Probe, ProbeError};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Polls a URL and treats any 2xx or 3xx response as healthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: Url,
    client: Client,
}

impl HttpProbe {
    pub fn new(url: Url, client: Client) -> Self {
        Self { url, client }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn evaluate(&self) -> Result<(), ProbeError> {
        let mut response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(ProbeError::Transport)?;

        let status = response.status().as_u16();

        // Drain the body chunk by chunk so the connection can go back to the pool.
        let mut drained = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(ProbeError::Body)? {
            drained += chunk.len();
        }
        debug!(url = %self.url, status, bytes = drained, "http probe answered");

        if (200..400).contains(&status) {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}
