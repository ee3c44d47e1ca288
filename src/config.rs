use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::graph::{RetryPolicy, StorePolicy};

/// Tuning file (`--config`). Missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub graph_limit: usize,
    pub incremental_limit: usize,
    pub stale_after_secs: u64,
    pub gc_after_secs: u64,
    pub metrics_stale_after_secs: u64,
    pub metrics_poll_secs: u64,
    pub fetch_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub metrics_retries: u32,
    pub metrics_retry_delay_ms: u64,
    pub notification_secs: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            graph_limit: crate::graph::DEFAULT_GRAPH_LIMIT,
            incremental_limit: 200,
            stale_after_secs: 5 * 60,
            gc_after_secs: 10 * 60,
            metrics_stale_after_secs: 30,
            metrics_poll_secs: 60,
            fetch_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            metrics_retries: 2,
            metrics_retry_delay_ms: 1_000,
            notification_secs: 4,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            incremental_limit: self.incremental_limit.max(1),
            stale_after: Duration::from_secs(self.stale_after_secs),
            gc_after: Duration::from_secs(self.gc_after_secs),
            metrics_stale_after: Duration::from_secs(self.metrics_stale_after_secs),
            metrics_poll_interval: Duration::from_secs(self.metrics_poll_secs),
            fetch_retry: RetryPolicy::exponential(
                self.fetch_retries,
                Duration::from_millis(self.retry_base_delay_ms),
                Duration::from_millis(self.retry_max_delay_ms),
            ),
            metrics_retry: RetryPolicy::fixed(
                self.metrics_retries,
                Duration::from_millis(self.metrics_retry_delay_ms),
            ),
        }
    }

    pub fn notification_lifetime(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }
}
