//! The two background jobs: weather polling and one-time code expiry

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wxr_client::WeatherProvider;
use wxr_core::{CodeStore, SampleStore};

use crate::scheduler::PeriodicJob;

/// Fetches current conditions and appends them to the sample store
pub struct WeatherPoller {
    provider: Arc<dyn WeatherProvider>,
    samples: Arc<dyn SampleStore>,
}

impl WeatherPoller {
    pub fn new(provider: Arc<dyn WeatherProvider>, samples: Arc<dyn SampleStore>) -> Self {
        Self { provider, samples }
    }
}

#[async_trait::async_trait]
impl PeriodicJob for WeatherPoller {
    fn name(&self) -> &str {
        "weather-poller"
    }

    async fn run_once(&self) -> Result<()> {
        let sample = self
            .provider
            .current_weather()
            .await
            .with_context(|| format!("fetching current weather from {}", self.provider.name()))?;

        self.samples
            .insert_sample(&sample)
            .await
            .context("storing weather sample")?;

        info!(
            observed_at = %sample.timestamp,
            temperature = sample.temperature,
            "Weather sample stored"
        );
        Ok(())
    }
}

/// Deletes one-time codes older than the configured TTL
pub struct CodeSweeper {
    codes: Arc<dyn CodeStore>,
    ttl: Duration,
}

impl CodeSweeper {
    pub fn new(codes: Arc<dyn CodeStore>, ttl: Duration) -> Self {
        Self { codes, ttl }
    }
}

#[async_trait::async_trait]
impl PeriodicJob for CodeSweeper {
    fn name(&self) -> &str {
        "code-sweeper"
    }

    async fn run_once(&self) -> Result<()> {
        let cutoff = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
            .with_context(|| format!("code TTL of {:?} is out of range", self.ttl))?;

        let deleted = self
            .codes
            .delete_codes_created_before(cutoff)
            .await
            .context("deleting expired one-time codes")?;

        if deleted > 0 {
            info!(deleted, %cutoff, "Expired one-time codes removed");
        } else {
            debug!(%cutoff, "No expired one-time codes");
        }
        Ok(())
    }
}
