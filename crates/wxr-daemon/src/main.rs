//! wxrd - weather collection and reporting daemon
//!
//! This binary coordinates:
//! - Polling the weather provider into the sample store
//! - Sweeping expired one-time codes
//! - Serving the HTTP API

mod jobs;
mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};

use wxr_api::Services;
use wxr_client::{ClientConfig, OpenWeatherClient, ResponseCache, RetryPolicy, WeatherProvider};
use wxr_config::AppConfig;
use wxr_db::Stores;
use wxr_reports::{AggregationEngine, PageConfig, ReportService};

use crate::jobs::{CodeSweeper, WeatherPoller};
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    wxr_obs::init("wxrd", config.log_format()?);

    info!("Starting wxrd");

    let stores = Stores::open(&config.database.url)
        .await
        .context("Failed to open store")?;

    let client_config = ClientConfig::new(config.api_key()?, config.location())?
        .with_base_url(&config.weather.base_url)?
        .with_units(config.weather.units)
        .with_timeout(config.weather.timeout())
        .with_retry(RetryPolicy {
            max_attempts: config.weather.max_attempts,
            ..RetryPolicy::default()
        });
    let cache = Arc::new(ResponseCache::new(config.weather.cache_ttl()));
    let client =
        OpenWeatherClient::new(client_config, cache).context("Failed to build weather client")?;
    let provider: Arc<dyn WeatherProvider> = Arc::new(client);

    let reports = Arc::new(ReportService::new(
        stores.reports.clone(),
        AggregationEngine::new(stores.samples.clone()),
        PageConfig {
            default_size: config.reports.default_page_size,
            max_size: config.reports.max_page_size,
        },
    ));

    let mut poller = Scheduler::new(
        Arc::new(WeatherPoller::new(provider.clone(), stores.samples.clone())),
        config.schedule.poll_interval(),
    );
    let mut sweeper = Scheduler::new(
        Arc::new(CodeSweeper::new(
            stores.codes.clone(),
            config.schedule.one_time_code_ttl(),
        )),
        config.schedule.housekeeping_interval(),
    );
    poller.start();
    sweeper.start();

    let (app, state) = wxr_api::build_app(Services {
        provider,
        samples: stores.samples.clone(),
        reports,
    })?;

    let addr: SocketAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("Invalid HTTP bind address: {}", config.http.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind TCP listener")?;

    // Mark ready just before serving
    wxr_api::set_ready(&state, true);
    info!(%addr, "HTTP server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    wxr_api::set_ready(&state, false);
    poller.stop().await;
    sweeper.stop().await;
    stores.close().await;

    served.context("HTTP server error")?;
    info!("wxrd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
