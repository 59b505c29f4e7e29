use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use vigil_core::LivenessEngine;

mod config;
mod dbus_interface;
mod reaper;

use config::Config;
use dbus_interface::VigilService;

const BUS_NAME: &str = "org.freedesktop.Vigil1";
const OBJECT_PATH: &str = "/org/freedesktop/Vigil1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("vigild starting");

    let config = Config::from_env().context("failed to load configuration")?;
    let engine = Arc::new(
        LivenessEngine::new(config.engine.clone()).context("failed to build liveness engine")?,
    );
    tracing::info!(
        config_file = ?config.config_path,
        default_challenge = %config.engine.default_challenge,
        time_limit_secs = config.engine.time_limit_secs,
        session_timeout_secs = config.engine.session_timeout_secs,
        "engine configured"
    );

    let reaper = reaper::spawn_reaper(
        Arc::clone(&engine),
        Duration::from_secs(config.reaper_interval_secs),
    );

    let builder = if config.session_bus {
        tracing::warn!("running on the session bus (development mode)");
        zbus::connection::Builder::session()?
    } else {
        zbus::connection::Builder::system()?
    };
    let service = VigilService::new(Arc::clone(&engine), config);
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus_name = BUS_NAME, "vigild ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("vigild shutting down");

    reaper.abort();
    engine.clear();

    Ok(())
}
