mod app;
mod backend;

use anyhow::Result;
use std::fs::{self, OpenOptions};

use patlimer_core::{
    config::{self, AppConfig},
    session::SessionStore,
};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::backend::Backend;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::info!(backend = ?config.backend, data_dir = %config.data_dir.display(), "configuration loaded");

    let backend = Backend::from_config(&config)?;
    let label = backend.label();
    let session = SessionStore::new(backend).with_race_name(&config.race_name);

    let mut app = app::PatLimerApp::new(session, label);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("patlimer.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
