// Keeper binary entry point: session keep-alive and auto check-in daemon

use common::config::Settings;
use common::db::DbPool;
use common::scheduler::{SchedulerConfig, SchedulerEngine};
use common::store::{ConfigStore, PgConfigStore};
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration before logging so the log level is configurable
    let settings = Settings::load()?;

    telemetry::init_logging(&settings.observability.log_level)?;

    info!("Starting seatkeeper");

    settings.validate().map_err(|e| {
        error!(error = %e, "Configuration validation failed");
        e
    })?;
    info!(
        database_url = %settings.database.url,
        remote_base_url = %settings.remote.base_url,
        "Configuration loaded"
    );

    telemetry::init_metrics(settings.observability.metrics_port).map_err(|e| {
        error!(error = %e, "Failed to start metrics exporter");
        e
    })?;
    info!(port = settings.observability.metrics_port, "Metrics exporter listening");

    info!("Initializing database connection pool");
    let db_pool = DbPool::new(&settings.database).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database pool");
        e
    })?;
    info!("Database connection pool initialized");

    db_pool.run_migrations().await.map_err(|e| {
        error!(error = %e, "Failed to run database migrations");
        e
    })?;
    info!("Database migrations applied");

    let store = Arc::new(PgConfigStore::new(db_pool)) as Arc<dyn ConfigStore>;

    let scheduler_config = SchedulerConfig::from_settings(&settings.scheduler).map_err(|e| {
        error!(error = %e, "Invalid scheduler configuration");
        e
    })?;

    let engine = Arc::new(SchedulerEngine::new(
        scheduler_config,
        settings.remote.clone(),
        store,
    ));

    let restored = engine.start().await.map_err(|e| {
        error!(error = %e, "Failed to start scheduler engine");
        e
    })?;
    info!(restored, "Scheduler engine running");

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C signal, initiating graceful shutdown");

    engine.stop().await;

    info!("Seatkeeper stopped");
    Ok(())
}
