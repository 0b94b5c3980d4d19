// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting
///
/// Log levels come from `RUST_LOG` when set, else from configuration.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_level = log_level,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize Prometheus metrics exporter
///
/// Registers the metrics the scheduler and protocol paths emit:
/// - keepalive_success_total / keepalive_failed_total
/// - checkin_success_total / checkin_failed_total
/// - auto_checkin_jobs: currently registered per-account jobs
/// - sweep_duration_seconds: wall time of one full sweep
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "keepalive_success_total",
        "Total number of successful keep-alive exchanges"
    );
    describe_counter!(
        "keepalive_failed_total",
        "Total number of failed keep-alive exchanges"
    );
    describe_counter!(
        "checkin_success_total",
        "Total number of successful check-ins"
    );
    describe_counter!("checkin_failed_total", "Total number of failed check-ins");
    describe_gauge!(
        "auto_checkin_jobs",
        "Number of per-account auto check-in jobs currently registered"
    );
    describe_histogram!(
        "sweep_duration_seconds",
        "Duration of one keep-alive sweep over all active accounts"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Record the outcome of one keep-alive exchange
#[inline]
pub fn record_keepalive(owner_id: i64, success: bool) {
    if success {
        counter!("keepalive_success_total", "owner_id" => owner_id.to_string()).increment(1);
    } else {
        counter!("keepalive_failed_total", "owner_id" => owner_id.to_string()).increment(1);
    }
}

/// Record the outcome of one check-in attempt
#[inline]
pub fn record_checkin(owner_id: i64, success: bool) {
    if success {
        counter!("checkin_success_total", "owner_id" => owner_id.to_string()).increment(1);
    } else {
        counter!("checkin_failed_total", "owner_id" => owner_id.to_string()).increment(1);
    }
}

/// Update the gauge of registered auto check-in jobs
#[inline]
pub fn update_auto_checkin_jobs(count: usize) {
    gauge!("auto_checkin_jobs").set(count as f64);
}

/// Record the wall time of one full sweep
#[inline]
pub fn record_sweep_duration(duration_seconds: f64) {
    histogram!("sweep_duration_seconds").record(duration_seconds);
}
