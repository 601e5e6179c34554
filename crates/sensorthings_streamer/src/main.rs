mod config;
mod transports;

use common::counters::{run_counter_reporter, LivenessCounters};
use common::credentials::FileCredentialSource;
use common::telemetry::init_telemetry;
use crate::config::ServiceConfig;
use connection_orchestrator::{ConnectionDependencies, ConnectionSupervisor};
use frost_client::FrostClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry = match config.telemetry() {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("Invalid telemetry configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_telemetry(&telemetry) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        applications = config.applications.len(),
        frost_endpoint = %config.frost_endpoint,
        "Starting sensorthings-streamer"
    );
    debug!("Configuration: {:?}", config);

    if let Err(e) = run(config).await {
        error!(critical = true, error = %e, "sensorthings-streamer failed");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let frost = Arc::new(FrostClient::new(config.frost()?)?);
    let counters = Arc::new(LivenessCounters::new());
    let dependencies = ConnectionDependencies {
        credentials: Arc::new(FileCredentialSource::new(&config.credentials_dir)),
        resolver: frost.clone(),
        uploader: frost,
        counters: counters.clone(),
    };

    let mut supervisor = ConnectionSupervisor::build(
        &config.applications,
        &transports::transport_factory(),
        &dependencies,
        config.stop_timeout(),
    )?;
    if supervisor.is_empty() {
        warn!("no applications configured");
    }

    let shutdown_token = CancellationToken::new();
    let reporter = tokio::spawn(run_counter_reporter(
        counters,
        config.counter_report_interval(),
        shutdown_token.clone(),
    ));

    supervisor.start_all();

    tokio::select! {
        _ = shutdown_signal() => info!("Received shutdown signal"),
        _ = supervisor.all_stopped() => warn!("all connections have stopped"),
    }

    for (identity, outcome) in supervisor.shutdown().await {
        info!(connection = %identity, outcome = %outcome, "connection shut down");
    }

    shutdown_token.cancel();
    if let Err(e) = reporter.await {
        error!("counter reporter panicked: {:?}", e);
    }

    info!("sensorthings-streamer stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error setting up signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Error setting up SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
