//! Cloud Update service entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cloud_update::config::{Config, LogLevel};
use cloud_update::executor::SystemActionExecutor;
use cloud_update::jobs::JobStore;
use cloud_update::logging;
use cloud_update::ratelimit::{RateLimitConfig, RateLimiter};
use cloud_update::server::{AppState, build_router, spawn_background_tasks};
use cloud_update::system::HostSystem;
use cloud_update::webhooks::Authenticator;
use cloud_update::worker::{PoolConfig, WorkerPool};

/// How long in-flight jobs get to finish once shutdown starts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "cloud-update")]
#[command(about = "Authenticated webhook receiver for host maintenance actions", version)]
struct Cli {
    /// Port to listen on (overrides CLOUD_UPDATE_PORT)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Log level: debug, info, warn, error (overrides CLOUD_UPDATE_LOG_LEVEL)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Also write logs to this file, rotated daily (overrides CLOUD_UPDATE_LOG_FILE)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file;
    }

    let _logging_guard = logging::init_logging(config.log_level, config.log_file.as_deref())
        .context("failed to initialize logging")?;
    logging::install_panic_hook();

    info!(?config, "Starting cloud-update");

    let authenticator =
        Authenticator::new(config.secret.as_bytes()).context("invalid webhook secret")?;
    let pool = Arc::new(WorkerPool::new(PoolConfig::new(
        config.workers,
        config.max_backlog,
    )));
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(
        config.rate_limit_rps,
        config.rate_limit_burst,
    )));
    let app_state = AppState::new(
        authenticator,
        Arc::new(JobStore::new()),
        Arc::clone(&pool),
        Arc::new(SystemActionExecutor::new(HostSystem::new())),
        limiter,
        config.trust_proxy_headers,
    );

    let shutdown = CancellationToken::new();
    let background = spawn_background_tasks(&app_state, &shutdown);

    let app = build_router(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    let serve_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await;

    // The server may also stop on its own (I/O error); stop everything else.
    shutdown.cancel();
    for handle in background {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }

    info!("Waiting for in-flight jobs");
    if let Err(e) = pool.shutdown(SHUTDOWN_TIMEOUT).await {
        error!(error = %e, "Worker pool did not drain cleanly");
    }

    serve_result.context("server error")?;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, cancelling `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
