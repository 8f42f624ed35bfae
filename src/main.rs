use anyhow::{anyhow, Context};
use std::sync::Arc;
use task_manager_api_lib::config::AppConfig;
use task_manager_api_lib::db::{Database, IN_MEMORY_PATH};
use task_manager_api_lib::{build_router, init_tracing, AppState};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_tracing(config.environment, config.log_dir.as_deref())
        .map_err(|error| anyhow!("failed to initialize tracing: {error}"))?;

    let db = Arc::new(open_database(&config).await?);
    let addr = config.bind_addr();
    let environment = config.environment;
    let app = build_router(AppState::new(db, config));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, environment = environment.as_str(), "task manager api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    info!("server stopped");
    Ok(())
}

async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let attempts = config.db_connect_retries.max(1);
    let mut attempt = 1;
    loop {
        match Database::open(&config.database_path, config.db_busy_timeout) {
            Ok(db) => {
                let location = db
                    .path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| IN_MEMORY_PATH.to_string());
                info!(path = %location, attempt, "database opened");
                return Ok(db);
            }
            Err(err) if attempt < attempts => {
                warn!(
                    error = %err,
                    attempt,
                    attempts,
                    retry_in_ms = config.db_retry_delay.as_millis() as u64,
                    "database open failed; retrying"
                );
                tokio::time::sleep(config.db_retry_delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(error = %err, attempts, "database open failed; giving up");
                return Err(anyhow!(err)).context("failed to open task database");
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down gracefully"),
        _ = terminate => info!("received SIGTERM, shutting down gracefully"),
    }
}
