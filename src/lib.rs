pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod models;
pub mod service;
pub mod validation;

use crate::config::{AppConfig, Environment};
use crate::db::Database;
use crate::service::TaskService;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing_appender::non_blocking::WorkerGuard;

pub use crate::http::build_router;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tasks: TaskService,
    pub config: Arc<AppConfig>,
    started_at: Instant,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: AppConfig) -> Self {
        Self {
            tasks: TaskService::new(db.clone()),
            db,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Installs the global subscriber. File output is used when `log_dir` is
/// set; the writer guard lives for the rest of the process.
pub fn init_tracing(environment: Environment, log_dir: Option<&Path>) -> Result<(), String> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "task-manager-api.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        return tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_writer(non_blocking)
            .try_init()
            .map_err(|error| error.to_string());
    }

    match environment {
        Environment::Production => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .try_init()
            .map_err(|error| error.to_string()),
        Environment::Development | Environment::Test => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .try_init()
            .map_err(|error| error.to_string()),
    }
}
