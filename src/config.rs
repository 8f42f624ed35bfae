use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE_PATH: &str = "data/tasks.db";
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    /// Error bodies carry internal detail everywhere but production.
    pub fn exposes_error_detail(self) -> bool {
        self != Self::Production
    }
}

/// Static bearer credential guarding the task routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub db_connect_retries: u32,
    pub db_retry_delay: Duration,
    pub db_busy_timeout: Duration,
    pub frontend_url: String,
    pub api_token: Option<ApiToken>,
    pub max_body_bytes: usize,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            db_connect_retries: 5,
            db_retry_delay: Duration::from_millis(5000),
            db_busy_timeout: Duration::from_millis(5000),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            api_token: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Unparseable
    /// values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = EnvSource { lookup };
        let defaults = Self::default();

        let environment = env
            .string("APP_ENV")
            .or_else(|| env.string("NODE_ENV"))
            .map(|raw| Environment::parse(&raw))
            .unwrap_or_default();

        let api_token = env.string("API_TOKEN").map(|secret| ApiToken {
            secret,
            expires_at: env
                .string("API_TOKEN_EXPIRES_AT")
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        });

        Self {
            environment,
            host: env.string("HOST").unwrap_or(defaults.host),
            port: env.parsed("PORT").unwrap_or(defaults.port),
            database_path: env
                .string("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            db_connect_retries: env
                .parsed::<u32>("DB_CONNECT_RETRIES")
                .map(|value| value.max(1))
                .unwrap_or(defaults.db_connect_retries),
            db_retry_delay: env
                .parsed("DB_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.db_retry_delay),
            db_busy_timeout: env
                .parsed("DB_BUSY_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.db_busy_timeout),
            frontend_url: env
                .string("FRONTEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.frontend_url),
            api_token,
            max_body_bytes: env
                .parsed::<usize>("MAX_BODY_BYTES")
                .filter(|value| *value > 0)
                .unwrap_or(defaults.max_body_bytes),
            log_dir: env.string("LOG_DIR").map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvSource<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.string(name).and_then(|value| value.parse::<T>().ok())
    }
}
