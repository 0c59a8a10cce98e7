use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use log::{debug, warn};

// Type aliases
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown STORAGE_BACKEND '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub pool_size: u32,
    pub pool_timeout: Duration,
    pub statement_timeout_ms: u64,
    pub auto_migrate: bool,
    pub upload_dir: PathBuf,
    pub migration_secret: Option<String>,
    pub session_ttl_days: i64,
    pub secure_cookies: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 2,
            storage: StorageBackend::Postgres,
            database_url: None,
            pool_size: 10,
            pool_timeout: Duration::from_secs(30),
            statement_timeout_ms: 15_000,
            auto_migrate: true,
            upload_dir: PathBuf::from("public/uploads"),
            migration_secret: None,
            session_ttl_days: 7,
            secure_cookies: false,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring unparsable value for {}: '{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let storage = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}; falling back to postgres", e);
                StorageBackend::Postgres
            }),
            Err(_) => StorageBackend::Postgres,
        };

        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let migration_secret = non_empty_var("MIGRATION_SECRET");
        if migration_secret.is_none() {
            debug!("MIGRATION_SECRET not set, the migration endpoint will refuse to run");
        }

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            workers: env_parse("WORKERS", defaults.workers),
            storage,
            database_url: non_empty_var("DATABASE_URL"),
            pool_size: env_parse("DB_POOL_SIZE", defaults.pool_size),
            pool_timeout: Duration::from_secs(env_parse("DB_POOL_TIMEOUT_SECS", 30)),
            statement_timeout_ms: env_parse("DB_STATEMENT_TIMEOUT_MS", defaults.statement_timeout_ms),
            auto_migrate: env_flag("AUTO_MIGRATE").unwrap_or(defaults.auto_migrate),
            upload_dir: non_empty_var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            migration_secret,
            session_ttl_days: env_parse("SESSION_TTL_DAYS", defaults.session_ttl_days),
            secure_cookies: env_flag("COOKIE_SECURE").unwrap_or(production),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage == StorageBackend::Postgres && self.database_url.is_none() {
            return Err("DATABASE_URL must be set when STORAGE_BACKEND is postgres".to_string());
        }

        if self.session_ttl_days <= 0 {
            return Err("SESSION_TTL_DAYS must be positive".to_string());
        }

        if self.pool_size == 0 {
            return Err("DB_POOL_SIZE must be at least 1".to_string());
        }

        if self.workers == 0 {
            return Err("WORKERS must be at least 1".to_string());
        }

        if !self.secure_cookies {
            warn!("Session cookies are issued without the Secure flag");
        }

        Ok(())
    }
}

/// Applies `statement_timeout` to every connection handed out by the pool.
#[derive(Debug, Clone, Copy)]
struct StatementTimeout(u64);

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!("SET statement_timeout = {}", self.0))
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn create_pool(database_url: &str, config: &AppConfig) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let mut builder = r2d2::Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(config.pool_timeout);

    if config.statement_timeout_ms > 0 {
        builder = builder.connection_customizer(Box::new(StatementTimeout(config.statement_timeout_ms)));
    }

    builder.build(manager)
}
