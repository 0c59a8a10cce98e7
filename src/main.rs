use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use log::{error, info, warn};

use clubsite::config::{create_pool, StorageBackend};
use clubsite::logger::setup_logger;
use clubsite::middleware::RequestLogger;
use clubsite::migrations::SCHEMA_SQL;
use clubsite::store::SchemaStore;
use clubsite::{AppConfig, AppState, MemoryStore, PgStore};

fn startup_error(message: String) -> io::Error {
    error!("{}", message);
    io::Error::new(io::ErrorKind::Other, message)
}

async fn build_state(config: &AppConfig) -> io::Result<AppState> {
    match config.storage {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| startup_error("DATABASE_URL must be set".to_string()))?;

            info!("Connecting to database (pool size {})", config.pool_size);
            let pool = create_pool(database_url, config)
                .map_err(|e| startup_error(format!("Failed to create database connection pool: {}", e)))?;
            let store = Arc::new(PgStore::new(pool));

            if config.auto_migrate {
                store
                    .apply_schema(SCHEMA_SQL.to_string())
                    .await
                    .map_err(|e| startup_error(format!("Failed to apply database schema: {}", e)))?;
                info!("Database initialization complete.");
            }

            Ok(AppState::new(store, config.clone()))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on restart");
            Ok(AppState::new(Arc::new(MemoryStore::new()), config.clone()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables and initialize logger
    dotenvy::dotenv().ok();
    setup_logger();

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        return Err(startup_error(format!("Invalid configuration: {}", e)));
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    info!("Serving uploads from {}", config.upload_dir.display());

    let state = build_state(&config).await?;
    let (host, port, workers) = (config.host.clone(), config.port, config.workers);

    info!("Starting HTTP server at http://{}:{}", host, port);

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(RequestLogger)
            .configure(move |cfg| state.configure(cfg))
    })
    .workers(workers)
    .keep_alive(Duration::from_secs(75))
    .shutdown_timeout(30)
    .bind((host, port))?
    .run()
    .await
}
