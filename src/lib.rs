pub mod app;
pub mod config;
pub mod errors;
pub mod fallback;
pub mod logger;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod routes;
pub mod schema;
pub mod sections;
pub mod services;
pub mod store;
pub mod uploads;
pub mod validation;

// Re-export common types
pub use crate::app::AppState;
pub use crate::config::{AppConfig, DbPool};
pub use crate::errors::ApiError;
pub use crate::store::{MemoryStore, PgStore, Store};
