use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::migrations::{EXPECTED_TABLES, SCHEMA_SQL};
use crate::store::SchemaStore;

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MigrateQuery {
    pub secret: Option<String>,
}

/// Applies the bundled schema. Guarded by `MIGRATION_SECRET`, not by a session.
#[get("/migrate")]
pub async fn migrate(
    config: web::Data<AppConfig>,
    schema: web::Data<dyn SchemaStore>,
    query: web::Query<MigrateQuery>,
) -> Result<HttpResponse, ApiError> {
    let Some(expected) = config.migration_secret.as_deref() else {
        error!("Migration requested but MIGRATION_SECRET is not configured");
        return Err(ApiError::InternalError("migration secret not configured".to_string()));
    };
    if query.secret.as_deref() != Some(expected) {
        warn!("Migration requested with a wrong secret");
        return Err(ApiError::unauthorized());
    }

    schema.apply_schema(SCHEMA_SQL.to_string()).await?;
    let missing = schema.missing_tables(EXPECTED_TABLES).await?;
    if !missing.is_empty() {
        return Err(ApiError::DatabaseError(format!("tables still missing after migration: {}", missing.join(", "))));
    }

    info!("Schema migration completed");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Migration completed successfully",
        "tables": EXPECTED_TABLES,
    })))
}
