use std::collections::BTreeMap;
use std::fmt;

use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use log::{debug, error, warn};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Field name to human readable message, serialized as `{"errors": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Records `message` for `field` when the value is missing or blank.
    pub fn require(&mut self, field: &str, value: Option<&str>, message: &str) {
        if value.map_or(true, |v| v.trim().is_empty()) {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Authentication error: {0}")]
    AuthError(String),
    #[error("Forbidden: {0}")]
    ForbiddenError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Conflict: {0}")]
    ConflictError(FieldErrors),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        ApiError::AuthError("Unauthorized".to_string())
    }

    pub fn field(field: &str, message: &str) -> Self {
        ApiError::ValidationError(FieldErrors::single(field, message))
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFoundError("Record not found".to_string()),
            StoreError::MissingReference(detail) => ApiError::NotFoundError(detail),
            StoreError::UniqueViolation { .. } => {
                ApiError::ConflictError(FieldErrors::single("submit", "This data is already registered"))
            }
            StoreError::InvalidState(detail) => ApiError::ConflictError(FieldErrors::single("status", detail)),
            StoreError::Pool(detail) | StoreError::Backend(detail) => ApiError::DatabaseError(detail),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            ApiError::DatabaseError(msg) => {
                error!("\x1B[1;31mDATABASE ERROR:\x1B[0m {}", msg);
                HttpResponse::build(status).json(json!({ "error": "Internal server error" }))
            }
            ApiError::InternalError(msg) => {
                error!("\x1B[1;31mINTERNAL SERVER ERROR:\x1B[0m {}", msg);
                HttpResponse::build(status).json(json!({ "error": "Internal server error" }))
            }
            ApiError::ValidationError(errors) => {
                warn!("\x1B[1;33mVALIDATION ERROR:\x1B[0m {}", errors);
                HttpResponse::build(status).json(json!({ "errors": errors }))
            }
            ApiError::ConflictError(errors) => {
                warn!("\x1B[1;33mCONFLICT:\x1B[0m {}", errors);
                HttpResponse::build(status).json(json!({ "errors": errors }))
            }
            ApiError::BadRequest(msg) => {
                warn!("\x1B[1;33mBAD REQUEST:\x1B[0m {}", msg);
                HttpResponse::build(status).json(json!({ "error": msg }))
            }
            ApiError::AuthError(msg) | ApiError::ForbiddenError(msg) => {
                warn!("\x1B[1;33mAUTHENTICATION ERROR:\x1B[0m {}", msg);
                HttpResponse::build(status).json(json!({ "error": msg }))
            }
            ApiError::NotFoundError(msg) => {
                debug!("\x1B[1;36mNOT FOUND ERROR:\x1B[0m {}", msg);
                HttpResponse::build(status).json(json!({ "error": msg }))
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::AuthError(_) => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenError(_) => StatusCode::FORBIDDEN,
            ApiError::NotFoundError(_) => StatusCode::NOT_FOUND,
            ApiError::ConflictError(_) => StatusCode::CONFLICT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn internal_errors_hide_their_detail() {
        let err = ApiError::DatabaseError("relation \"members\" does not exist".into());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Internal server error" }));
    }

    #[actix_web::test]
    async fn field_errors_render_under_errors_key() {
        let mut errors = FieldErrors::new();
        errors.require("email", Some("  "), "Email is required");
        errors.require("phone_number", Some("0812"), "Phone is required");
        let resp = ApiError::ValidationError(errors).error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "errors": { "email": "Email is required" } }));
    }

    #[test]
    fn store_errors_map_to_http_statuses() {
        assert_eq!(ApiError::from(StoreError::NotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::InvalidState("already approved".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Backend("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
