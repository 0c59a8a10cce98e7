use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::HttpRequest;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::store::StoreError;

pub mod auth;
pub mod content;
pub mod events;
pub mod files;
pub mod gallery;
pub mod maintenance;
pub mod members;
pub mod sections;

/// `?id=` on delete routes.
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i32,
}

// Read-only keys the admin UI sends back with every edit.
const ECHOED_KEYS: &[&str] = &["created_at", "updated_at", "_timestamp"];

/// A PUT body split into the target id and a typed patch. Keys the patch
/// type does not know are rejected.
#[derive(Debug)]
pub struct UpdateRequest<P> {
    id: Option<Value>,
    pub patch: P,
}

impl<P: DeserializeOwned> UpdateRequest<P> {
    pub fn parse(mut body: Map<String, Value>) -> Result<Self, ApiError> {
        let id = body.remove("id").filter(|v| !v.is_null());
        for key in ECHOED_KEYS {
            body.remove(*key);
        }
        let patch = serde_json::from_value(Value::Object(body))
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
        Ok(Self { id, patch })
    }

    /// The row id, given either as a number or a numeric string.
    pub fn require_id(&self) -> Result<i32, ApiError> {
        let parsed = match &self.id {
            Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| ApiError::field("id", "ID is required"))
    }
}

/// Maps a store miss to a 404 naming the resource.
pub fn not_found(what: &'static str) -> impl Fn(StoreError) -> ApiError {
    move |err| match err {
        StoreError::NotFound | StoreError::MissingReference(_) => ApiError::NotFoundError(format!("{} not found", what)),
        other => other.into(),
    }
}

pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid JSON body: {}", err)).into()
}

pub fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid query string: {}", err)).into()
}

pub fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::BadRequest(format!("Invalid path parameter: {}", err)).into()
}
