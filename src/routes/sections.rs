use actix_web::http::header;
use actix_web::{web, HttpResponse, HttpResponseBuilder, Resource};
use log::info;
use serde_json::{Map, Value};

use crate::errors::ApiError;
use crate::fallback::WithDefaultFallback;
use crate::middleware::AdminSession;
use crate::routes::UpdateRequest;
use crate::sections::Section;
use crate::store::SectionStore;

fn respond<T: Section>(mut builder: HttpResponseBuilder, body: Value) -> HttpResponse {
    if T::NO_STORE {
        builder
            .insert_header((header::CACHE_CONTROL, "no-cache, no-store, must-revalidate, max-age=0"))
            .insert_header((header::PRAGMA, "no-cache"))
            .insert_header((header::EXPIRES, "0"));
    }
    builder.json(body)
}

/// Public read: the stored row or the section's defaults, always 200.
pub async fn show<T: Section>(store: web::Data<dyn SectionStore<T>>) -> HttpResponse {
    let body = WithDefaultFallback::for_section::<T>().resolve(store.fetch().await);
    respond::<T>(HttpResponse::Ok(), body)
}

pub async fn update<T: Section>(
    admin: AdminSession,
    store: web::Data<dyn SectionStore<T>>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let UpdateRequest { patch, .. } = UpdateRequest::<T::Patch>::parse(body.into_inner())?;
    T::validate(&patch)?;

    let row = store.upsert(patch).await?;
    info!("Admin {} updated the {} section", admin.admin_id, T::NAME);

    let body = serde_json::to_value(row).map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(respond::<T>(HttpResponse::Ok(), body))
}

/// `GET` and `PUT /cms/<name>` for one section.
pub fn resource<T: Section>() -> Resource {
    web::resource(format!("/cms/{}", T::NAME))
        .route(web::get().to(show::<T>))
        .route(web::put().to(update::<T>))
}
