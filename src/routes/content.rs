use actix_web::{delete, get, post, put, route, web, HttpResponse};
use log::info;
use serde_json::{json, Map, Value};

use crate::errors::{ApiError, FieldErrors};
use crate::fallback::or_empty;
use crate::middleware::AdminSession;
use crate::models::{BenefitPatch, NewBenefit, NewContactMessage, SocialLinkInput, SocialLinkPatch};
use crate::routes::{not_found, IdQuery, UpdateRequest};
use crate::store::{ContentStore, InboxStore, StoreError};

// ----- benefits -----

#[get("/cms/benefits")]
pub async fn list_benefits(store: web::Data<dyn ContentStore>) -> HttpResponse {
    let rows = or_empty("benefits", store.list_benefits().await);
    HttpResponse::Ok().json(json!({ "data": rows }))
}

#[post("/cms/benefits")]
pub async fn create_benefit(
    admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    body: web::Json<NewBenefit>,
) -> Result<HttpResponse, ApiError> {
    let benefit = body.into_inner();
    benefit.validate()?;
    let created = store.insert_benefit(benefit).await?;
    info!("Admin {} created benefit {}", admin.admin_id, created.id);
    Ok(HttpResponse::Created().json(json!({ "data": created })))
}

#[put("/cms/benefits")]
pub async fn update_benefit(
    _admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let request = UpdateRequest::<BenefitPatch>::parse(body.into_inner())?;
    let id = request.require_id()?;
    if request.patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::field("title", "Title cannot be empty"));
    }
    let updated = store.update_benefit(id, request.patch).await.map_err(not_found("Benefit"))?;
    Ok(HttpResponse::Ok().json(json!({ "data": updated })))
}

#[delete("/cms/benefits")]
pub async fn delete_benefit(
    admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    store.delete_benefit(query.id).await.map_err(not_found("Benefit"))?;
    info!("Admin {} deleted benefit {}", admin.admin_id, query.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// ----- social media -----

#[get("/cms/social-media")]
pub async fn list_social(store: web::Data<dyn ContentStore>) -> HttpResponse {
    let rows = or_empty("social media links", store.list_social_links().await);
    HttpResponse::Ok().json(json!({ "data": rows }))
}

/// With an `id` the body edits that row; otherwise it creates or replaces the
/// link for `platform`.
#[route("/cms/social-media", method = "PUT", method = "POST")]
pub async fn upsert_social(
    _admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    if body.get("id").is_some_and(|id| !id.is_null()) {
        let mut request = UpdateRequest::<SocialLinkPatch>::parse(body)?;
        let id = request.require_id()?;
        request.patch.normalize()?;
        let updated = store.update_social_link(id, request.patch).await.map_err(social_error)?;
        return Ok(HttpResponse::Ok().json(json!({ "data": updated })));
    }

    let input: SocialLinkInput = serde_json::from_value(Value::Object(body))
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
    let saved = store.upsert_social_link(input.into_new()?).await?;
    Ok(HttpResponse::Ok().json(json!({ "data": saved })))
}

fn social_error(err: StoreError) -> ApiError {
    if err.violates("platform") {
        return ApiError::ConflictError(FieldErrors::single("platform", "A link for this platform already exists"));
    }
    not_found("Social media link")(err)
}

#[delete("/cms/social-media")]
pub async fn delete_social(
    _admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    store.delete_social_link(query.id).await.map_err(not_found("Social media link"))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

// ----- contact form -----

#[post("/contact")]
pub async fn submit_contact(
    inbox: web::Data<dyn InboxStore>,
    body: web::Json<NewContactMessage>,
) -> Result<HttpResponse, ApiError> {
    let mut message = body.into_inner();
    message.validate()?;
    let saved = inbox.insert_contact_message(message).await?;
    info!("Contact message {} received", saved.id);
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Message submitted successfully! We'll get back to you soon.",
        "data": saved,
    })))
}

#[get("/contact")]
pub async fn list_contact(_admin: AdminSession, inbox: web::Data<dyn InboxStore>) -> Result<HttpResponse, ApiError> {
    let rows = inbox.list_contact_messages().await?;
    Ok(HttpResponse::Ok().json(json!({ "data": rows })))
}
