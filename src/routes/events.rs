use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use log::info;
use serde_json::{json, Map, Value};

use crate::errors::ApiError;
use crate::fallback::or_empty;
use crate::middleware::AdminSession;
use crate::models::{EventPatch, NewEvent, NewEventRegistration};
use crate::routes::{not_found, IdQuery, UpdateRequest};
use crate::store::EventStore;
use crate::uploads::{ImagePolicy, MultipartForm, UploadDir};

async fn event_list(store: &dyn EventStore) -> HttpResponse {
    let rows = or_empty("events", store.list_events().await);
    HttpResponse::Ok().json(json!({ "data": rows }))
}

#[get("/events")]
pub async fn public_list(store: web::Data<dyn EventStore>) -> HttpResponse {
    event_list(store.get_ref()).await
}

#[get("/cms/events")]
pub async fn list(store: web::Data<dyn EventStore>) -> HttpResponse {
    event_list(store.get_ref()).await
}

#[get("/cms/events/{id}")]
pub async fn detail(store: web::Data<dyn EventStore>, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let event = store
        .find_event(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFoundError("Event not found".to_string()))?;
    Ok(HttpResponse::Ok().json(json!({ "data": event })))
}

#[post("/cms/events")]
pub async fn create(
    admin: AdminSession,
    store: web::Data<dyn EventStore>,
    body: web::Json<NewEvent>,
) -> Result<HttpResponse, ApiError> {
    let event = body.into_inner();
    event.validate()?;
    let created = store.insert_event(event).await?;
    info!("Admin {} created event {}", admin.admin_id, created.id);
    Ok(HttpResponse::Created().json(json!({ "data": created })))
}

#[put("/cms/events")]
pub async fn update(
    _admin: AdminSession,
    store: web::Data<dyn EventStore>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let request = UpdateRequest::<EventPatch>::parse(body.into_inner())?;
    let id = request.require_id()?;
    request.patch.validate()?;
    let updated = store.update_event(id, request.patch).await.map_err(not_found("Event"))?;
    Ok(HttpResponse::Ok().json(json!({ "data": updated })))
}

/// Registrations for the event go with it.
#[delete("/cms/events")]
pub async fn remove(
    admin: AdminSession,
    store: web::Data<dyn EventStore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    store.delete_event(query.id).await.map_err(not_found("Event"))?;
    info!("Admin {} deleted event {}", admin.admin_id, query.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Stores an event image; with `eventId` it also becomes that event's header.
#[post("/cms/events/upload")]
pub async fn upload(
    admin: AdminSession,
    req: HttpRequest,
    payload: web::Payload,
    store: web::Data<dyn EventStore>,
    uploads: web::Data<UploadDir>,
) -> Result<HttpResponse, ApiError> {
    let form = MultipartForm::read(&req, payload).await?;
    let event_id = form
        .text("eventId")
        .map(|raw| raw.parse::<i32>().map_err(|_| ApiError::field("eventId", "Invalid event ID")))
        .transpose()?;
    let file = ImagePolicy::Artwork.check(form.file("file"))?;

    let stored = uploads.save(Some("events"), &file.file_name, &file.bytes).await?;

    if let Some(id) = event_id {
        if let Err(err) = store.update_event(id, EventPatch::header_image(stored.url.clone())).await {
            uploads.discard(&stored).await;
            return Err(not_found("Event")(err));
        }
        info!("Admin {} set the header image of event {}", admin.admin_id, id);
    }

    Ok(HttpResponse::Created().json(json!({ "url": stored.url })))
}

#[post("/cms/events/register")]
pub async fn register(
    store: web::Data<dyn EventStore>,
    body: web::Json<NewEventRegistration>,
) -> Result<HttpResponse, ApiError> {
    let mut registration = body.into_inner();
    registration.validate()?;
    let saved = store.insert_registration(registration).await.map_err(not_found("Event"))?;
    info!("Registration {} received for event {}", saved.id, saved.event_id);
    Ok(HttpResponse::Created().json(json!({ "success": true, "data": saved })))
}

#[get("/cms/events/registrations")]
pub async fn registrations(_admin: AdminSession, store: web::Data<dyn EventStore>) -> Result<HttpResponse, ApiError> {
    let rows = store.list_registrations().await?;
    Ok(HttpResponse::Ok().json(json!({ "data": rows })))
}
