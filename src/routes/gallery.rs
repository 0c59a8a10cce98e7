use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::ApiError;
use crate::fallback::or_empty;
use crate::middleware::AdminSession;
use crate::models::{GalleryPatch, NewGalleryItem};
use crate::routes::{not_found, IdQuery, UpdateRequest};
use crate::store::ContentStore;
use crate::uploads::{FileState, ImagePolicy, MultipartForm, UploadDir};

#[get("/cms/gallery")]
pub async fn list(store: web::Data<dyn ContentStore>) -> HttpResponse {
    let rows = or_empty("gallery", store.list_gallery().await);
    HttpResponse::Ok().json(json!({ "data": rows }))
}

/// Adds an item pointing at an image that is already hosted somewhere.
#[post("/cms/gallery")]
pub async fn create(
    _admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    body: web::Json<NewGalleryItem>,
) -> Result<HttpResponse, ApiError> {
    let mut item = body.into_inner();
    item.validate()?;
    let created = store.insert_gallery_item(item).await?;
    Ok(HttpResponse::Created().json(json!({ "data": created })))
}

#[put("/cms/gallery")]
pub async fn update(
    _admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    body: web::Json<Map<String, Value>>,
) -> Result<HttpResponse, ApiError> {
    let request = UpdateRequest::<GalleryPatch>::parse(body.into_inner())?;
    let id = request.require_id()?;
    if request.patch.image_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
        return Err(ApiError::field("image_url", "Image URL cannot be empty"));
    }
    let updated = store
        .update_gallery_item(id, request.patch)
        .await
        .map_err(not_found("Gallery item"))?;
    Ok(HttpResponse::Ok().json(json!({ "data": updated })))
}

/// Removes the row only; the image file stays on disk.
#[delete("/cms/gallery")]
pub async fn remove(
    admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    query: web::Query<IdQuery>,
) -> Result<HttpResponse, ApiError> {
    store.delete_gallery_item(query.id).await.map_err(not_found("Gallery item"))?;
    info!("Admin {} deleted gallery item {}", admin.admin_id, query.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/cms/gallery/upload")]
pub async fn upload(
    admin: AdminSession,
    req: HttpRequest,
    payload: web::Payload,
    store: web::Data<dyn ContentStore>,
    uploads: web::Data<UploadDir>,
) -> Result<HttpResponse, ApiError> {
    let form = MultipartForm::read(&req, payload).await?;
    let file = ImagePolicy::Artwork.check(form.file("file"))?;

    let stored = uploads.save(None, &file.file_name, &file.bytes).await?;
    let item = NewGalleryItem {
        title: form.text("title").unwrap_or(file.file_name.as_str()).to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        image_url: stored.url.clone(),
    };

    match store.insert_gallery_item(item).await {
        Ok(created) => {
            info!("Admin {} uploaded gallery image {}", admin.admin_id, stored.url);
            Ok(HttpResponse::Created().json(json!({ "data": created })))
        }
        Err(err) => {
            uploads.discard(&stored).await;
            Err(err.into())
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckedItem {
    id: i32,
    title: String,
    image_url: String,
    status: FileState,
    size: u64,
}

/// Reports which gallery rows point at missing or empty files.
#[get("/cms/gallery/check")]
pub async fn check(
    _admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    uploads: web::Data<UploadDir>,
) -> Result<HttpResponse, ApiError> {
    let rows = store.list_gallery().await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let status = uploads.inspect(&row.image_url).await;
        items.push(CheckedItem {
            id: row.id,
            title: row.title,
            image_url: row.image_url,
            status: status.state,
            size: status.size,
        });
    }
    let broken = items.iter().filter(|i| i.status != FileState::Ok).count();

    Ok(HttpResponse::Ok().json(json!({
        "total": items.len(),
        "broken": broken,
        "items": items,
    })))
}

/// Deletes every gallery row whose file is missing or empty.
#[post("/cms/gallery/check")]
pub async fn cleanup(
    admin: AdminSession,
    store: web::Data<dyn ContentStore>,
    uploads: web::Data<UploadDir>,
) -> Result<HttpResponse, ApiError> {
    let rows = store.list_gallery().await?;

    let mut broken = Vec::new();
    for row in &rows {
        if uploads.inspect(&row.image_url).await.is_broken() {
            warn!("Gallery item {} points at a broken file: {}", row.id, row.image_url);
            broken.push(row.id);
        }
    }

    let deleted = if broken.is_empty() {
        0
    } else {
        store.delete_gallery_items(&broken).await?
    };
    info!("Admin {} cleaned up {} broken gallery entries", admin.admin_id, deleted);

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Cleaned up {} broken gallery entries", deleted),
        "deleted": deleted,
    })))
}
