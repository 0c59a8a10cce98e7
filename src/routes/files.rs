use std::io::ErrorKind;

use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde_json::json;

use crate::errors::ApiError;
use crate::middleware::AdminSession;
use crate::uploads::{ImagePolicy, MultipartForm, UploadDir};

/// Serves a stored upload. Mounted outside `/api`.
#[get("/uploads/{tail:.*}")]
pub async fn serve(uploads: web::Data<UploadDir>, tail: web::Path<String>) -> HttpResponse {
    let not_found = || HttpResponse::NotFound().json(json!({ "error": "File not found" }));

    match uploads.read(&tail).await {
        Ok((bytes, content_type)) => HttpResponse::Ok()
            .content_type(content_type)
            .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
            .body(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => not_found(),
        Err(e) => {
            warn!("Failed to read upload {}: {}", tail, e);
            not_found()
        }
    }
}

/// Generic image upload used by the admin UI for section artwork.
#[post("/upload")]
pub async fn upload(
    admin: AdminSession,
    req: HttpRequest,
    payload: web::Payload,
    uploads: web::Data<UploadDir>,
) -> Result<HttpResponse, ApiError> {
    let form = MultipartForm::read(&req, payload).await?;
    let file = ImagePolicy::Photo.check(form.file("file"))?;
    let stored = uploads.save(None, &file.file_name, &file.bytes).await?;
    info!("Admin {} uploaded {}", admin.admin_id, stored.url);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "url": stored.url })))
}
