use actix_web::{post, route, web, HttpRequest, HttpResponse};
use log::debug;
use serde_json::json;

use crate::errors::ApiError;
use crate::models::{AdminProfile, LoginRequest};
use crate::services::{AuthService, SESSION_COOKIE};
use crate::validation::non_blank;

fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE).map(|c| c.value().to_owned())
}

#[post("/auth/login")]
pub async fn login(auth: web::Data<AuthService>, body: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let LoginRequest { email, password } = body.into_inner();
    let email = non_blank(email.as_deref());
    let password = password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::BadRequest("Email and password are required".to_string()));
    };

    let outcome = auth.login(&email, &password).await?;

    Ok(HttpResponse::Ok()
        .cookie(auth.session_cookie(&outcome.session.session_token))
        .json(json!({
            "success": true,
            "user": AdminProfile::from(&outcome.account),
        })))
}

#[post("/auth/logout")]
pub async fn logout(req: HttpRequest, auth: web::Data<AuthService>) -> HttpResponse {
    auth.logout(session_token(&req).as_deref()).await;
    HttpResponse::Ok()
        .cookie(auth.removal_cookie())
        .json(json!({ "success": true }))
}

/// Lets the admin UI ask whether its cookie is still good.
#[route("/auth/middleware", method = "GET", method = "POST")]
pub async fn session_status(req: HttpRequest, auth: web::Data<AuthService>) -> HttpResponse {
    match auth.check(session_token(&req).as_deref()).await {
        Some(admin_id) => {
            debug!("Session valid for admin {}", admin_id);
            HttpResponse::Ok().json(json!({ "authenticated": true }))
        }
        None => HttpResponse::Unauthorized().json(json!({ "authenticated": false })),
    }
}
