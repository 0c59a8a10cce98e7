use std::sync::Arc;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::web;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use rand::RngCore;

use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::models::{AdminAccount, NewSession, Session};
use crate::store::{AuthStore, StoreResult};

pub const SESSION_COOKIE: &str = "admin_session";

const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug)]
pub struct LoginOutcome {
    pub account: AdminAccount,
    pub session: Session,
}

/// Admin authentication: password checks, session minting and the gate
/// every admin route runs through.
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    session_ttl: Duration,
    secure_cookies: bool,
}

impl AuthService {
    pub fn new(store: Arc<dyn AuthStore>, config: &AppConfig) -> Self {
        Self {
            store,
            session_ttl: Duration::days(config.session_ttl_days),
            secure_cookies: config.secure_cookies,
        }
    }

    pub fn hash_password(password: &str) -> Result<String, ApiError> {
        hash(password, DEFAULT_COST).map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::InternalError(format!("Password hashing error: {}", e))
        })
    }

    /// Verification runs on the blocking pool.
    pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        web::block(move || verify(password, &password_hash))
            .await
            .map_err(|e| ApiError::InternalError(format!("Password verification task failed: {}", e)))?
            .map_err(|e| {
                error!("Stored password hash is unusable: {}", e);
                ApiError::InternalError(format!("Password verification error: {}", e))
            })
    }

    /// 32 random bytes, hex encoded.
    pub fn generate_session_token() -> String {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let account = self.store.find_account_by_email(email).await?.ok_or_else(|| {
            debug!("Login failed: no admin account for the supplied email");
            ApiError::AuthError("Invalid email or password".to_string())
        })?;

        if !Self::verify_password(password, &account.password_hash).await? {
            debug!("Login failed: wrong password for admin {}", account.id);
            return Err(ApiError::AuthError("Invalid email or password".to_string()));
        }

        if !account.is_active {
            warn!("Login refused for inactive admin {}", account.id);
            return Err(ApiError::ForbiddenError("Admin account is inactive".to_string()));
        }

        let session = self
            .store
            .insert_session(NewSession {
                admin_id: account.id,
                session_token: Self::generate_session_token(),
                expires_at: Utc::now().naive_utc() + self.session_ttl,
            })
            .await?;

        if let Err(e) = self.store.record_login(account.id).await {
            warn!("Could not record last login for admin {}: {}", account.id, e);
        }

        info!("Admin {} logged in", account.id);
        Ok(LoginOutcome { account, session })
    }

    /// Resolves a session token to an active admin id. Never errors: any
    /// failure along the way is treated as "not authenticated".
    pub async fn check(&self, token: Option<&str>) -> Option<i32> {
        let token = token.filter(|t| !t.is_empty())?;
        match self.resolve(token).await {
            Ok(admin_id) => admin_id,
            Err(e) => {
                warn!("Session check failed closed: {}", e);
                None
            }
        }
    }

    async fn resolve(&self, token: &str) -> StoreResult<Option<i32>> {
        let Some(session) = self.store.find_session(token).await? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now().naive_utc()) {
            // expired rows are reclaimed by whoever trips over them
            self.store.delete_session(token).await?;
            debug!("Removed expired session {} of admin {}", session.id, session.admin_id);
            return Ok(None);
        }

        let account = self.store.find_account(session.admin_id).await?;
        Ok(account.filter(|a| a.is_active).map(|a| a.id))
    }

    /// Removes the session behind `token`, if any. Storage errors are logged;
    /// the caller clears the cookie either way.
    pub async fn logout(&self, token: Option<&str>) {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return;
        };
        match self.store.delete_session(token).await {
            Ok(true) => info!("Admin session closed"),
            Ok(false) => debug!("Logout for an unknown session"),
            Err(e) => warn!("Could not delete session on logout: {}", e),
        }
    }

    pub fn session_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token.to_owned())
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(self.session_ttl.num_seconds()))
            .finish()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .finish();
        cookie.make_removal();
        cookie
    }
}
