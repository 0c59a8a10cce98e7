use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::time::{Duration, Instant};

use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::{Method, StatusCode};
use actix_web::{web, Error, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use log::{debug, error, info, warn};

use crate::errors::ApiError;
use crate::services::{AuthService, SESSION_COOKIE};

// Probes hit these constantly; they are only logged at debug level.
const QUIET_PATHS: &[&str] = &["/api/health"];

/// Logs every request and its outcome with latency.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
}

fn log_outcome(quiet: bool, method: &Method, path: &str, status: StatusCode, elapsed: Duration) {
    if quiet && status.is_success() {
        debug!("← {} for {} {} in {:.2?}", status, method, path, elapsed);
    } else if status.is_success() || status.is_redirection() {
        info!("← Response: \x1B[1;32m{}\x1B[0m for {} {} in {:.2?}", status, method, path, elapsed);
    } else if status.is_client_error() {
        warn!("← Response: \x1B[1;33m{}\x1B[0m for {} {} in {:.2?}", status, method, path, elapsed);
    } else {
        error!("← Response: \x1B[1;31m{}\x1B[0m for {} {} in {:.2?}", status, method, path, elapsed);
    }
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + 'static>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        // query strings can carry the migration secret, so only the path is logged
        let path = req.path().to_owned();
        let quiet = QUIET_PATHS.contains(&path.as_str());
        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_owned)
            .unwrap_or_else(|| String::from("unknown"));

        if quiet {
            debug!("→ {} {} from {}", method, path, client_ip);
        } else {
            info!("→ Request: \x1B[1;34m{} {}\x1B[0m from IP: {}", method, path, client_ip);
        }

        let service = self.service.clone();
        Box::pin(async move {
            let start = Instant::now();
            let res = service.call(req).await?;
            log_outcome(quiet, &method, &path, res.status(), start.elapsed());
            Ok(res)
        })
    }
}

/// Proof that the request carries a live admin session. Taking this as a
/// handler argument runs the gate before the handler body and before any
/// payload is read.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession {
    pub admin_id: i32,
}

impl FromRequest for AdminSession {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let auth = req.app_data::<web::Data<AuthService>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_owned());

        Box::pin(async move {
            let auth = auth.ok_or_else(|| ApiError::InternalError("AuthService is not registered".to_string()))?;
            match auth.check(token.as_deref()).await {
                Some(admin_id) => Ok(AdminSession { admin_id }),
                None => Err(ApiError::unauthorized()),
            }
        })
    }
}
