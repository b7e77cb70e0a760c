use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::middleware::rbac::{permissions, require_permission, RequirePermission};
use crate::AppState;

pub mod handlers;

const BODY_LIMIT: usize = 1024 * 1024;

/// Build the full application: drink routes, per-route permission gates and
/// the shared middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    let verifier = state.verifier.clone();
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/drinks", get(handlers::list_drinks))
        .route(
            "/drinks",
            post(handlers::create_drink).route_layer(middleware::from_fn_with_state(
                RequirePermission::new(verifier.clone(), permissions::POST_DRINKS),
                require_permission,
            )),
        )
        .route(
            "/drinks-detail",
            get(handlers::list_drinks_detail).route_layer(middleware::from_fn_with_state(
                RequirePermission::new(verifier.clone(), permissions::GET_DRINKS_DETAIL),
                require_permission,
            )),
        )
        .route(
            "/drinks/:id",
            patch(handlers::update_drink).route_layer(middleware::from_fn_with_state(
                RequirePermission::new(verifier.clone(), permissions::PATCH_DRINKS),
                require_permission,
            )),
        )
        .route(
            "/drinks/:id",
            delete(handlers::delete_drink).route_layer(middleware::from_fn_with_state(
                RequirePermission::new(verifier, permissions::DELETE_DRINKS),
                require_permission,
            )),
        )
        .method_not_allowed_fallback(fallback_405)
        .fallback(fallback_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> AppError {
    AppError::NotFound
}

async fn fallback_405() -> AppError {
    AppError::MethodNotAllowed
}

/// Any origin when none are configured, otherwise the configured list.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: security headers on every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    // responses may carry recipes only authorized callers should see
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.remove(header::SERVER);

    resp
}
