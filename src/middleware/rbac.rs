use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::oidc::{Claims, TokenVerifier};
use crate::errors::{AppError, AuthError};

/// Permission names granted by the identity provider.
pub mod permissions {
    pub const GET_DRINKS_DETAIL: &str = "get:drinks-detail";
    pub const POST_DRINKS: &str = "post:drinks";
    pub const PATCH_DRINKS: &str = "patch:drinks";
    pub const DELETE_DRINKS: &str = "delete:drinks";
}

/// Exact-match permission check against verified claims.
///
/// A token without a `permissions` claim is malformed for this API and is
/// reported as `invalid_claims`, not as a missing permission.
pub fn check_permissions(permission: &str, claims: &Claims) -> Result<(), AuthError> {
    let granted = claims.permissions.as_ref().ok_or(AuthError::InvalidClaims {
        status: axum::http::StatusCode::BAD_REQUEST,
        description: "Permissions not included in JWT.",
    })?;

    if granted.iter().any(|p| p == permission) {
        Ok(())
    } else {
        Err(AuthError::UnauthorizedPermission)
    }
}

/// State for one protected route: the verifier plus the permission it demands.
#[derive(Clone)]
pub struct RequirePermission {
    verifier: Arc<TokenVerifier>,
    permission: &'static str,
}

impl RequirePermission {
    pub fn new(verifier: Arc<TokenVerifier>, permission: &'static str) -> Self {
        Self {
            verifier,
            permission,
        }
    }
}

/// Middleware: verify the bearer token, check the route's permission, then
/// hand the claims to the handler through request extensions.
///
/// Verification failures propagate as-is; they are never downgraded to a
/// missing permission.
pub async fn require_permission(
    State(gate): State<RequirePermission>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = gate.verifier.verify_headers(req.headers()).await?;
    check_permissions(gate.permission, &claims)?;

    tracing::debug!(
        sub = claims.sub.as_deref().unwrap_or("unknown"),
        permission = gate.permission,
        "request authorized"
    );
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
