use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Authorization failure. Each variant carries the status and message it is
/// reported with, so the gate never has to guess a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid_header: {description}")]
    InvalidHeader {
        status: StatusCode,
        description: &'static str,
    },

    #[error("token_expired: Token expired.")]
    TokenExpired,

    #[error("invalid_claims: {description}")]
    InvalidClaims {
        status: StatusCode,
        description: &'static str,
    },

    #[error("unauthorized_permission: Permission not found.")]
    UnauthorizedPermission,

    #[error("key_set_unavailable: Unable to fetch signing keys.")]
    KeySetUnavailable,
}

impl AuthError {
    pub fn invalid_header(description: &'static str) -> Self {
        AuthError::InvalidHeader {
            status: StatusCode::UNAUTHORIZED,
            description,
        }
    }

    pub fn unparseable_header(description: &'static str) -> Self {
        AuthError::InvalidHeader {
            status: StatusCode::BAD_REQUEST,
            description,
        }
    }

    pub fn invalid_claims(description: &'static str) -> Self {
        AuthError::InvalidClaims {
            status: StatusCode::UNAUTHORIZED,
            description,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidHeader { .. } => "invalid_header",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims { .. } => "invalid_claims",
            AuthError::UnauthorizedPermission => "unauthorized_permission",
            AuthError::KeySetUnavailable => "key_set_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidHeader { status, .. } | AuthError::InvalidClaims { status, .. } => {
                *status
            }
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::UnauthorizedPermission => StatusCode::FORBIDDEN,
            AuthError::KeySetUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AuthError::InvalidHeader { description, .. }
            | AuthError::InvalidClaims { description, .. } => *description,
            AuthError::TokenExpired => "Token expired.",
            AuthError::UnauthorizedPermission => "Permission not found.",
            AuthError::KeySetUnavailable => "Unable to fetch signing keys.",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("resource not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound,
            other => AppError::Store(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(e) => e.status(),
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unprocessable(_) | AppError::Store(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Auth(e) => {
                tracing::warn!(
                    code = e.code(),
                    status = status.as_u16(),
                    "authorization rejected: {}",
                    e.description()
                );
                json!({
                    "success": false,
                    "error": status.as_u16(),
                    "message": e.description(),
                    "code": e.code(),
                })
            }
            AppError::NotFound => json!({
                "success": false,
                "error": status.as_u16(),
                "message": "resource not found",
            }),
            AppError::MethodNotAllowed => json!({
                "success": false,
                "error": status.as_u16(),
                "message": "method not allowed",
            }),
            AppError::Unprocessable(detail) => {
                tracing::warn!("unprocessable request: {}", detail);
                json!({
                    "success": false,
                    "error": status.as_u16(),
                    "message": "unprocessable",
                })
            }
            AppError::Store(e) => {
                tracing::error!("store error: {}", e);
                json!({
                    "success": false,
                    "error": status.as_u16(),
                    "message": "unprocessable",
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let resp = AppError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(resp).await,
            json!({"success": false, "error": 404, "message": "resource not found"})
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed_envelope() {
        let resp = AppError::MethodNotAllowed.into_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(resp).await,
            json!({"success": false, "error": 405, "message": "method not allowed"})
        );
    }

    #[tokio::test]
    async fn test_store_errors_hide_internal_detail() {
        let err: AppError = StoreError::Constraint(
            "duplicate key value violates unique constraint \"drinks_title_key\"".into(),
        )
        .into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        assert_eq!(body, json!({"success": false, "error": 422, "message": "unprocessable"}));
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err: AppError = StoreError::NotFound(7).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_auth_error_carries_its_own_status() {
        let resp = AppError::from(AuthError::UnauthorizedPermission).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], 403);
        assert_eq!(body["code"], "unauthorized_permission");
        assert_eq!(body["message"], "Permission not found.");

        let err = AuthError::unparseable_header("Unable to find the appropriate key.");
        let resp = AppError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "invalid_header");
    }
}
