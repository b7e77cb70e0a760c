//! Shared helpers: an app wired to the in-memory store and a fixed JWKS,
//! plus token minting with the fixture RSA keys.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use coffee_shop::config::{self, Config};
use coffee_shop::middleware::jwks::JwksCache;
use coffee_shop::middleware::oidc::TokenVerifier;
use coffee_shop::store::memory::MemoryStore;
use coffee_shop::{api, AppState};

pub const ISSUER: &str = "https://coffee.example.auth0.com/";
pub const AUDIENCE: &str = "drinks";

pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const KEY_1: &[u8] = include_bytes!("../fixtures/rsa_key_1.pem");
pub const KEY_2: &[u8] = include_bytes!("../fixtures/rsa_key_2.pem");

pub fn config_with(extra: &[(&str, &str)]) -> Config {
    let mut vars: Vec<(String, String)> = vec![
        ("AUTH_ISSUER".into(), ISSUER.into()),
        ("AUTH_AUDIENCE".into(), AUDIENCE.into()),
    ];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    config::from_lookup(|key| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}

/// App over an empty in-memory store, verifying against the fixture key set.
pub fn app() -> Router {
    let cfg = config_with(&[]);
    let set: JwkSet = serde_json::from_str(JWKS).unwrap();
    let verifier = TokenVerifier::new(JwksCache::fixed(set), &cfg.auth);
    api::router(AppState::new(cfg, Arc::new(MemoryStore::new()), verifier))
}

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn claims(permissions: &[&str]) -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "auth0|manager",
        "iat": now(),
        "exp": now() + 3600,
        "permissions": permissions,
    })
}

pub fn sign_with(claims: &Value, kid: &str, pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
}

pub fn token(permissions: &[&str]) -> String {
    sign_with(&claims(permissions), "test-key-1", KEY_1)
}

/// Every permission the manager role has.
pub fn manager() -> String {
    token(&["get:drinks-detail", "post:drinks", "patch:drinks", "delete:drinks"])
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = tokio_test::assert_ok!(app.clone().oneshot(builder.body(body).unwrap()).await);
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}
