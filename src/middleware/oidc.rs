//! Bearer token verification against the identity provider's JWKS.
//!
//! Workflow for each protected request:
//! 1. Pull `Authorization: Bearer <jwt>` out of the request headers
//! 2. Decode the JWT header → require a `kid` and an allow-listed algorithm
//! 3. Find the matching key in the cached JWKS
//! 4. Verify signature, expiry, audience, issuer
//!
//! Checks short-circuit on the first failure and each failure is a typed
//! [`AuthError`] carrying its own status.

use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};

use super::jwks::JwksCache;
use crate::config::{AuthConfig, JwksLocation};
use crate::errors::AuthError;

// ── Types ────────────────────────────────────────────────────

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(a) => a == audience,
            Audience::Many(all) => all.iter().any(|a| a == audience),
        }
    }
}

/// Validated claims extracted from a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: Audience,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Subject (user identifier from the IdP)
    #[serde(default)]
    pub sub: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,
    /// Granted permissions, e.g. `post:drinks`
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    /// Everything else the provider put in the token
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Verifier ─────────────────────────────────────────────────

pub struct TokenVerifier {
    keys: JwksCache,
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(keys: JwksCache, auth: &AuthConfig) -> Self {
        Self {
            keys,
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            algorithms: auth.algorithms.clone(),
            leeway_secs: auth.leeway_secs,
        }
    }

    /// Build the verifier and its key cache from configuration.
    pub fn from_config(auth: &AuthConfig) -> anyhow::Result<Self> {
        let keys = match &auth.jwks {
            JwksLocation::Remote(uri) => JwksCache::remote(
                uri.clone(),
                auth.jwks_ttl,
                auth.jwks_min_refresh.min(auth.jwks_ttl),
            )?,
            JwksLocation::File(path) => JwksCache::from_file(path)?,
        };
        Ok(Self::new(keys, auth))
    }

    /// Verify the bearer token carried by a request.
    pub async fn verify_headers(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = bearer_token(headers)?;
        self.verify(token).await
    }

    /// Verify a raw JWT and return its claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|_| AuthError::unparseable_header("Unable to parse authentication token."))?;

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::invalid_header("Authorization malformed."))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(AuthError::invalid_header("Token signing algorithm is not permitted."));
        }

        let key = self.keys.key_for(kid).await?;
        if key.algorithm.is_some_and(|alg| alg != header.alg) {
            return Err(AuthError::invalid_header(
                "Token algorithm does not match its signing key.",
            ));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.leeway_secs;

        let data = decode::<Claims>(token, &key.key, &validation).map_err(classify)?;
        Ok(data.claims)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AuthError::invalid_header("Authorization header is expected."))?
        .to_str()
        .map_err(|_| AuthError::invalid_header("Authorization header must be bearer token."))?;

    let parts: Vec<&str> = value.split(' ').collect();
    if !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(AuthError::invalid_header(
            "Authorization header must start with \"Bearer\".",
        ));
    }
    match parts.as_slice() {
        [_, token] if !token.is_empty() => Ok(*token),
        [_] | [_, _] => Err(AuthError::invalid_header("Token not found.")),
        _ => Err(AuthError::invalid_header("Authorization header must be bearer token.")),
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::ImmatureSignature => {
            AuthError::invalid_claims("Incorrect claims. Please, check the audience and issuer.")
        }
        ErrorKind::InvalidSignature => {
            AuthError::invalid_claims("Unable to verify token signature.")
        }
        ErrorKind::InvalidAlgorithm => {
            AuthError::invalid_header("Token signing algorithm is not permitted.")
        }
        _ => AuthError::invalid_claims("Unable to parse authentication token."),
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use jsonwebtoken::jwk::JwkSet;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    use super::*;

    pub const ISSUER: &str = "https://coffee.example.auth0.com/";
    pub const AUDIENCE: &str = "drinks";

    pub fn auth_config() -> AuthConfig {
        crate::config::from_lookup(|key| match key {
            "AUTH_ISSUER" => Some(ISSUER.to_string()),
            "AUTH_AUDIENCE" => Some(AUDIENCE.to_string()),
            _ => None,
        })
        .unwrap()
        .auth
    }

    pub fn verifier() -> TokenVerifier {
        let set: JwkSet =
            serde_json::from_str(include_str!("../../tests/fixtures/jwks.json")).unwrap();
        TokenVerifier::new(JwksCache::fixed(set), &auth_config())
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
            "sub": "auth0|barista",
            "iat": now(),
            "exp": now() + 3600,
            "permissions": permissions,
        })
    }

    /// Sign with the fixture key whose public half is published as `test-key-1`.
    pub fn sign(claims: &Value) -> String {
        sign_with(claims, "test-key-1", include_bytes!("../../tests/fixtures/rsa_key_1.pem"))
    }

    pub fn sign_with(claims: &Value, kid: &str, pem: &[u8]) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &EncodingKey::from_rsa_pem(pem).unwrap()).unwrap()
    }
}
