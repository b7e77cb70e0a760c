//! Signing-key cache for the identity provider's JWKS.
//!
//! Keys are served only while the fetched set is younger than the TTL. A
//! stale set is refetched before it is used again, and a failed refetch
//! fails the request rather than falling back to the old keys, so a key the
//! provider has withdrawn stops verifying within one TTL. A refetch replaces
//! the whole set. An unknown `kid` triggers at most one refetch per
//! `min_refresh` interval to pick up rotated keys.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Context;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::errors::AuthError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A key ready for signature verification.
#[derive(Clone)]
pub struct VerifyingKey {
    pub key: DecodingKey,
    /// Algorithm pinned by the JWK's `alg` member, if it has one.
    pub algorithm: Option<Algorithm>,
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

enum KeySource {
    Remote { uri: Url, client: reqwest::Client },
    Fixed,
}

#[derive(Default)]
struct Snapshot {
    keys: HashMap<String, VerifyingKey>,
    fetched_at: Option<Instant>,
    attempted_at: Option<Instant>,
}

pub struct JwksCache {
    source: KeySource,
    snapshot: RwLock<Snapshot>,
    refresh_lock: Mutex<()>,
    ttl: Duration,
    min_refresh: Duration,
}

impl JwksCache {
    /// Cache backed by the provider's published key-set endpoint.
    pub fn remote(uri: Url, ttl: Duration, min_refresh: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build JWKS http client")?;
        Ok(Self {
            source: KeySource::Remote { uri, client },
            snapshot: RwLock::new(Snapshot::default()),
            refresh_lock: Mutex::new(()),
            ttl,
            min_refresh,
        })
    }

    /// Cache over a key set that never changes (local file, tests).
    pub fn fixed(set: JwkSet) -> Self {
        Self {
            source: KeySource::Fixed,
            snapshot: RwLock::new(Snapshot {
                keys: index_keys(set),
                fetched_at: Some(Instant::now()),
                attempted_at: Some(Instant::now()),
            }),
            refresh_lock: Mutex::new(()),
            ttl: Duration::MAX,
            min_refresh: Duration::MAX,
        }
    }

    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read JWKS file {}", path.display()))?;
        let set: JwkSet = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JWKS file {}", path.display()))?;
        Ok(Self::fixed(set))
    }

    /// Look up the verifying key for `kid`, refreshing the set when it is
    /// stale or when the kid is unknown and a refetch is allowed.
    pub async fn key_for(&self, kid: &str) -> Result<VerifyingKey, AuthError> {
        {
            let snap = self.snapshot.read().await;
            let now = Instant::now();
            if self.is_fresh(&snap, now) {
                if let Some(key) = snap.keys.get(kid) {
                    return Ok(key.clone());
                }
                if !self.may_refetch(&snap, now) {
                    return Err(key_not_found());
                }
            }
        }

        self.refresh().await?;

        let snap = self.snapshot.read().await;
        snap.keys.get(kid).cloned().ok_or_else(key_not_found)
    }

    fn is_fresh(&self, snap: &Snapshot, now: Instant) -> bool {
        match self.source {
            KeySource::Fixed => true,
            KeySource::Remote { .. } => snap
                .fetched_at
                .is_some_and(|at| now.duration_since(at) < self.ttl),
        }
    }

    fn may_refetch(&self, snap: &Snapshot, now: Instant) -> bool {
        match self.source {
            KeySource::Fixed => false,
            KeySource::Remote { .. } => snap
                .attempted_at
                .map_or(true, |at| now.duration_since(at) >= self.min_refresh),
        }
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let (uri, client) = match &self.source {
            KeySource::Remote { uri, client } => (uri, client),
            KeySource::Fixed => return Ok(()),
        };

        let _guard = self.refresh_lock.lock().await;
        let now = Instant::now();
        {
            let snap = self.snapshot.read().await;
            if !self.may_refetch(&snap, now) {
                // another request refreshed while we waited for the lock
                return if self.is_fresh(&snap, now) {
                    Ok(())
                } else {
                    Err(AuthError::KeySetUnavailable)
                };
            }
        }

        tracing::info!(jwks_uri = %uri, "Fetching JWKS keys");
        let result = fetch(client, uri).await;

        let mut snap = self.snapshot.write().await;
        snap.attempted_at = Some(now);
        match result {
            Ok(set) => {
                snap.keys = index_keys(set);
                snap.fetched_at = Some(now);
                tracing::debug!(keys = snap.keys.len(), "JWKS refreshed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(jwks_uri = %uri, "JWKS fetch failed: {:#}", e);
                if !self.is_fresh(&snap, now) {
                    snap.keys.clear();
                }
                Err(AuthError::KeySetUnavailable)
            }
        }
    }
}

async fn fetch(client: &reqwest::Client, uri: &Url) -> anyhow::Result<JwkSet> {
    let set = client
        .get(uri.clone())
        .send()
        .await?
        .error_for_status()?
        .json::<JwkSet>()
        .await?;
    Ok(set)
}

fn key_not_found() -> AuthError {
    AuthError::unparseable_header("Unable to find the appropriate key.")
}

/// Index a key set by `kid`, dropping keys that cannot verify signatures.
fn index_keys(set: JwkSet) -> HashMap<String, VerifyingKey> {
    let mut keys = HashMap::new();
    for jwk in set.keys {
        if let Some((kid, key)) = verifying_key(&jwk) {
            keys.insert(kid, key);
        }
    }
    keys
}

fn verifying_key(jwk: &Jwk) -> Option<(String, VerifyingKey)> {
    let Some(kid) = jwk.common.key_id.clone() else {
        tracing::warn!("skipping JWK without kid");
        return None;
    };
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        tracing::debug!(kid = %kid, "skipping encryption key");
        return None;
    }
    let algorithm = match &jwk.common.key_algorithm {
        Some(alg) => match signing_algorithm(alg) {
            Some(alg) => Some(alg),
            None => {
                tracing::warn!(kid = %kid, "skipping JWK with non-signing alg {:?}", alg);
                return None;
            }
        },
        None => None,
    };
    match DecodingKey::from_jwk(jwk) {
        Ok(key) => Some((kid, VerifyingKey { key, algorithm })),
        Err(e) => {
            tracing::warn!(kid = %kid, "skipping unusable JWK: {}", e);
            None
        }
    }
}

fn signing_algorithm(alg: &KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
