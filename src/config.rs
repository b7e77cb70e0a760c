use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::Algorithm;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db: DatabaseConfig,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Truncate the drinks table and seed it on start. Development only.
    pub reset_on_start: bool,
}

/// Identity provider settings used by the token verifier.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Expected `iss` claim, compared verbatim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    pub jwks: JwksLocation,
    /// Signing algorithms a token may declare. Asymmetric only.
    pub algorithms: Vec<Algorithm>,
    pub jwks_ttl: Duration,
    /// Minimum spacing between refetches triggered by an unknown `kid`.
    pub jwks_min_refresh: Duration,
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwksLocation {
    Remote(Url),
    File(PathBuf),
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Database settings alone, for commands that never verify a token.
pub fn load_database() -> anyhow::Result<DatabaseConfig> {
    dotenvy::dotenv().ok();
    database_from_lookup(&|key: &str| std::env::var(key).ok())
}

/// Build the configuration from an arbitrary variable source.
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let auth = auth_from_lookup(&get)?;

    Ok(Config {
        port: parse_or(&get, "PORT", 8080)?,
        db: database_from_lookup(&get)?,
        cors_origins: get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        auth,
    })
}

pub fn database_from_lookup<F>(get: &F) -> anyhow::Result<DatabaseConfig>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(DatabaseConfig {
        url: get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/coffee_shop".into()),
        max_connections: parse_or(get, "DB_MAX_CONNECTIONS", 5)?,
        reset_on_start: parse_or(get, "DB_RESET_ON_START", false)?,
    })
}

fn auth_from_lookup<F>(get: &F) -> anyhow::Result<AuthConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let issuer = get("AUTH_ISSUER")
        .filter(|s| !s.trim().is_empty())
        .context("AUTH_ISSUER must be set to the identity provider's issuer URL")?;
    Url::parse(&issuer).with_context(|| format!("AUTH_ISSUER is not a valid URL: {}", issuer))?;

    let audience = get("AUTH_AUDIENCE")
        .filter(|s| !s.trim().is_empty())
        .context("AUTH_AUDIENCE must be set to this API's identifier")?;

    let jwks = match (get("AUTH_JWKS_PATH"), get("AUTH_JWKS_URI")) {
        (Some(path), _) if !path.trim().is_empty() => JwksLocation::File(PathBuf::from(path)),
        (_, Some(uri)) if !uri.trim().is_empty() => JwksLocation::Remote(
            Url::parse(&uri).with_context(|| format!("AUTH_JWKS_URI is not a valid URL: {}", uri))?,
        ),
        _ => {
            let uri = format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'));
            JwksLocation::Remote(Url::parse(&uri)?)
        }
    };

    let algorithms = parse_algorithms(&get("AUTH_ALGORITHMS").unwrap_or_else(|| "RS256".into()))?;

    Ok(AuthConfig {
        issuer,
        audience,
        jwks,
        algorithms,
        jwks_ttl: Duration::from_secs(parse_or(get, "AUTH_JWKS_TTL_SECS", 600)?),
        jwks_min_refresh: Duration::from_secs(parse_or(get, "AUTH_JWKS_MIN_REFRESH_SECS", 30)?),
        leeway_secs: parse_or(get, "AUTH_LEEWAY_SECS", 0)?,
    })
}

/// Parse a comma-separated algorithm allow-list. Shared-secret (HS*)
/// algorithms are refused: keys come from a public key set.
pub fn parse_algorithms(raw: &str) -> anyhow::Result<Vec<Algorithm>> {
    let mut algorithms = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let alg = Algorithm::from_str(name)
            .map_err(|_| anyhow::anyhow!("unknown signing algorithm: {}", name))?;
        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            anyhow::bail!("symmetric algorithm {} is not allowed; use an asymmetric one", name);
        }
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }
    if algorithms.is_empty() {
        anyhow::bail!("AUTH_ALGORITHMS must name at least one algorithm");
    }
    Ok(algorithms)
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(default),
    }
}
