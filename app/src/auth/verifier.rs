use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::*;
use tokio::sync::Mutex;
use url::Url;

use super::{AuthError, Claims};

pub const ALLOWED_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256];

/// Refetches, successful or not, are at least this far apart.
const REFETCH_FLOOR: Duration = Duration::from_secs(60);

const MALFORMED_TOKEN: AuthError = AuthError::InvalidHeader("Unable to parse authentication token.");
const UNKNOWN_KEY: AuthError = AuthError::InvalidHeader("Unable to find the appropriate key.");

/// Where the trusted signing keys come from.
pub enum KeySet {
    Fixed(JwkSet),
    Remote(RemoteKeys),
}

/// A JWK Set fetched over HTTP and cached for `ttl`.
pub struct RemoteKeys {
    url: Url,
    client: reqwest::Client,
    ttl: Duration,
    floor: Duration,
    cache: RwLock<CachedKeys>,
    refresh: Mutex<()>,
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
    attempted_at: Instant,
}

pub struct TokenVerifier {
    keys: KeySet,
    validation: Validation,
}

impl KeySet {
    async fn find(&self, kid: &str) -> Option<Jwk> {
        match self {
            KeySet::Fixed(keys) => keys.find(kid).cloned(),
            KeySet::Remote(remote) => remote.find(kid).await,
        }
    }
}

async fn fetch_keys(client: &reqwest::Client, url: &Url) -> Result<JwkSet> {
    debug!("Fetching signing keys from {}", url);
    let keys = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("fetch {}", url))?
        .json::<JwkSet>()
        .await
        .with_context(|| format!("parse key set from {}", url))?;
    info!("Loaded {} signing keys from {}", keys.keys.len(), url);
    Ok(keys)
}

/// Stale or missing keys are refetched, unless the last attempt was too
/// recent.
fn should_refetch(
    since_fetch: Duration,
    since_attempt: Duration,
    ttl: Duration,
    floor: Duration,
    found: bool,
) -> bool {
    since_attempt >= floor && (since_fetch >= ttl || !found)
}

impl RemoteKeys {
    /// Performs the initial fetch; a failure here means the process cannot
    /// authenticate anyone and should not start.
    pub async fn discover(url: Url, ttl: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build key fetch client")?;
        Self::with_client(url, client, ttl, REFETCH_FLOOR).await
    }

    async fn with_client(
        url: Url,
        client: reqwest::Client,
        ttl: Duration,
        floor: Duration,
    ) -> Result<Self> {
        let keys = fetch_keys(&client, &url).await?;
        let now = Instant::now();
        let cache = RwLock::new(CachedKeys {
            keys,
            fetched_at: now,
            attempted_at: now,
        });
        Ok(RemoteKeys {
            url,
            client,
            ttl,
            floor,
            cache,
            refresh: Mutex::new(()),
        })
    }

    fn lookup(&self, kid: &str) -> (Option<Jwk>, bool) {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let found = cache.keys.find(kid).cloned();
        let refetch = should_refetch(
            cache.fetched_at.elapsed(),
            cache.attempted_at.elapsed(),
            self.ttl,
            self.floor,
            found.is_some(),
        );
        (found, refetch)
    }

    async fn find(&self, kid: &str) -> Option<Jwk> {
        let (found, refetch) = self.lookup(kid);
        if !refetch {
            return found;
        }

        // One fetch at a time; waiters see what the winner left behind.
        let _refreshing = self.refresh.lock().await;
        let (found, refetch) = self.lookup(kid);
        if !refetch {
            return found;
        }

        let fetched = fetch_keys(&self.client, &self.url).await;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.attempted_at = Instant::now();
        match fetched {
            Ok(keys) => {
                cache.keys = keys;
                cache.fetched_at = cache.attempted_at;
                cache.keys.find(kid).cloned()
            }
            Err(e) => {
                warn!("Keeping stale signing keys: {:?}", e);
                found
            }
        }
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => {
            AuthError::InvalidClaims("Incorrect claims. Please, check the audience and issuer.")
        }
        ErrorKind::Json(_) => AuthError::InvalidClaims("Unable to parse token claims."),
        ErrorKind::InvalidSignature => AuthError::InvalidToken("Token signature is invalid."),
        _ => AuthError::InvalidToken("Unable to verify token."),
    }
}

impl TokenVerifier {
    pub fn new(keys: KeySet, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        TokenVerifier { keys, validation }
    }

    /// Checks, in order: shape, algorithm, key id, signature, then issuer,
    /// audience and expiry.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.split('.').count() != 3 {
            return Err(MALFORMED_TOKEN);
        }
        let header = decode_header(token).map_err(|e| {
            debug!("Undecodable token header: {}", e);
            MALFORMED_TOKEN
        })?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            debug!("Refusing token signed with {:?}", header.alg);
            return Err(AuthError::InvalidHeader("Token signing algorithm not allowed."));
        }
        let kid = header.kid.as_deref().ok_or(UNKNOWN_KEY)?;
        let jwk = self.keys.find(kid).await.ok_or_else(|| {
            debug!("No signing key with id {:?}", kid);
            UNKNOWN_KEY
        })?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            warn!("Unusable signing key {:?}: {}", kid, e);
            UNKNOWN_KEY
        })?;

        let data = decode::<Claims>(token, &key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            classify(e)
        })?;
        Ok(data.claims)
    }
}
