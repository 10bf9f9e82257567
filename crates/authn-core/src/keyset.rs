//! Provider key-set fetching and caching.
//!
//! The key-set client fetches the identity provider's published
//! verification keys and caches them as an immutable snapshot. A cache
//! miss triggers at most one refresh per lookup, and refresh attempts
//! are rate limited so hostile tokens with unknown key ids cannot
//! force a fetch per request.
//!
//! # Security
//!
//! - The provider response is untrusted input: every entry is parsed
//!   strictly, and malformed entries are skipped individually without
//!   discarding the rest of the set.
//! - The cache is replaced wholesale on refresh; readers always see
//!   either the previous complete snapshot or the new one.

use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Default snapshot TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default minimum interval between refresh attempts.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Default key-set fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Algorithm family implied by a verification key's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Symmetric secret (`kty: oct`), HMAC algorithms.
    Oct,
    /// RSA public key (`kty: RSA`).
    Rsa,
    /// Octet key pair (`kty: OKP`), Ed25519 only.
    Okp,
}

impl KeyFamily {
    /// Whether a declared token algorithm belongs to this family.
    pub fn allows(self, alg: Algorithm) -> bool {
        match self {
            KeyFamily::Oct => matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512),
            KeyFamily::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyFamily::Okp => matches!(alg, Algorithm::EdDSA),
        }
    }
}

/// Decoded key material, never mutated after construction.
#[derive(Clone)]
pub enum KeyMaterial {
    /// Raw HMAC secret bytes.
    Oct { secret: Vec<u8> },
    /// RSA public key components, base64url-encoded as published.
    Rsa { n: String, e: String },
    /// Raw Ed25519 public key bytes.
    Okp { public_key: Vec<u8> },
}

/// Secret bytes are redacted; public material is summarized.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Oct { .. } => f.debug_struct("Oct").field("secret", &"[REDACTED]").finish(),
            KeyMaterial::Rsa { n, e } => f
                .debug_struct("Rsa")
                .field("n_len", &n.len())
                .field("e", e)
                .finish(),
            KeyMaterial::Okp { public_key } => f
                .debug_struct("Okp")
                .field("public_key_len", &public_key.len())
                .finish(),
        }
    }
}

/// A single verification key from the provider key set.
#[derive(Debug, Clone)]
pub struct Jwk {
    /// Key id used for lookup.
    pub kid: String,

    /// Algorithm pinned by the provider for this key, if any. When
    /// present, tokens must declare exactly this algorithm.
    pub alg: Option<Algorithm>,

    /// Key material, which also determines the algorithm family.
    pub material: KeyMaterial,
}

impl Jwk {
    /// The algorithm family implied by this key's material.
    pub fn family(&self) -> KeyFamily {
        match self.material {
            KeyMaterial::Oct { .. } => KeyFamily::Oct,
            KeyMaterial::Rsa { .. } => KeyFamily::Rsa,
            KeyMaterial::Okp { .. } => KeyFamily::Okp,
        }
    }

    /// Parse one provider key-set entry, strictly.
    ///
    /// # Errors
    ///
    /// Returns a [`JwkParseError`] describing why the entry is unusable;
    /// callers skip the entry and keep the rest of the set.
    pub fn parse(value: &serde_json::Value) -> Result<Self, JwkParseError> {
        let raw: RawJwk =
            serde_json::from_value(value.clone()).map_err(|_| JwkParseError::Malformed)?;

        let kid = raw
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(JwkParseError::MissingKid)?;

        if let Some(key_use) = &raw.key_use {
            if key_use != "sig" {
                return Err(JwkParseError::NotASigningKey(key_use.clone()));
            }
        }

        let alg = match raw.alg.as_deref() {
            None => None,
            Some(name) => Some(
                Algorithm::from_str(name)
                    .map_err(|_| JwkParseError::UnsupportedAlgorithm(name.to_string()))?,
            ),
        };

        let material = match raw.kty.as_str() {
            "oct" => {
                let k = raw.k.ok_or(JwkParseError::MissingMaterial("k"))?;
                let secret = URL_SAFE_NO_PAD
                    .decode(k)
                    .map_err(|_| JwkParseError::InvalidEncoding("k"))?;
                KeyMaterial::Oct { secret }
            }
            "RSA" => {
                let n = raw.n.ok_or(JwkParseError::MissingMaterial("n"))?;
                let e = raw.e.ok_or(JwkParseError::MissingMaterial("e"))?;
                // Validate the encoding up front so a bad key is dropped
                // here rather than failing every verification attempt.
                URL_SAFE_NO_PAD
                    .decode(&n)
                    .map_err(|_| JwkParseError::InvalidEncoding("n"))?;
                URL_SAFE_NO_PAD
                    .decode(&e)
                    .map_err(|_| JwkParseError::InvalidEncoding("e"))?;
                KeyMaterial::Rsa { n, e }
            }
            "OKP" => {
                let crv = raw.crv.ok_or(JwkParseError::MissingMaterial("crv"))?;
                if crv != "Ed25519" {
                    return Err(JwkParseError::UnsupportedCurve(crv));
                }
                let x = raw.x.ok_or(JwkParseError::MissingMaterial("x"))?;
                let public_key = URL_SAFE_NO_PAD
                    .decode(x)
                    .map_err(|_| JwkParseError::InvalidEncoding("x"))?;
                KeyMaterial::Okp { public_key }
            }
            other => return Err(JwkParseError::UnknownKeyType(other.to_string())),
        };

        let jwk = Self { kid, alg, material };

        if let Some(alg) = jwk.alg {
            if !jwk.family().allows(alg) {
                return Err(JwkParseError::AlgorithmFamilyConflict);
            }
        }

        Ok(jwk)
    }
}

/// Why a provider key-set entry was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JwkParseError {
    #[error("entry is not a JWK object")]
    Malformed,

    #[error("entry has no usable key id")]
    MissingKid,

    #[error("entry is not a signing key (use: {0})")]
    NotASigningKey(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unknown key type: {0}")]
    UnknownKeyType(String),

    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),

    #[error("missing key material field: {0}")]
    MissingMaterial(&'static str),

    #[error("key material field is not base64url: {0}")]
    InvalidEncoding(&'static str),

    #[error("pinned algorithm does not belong to the key's family")]
    AlgorithmFamilyConflict,
}

/// Raw wire shape of a key-set entry.
#[derive(Debug, Deserialize)]
struct RawJwk {
    kty: String,

    #[serde(default)]
    kid: Option<String>,

    #[serde(default)]
    alg: Option<String>,

    #[serde(default, rename = "use")]
    key_use: Option<String>,

    #[serde(default)]
    k: Option<String>,

    #[serde(default)]
    n: Option<String>,

    #[serde(default)]
    e: Option<String>,

    #[serde(default)]
    crv: Option<String>,

    #[serde(default)]
    x: Option<String>,
}

/// Provider key-set response.
#[derive(Debug, Deserialize)]
struct KeySetResponse {
    keys: Vec<serde_json::Value>,
}

/// Immutable key-set snapshot, replaced wholesale on refresh.
#[derive(Debug)]
pub struct KeySetSnapshot {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

impl KeySetSnapshot {
    /// Build a snapshot from raw provider entries, skipping bad ones.
    fn from_entries(entries: Vec<serde_json::Value>) -> Self {
        let mut keys = HashMap::new();
        for entry in entries {
            match Jwk::parse(&entry) {
                Ok(jwk) => {
                    let kid = jwk.kid.clone();
                    if keys.insert(kid.clone(), jwk).is_some() {
                        tracing::warn!(
                            target: "authn.keyset",
                            kid = %kid,
                            "Duplicate key id in provider key set; keeping the later entry"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        target: "authn.keyset",
                        error = %e,
                        "Skipping malformed key set entry"
                    );
                }
            }
        }
        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }

    /// Look up a key by id.
    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    /// Number of usable keys in the snapshot.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the snapshot holds no usable keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Outcome of a refresh attempt, internal to the client.
enum RefreshError {
    /// Skipped: a refresh attempt happened too recently. Carries the
    /// failure reason when that recent attempt was a failed fetch, so
    /// a cold-start outage is reported as unreachable rather than as
    /// an unknown key.
    RateLimited { last_failure: Option<String> },
    /// The fetch itself failed (network, status, timeout, parse).
    Fetch(String),
}

/// Record of the most recent refresh attempt.
struct RefreshAttempt {
    at: Instant,
    /// Fetch failure reason, `None` when the attempt succeeded or is
    /// still in flight.
    failure: Option<String>,
}

/// Thread-safe client for the provider key-set endpoint.
///
/// Lookups read the current snapshot without blocking on refreshes;
/// refreshes install a complete new snapshot under a short write lock.
pub struct KeySetClient {
    /// URL of the provider's key-set endpoint.
    jwks_url: String,

    /// HTTP client with a bounded request timeout.
    http_client: reqwest::Client,

    /// Current snapshot, if any fetch has succeeded yet.
    cache: RwLock<Option<Arc<KeySetSnapshot>>>,

    /// Snapshot TTL before a lookup triggers a refresh.
    cache_ttl: Duration,

    /// Minimum interval between refresh attempts.
    min_refresh_interval: Duration,

    /// The last refresh attempt (success or failure).
    last_refresh_attempt: RwLock<Option<RefreshAttempt>>,
}

impl KeySetClient {
    /// Create a client with default TTL, refresh interval, and timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_options(
            jwks_url,
            DEFAULT_CACHE_TTL,
            DEFAULT_MIN_REFRESH_INTERVAL,
            DEFAULT_FETCH_TIMEOUT,
        )
    }

    /// Create a client with explicit cache and fetch bounds.
    pub fn with_options(
        jwks_url: String,
        cache_ttl: Duration,
        min_refresh_interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(
                    target: "authn.keyset",
                    error = %e,
                    "Failed to build HTTP client with custom config, using defaults"
                );
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            cache_ttl,
            min_refresh_interval,
            last_refresh_attempt: RwLock::new(None),
        }
    }

    /// The configured key-set endpoint URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    async fn current(&self) -> Option<Arc<KeySetSnapshot>> {
        self.cache.read().await.as_ref().map(Arc::clone)
    }

    /// Resolve a verification key by id.
    ///
    /// A miss against a fresh snapshot triggers at most one refresh and
    /// one retry; a miss within the refresh rate-limit window resolves
    /// against the existing snapshot only.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnknownKey` when the id is absent after the single
    ///   permitted refresh.
    /// - `AuthError::ProviderUnreachable` when the fetch failed and no
    ///   cached snapshot could satisfy the lookup.
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        let cached = self.current().await;

        if let Some(snapshot) = &cached {
            if !snapshot.is_expired(self.cache_ttl) {
                if let Some(key) = snapshot.keys.get(kid) {
                    tracing::debug!(target: "authn.keyset", kid = %kid, "Key set cache hit");
                    return Ok(key.clone());
                }
            }
        }

        match self.refresh().await {
            Ok(fresh) => fresh.keys.get(kid).cloned().ok_or_else(|| {
                tracing::debug!(
                    target: "authn.keyset",
                    kid = %kid,
                    "Key not found in key set after refresh"
                );
                AuthError::UnknownKey
            }),
            Err(RefreshError::RateLimited { last_failure }) => {
                // A concurrent caller may have installed a fresh snapshot
                // already; re-read rather than reusing the earlier view.
                let current = self.current().await;
                match current.as_ref().and_then(|s| s.keys.get(kid).cloned()) {
                    Some(key) => Ok(key),
                    // No snapshot at all and the attempt inside the
                    // window was a failed fetch: the provider is the
                    // problem, not the key id.
                    None if current.is_none() => match last_failure {
                        Some(reason) => Err(AuthError::ProviderUnreachable(reason)),
                        None => Err(AuthError::UnknownKey),
                    },
                    None => Err(AuthError::UnknownKey),
                }
            }
            Err(RefreshError::Fetch(reason)) => cached
                .as_ref()
                .and_then(|s| s.keys.get(kid).cloned())
                .ok_or(AuthError::ProviderUnreachable(reason)),
        }
    }

    /// Resolve the key for a token that declared no key id.
    ///
    /// Only unambiguous sets qualify: when the snapshot holds exactly
    /// one key, that key is returned; zero or several candidates are an
    /// `UnknownKey` failure.
    pub async fn single_key(&self) -> Result<Jwk, AuthError> {
        let cached = self.current().await;

        let snapshot = match &cached {
            Some(s) if !s.is_expired(self.cache_ttl) => Arc::clone(s),
            _ => match self.refresh().await {
                Ok(fresh) => fresh,
                Err(RefreshError::RateLimited { last_failure }) => match cached.clone() {
                    Some(snapshot) => snapshot,
                    None => {
                        return Err(match last_failure {
                            Some(reason) => AuthError::ProviderUnreachable(reason),
                            None => AuthError::UnknownKey,
                        })
                    }
                },
                Err(RefreshError::Fetch(reason)) => cached
                    .clone()
                    .ok_or(AuthError::ProviderUnreachable(reason))?,
            },
        };

        let mut keys = snapshot.keys.values();
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key.clone()),
            (Some(_), Some(_)) => {
                tracing::debug!(
                    target: "authn.keyset",
                    key_count = snapshot.keys.len(),
                    "Token without kid rejected: multiple candidate keys"
                );
                Err(AuthError::UnknownKey)
            }
            (None, _) => Err(AuthError::UnknownKey),
        }
    }

    /// Fetch the provider key set and install it as the new snapshot.
    async fn refresh(&self) -> Result<Arc<KeySetSnapshot>, RefreshError> {
        {
            let mut last = self.last_refresh_attempt.write().await;
            if let Some(attempt) = last.as_ref() {
                if attempt.at.elapsed() < self.min_refresh_interval {
                    tracing::debug!(
                        target: "authn.keyset",
                        since_last_ms = attempt.at.elapsed().as_millis(),
                        "Key set refresh rate limited, using existing cache"
                    );
                    return Err(RefreshError::RateLimited {
                        last_failure: attempt.failure.clone(),
                    });
                }
            }
            // Recorded before the fetch so failures also count against
            // the rate limit.
            *last = Some(RefreshAttempt {
                at: Instant::now(),
                failure: None,
            });
        }

        let snapshot = match self.fetch_key_set().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(reason) => {
                let mut last = self.last_refresh_attempt.write().await;
                if let Some(attempt) = last.as_mut() {
                    attempt.failure = Some(reason.clone());
                }
                return Err(RefreshError::Fetch(reason));
            }
        };

        let mut cache = self.cache.write().await;
        *cache = Some(Arc::clone(&snapshot));

        Ok(snapshot)
    }

    async fn fetch_key_set(&self) -> Result<KeySetSnapshot, String> {
        tracing::debug!(target: "authn.keyset", url = %self.jwks_url, "Fetching provider key set");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "authn.keyset", error = %e, "Failed to fetch key set");
                format!("key set fetch failed: {e}")
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: "authn.keyset",
                status = %response.status(),
                "Key set endpoint returned error status"
            );
            return Err(format!(
                "key set endpoint returned status {}",
                response.status()
            ));
        }

        let body: KeySetResponse = response.json().await.map_err(|e| {
            tracing::warn!(target: "authn.keyset", error = %e, "Failed to parse key set response");
            format!("key set response unparsable: {e}")
        })?;

        let snapshot = KeySetSnapshot::from_entries(body.keys);

        tracing::info!(
            target: "authn.keyset",
            key_count = snapshot.keys.len(),
            "Key set cache refreshed"
        );

        Ok(snapshot)
    }
}
