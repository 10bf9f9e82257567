//! Mock key-set endpoint for tests
//!
//! JWK JSON builders plus a wiremock-backed server standing in for the
//! identity provider's key-set endpoint.

use crate::crypto_fixtures::TestKeypair;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock server publishes its key set under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Build a symmetric (`kty: oct`) JWK entry.
pub fn oct_jwk(kid: &str, secret: &[u8], alg: Option<&str>) -> Value {
    let mut entry = json!({
        "kty": "oct",
        "kid": kid,
        "k": URL_SAFE_NO_PAD.encode(secret),
    });
    if let Some(alg) = alg {
        entry["alg"] = json!(alg);
    }
    entry
}

/// Build an Ed25519 (`kty: OKP`) JWK entry.
pub fn okp_jwk(kid: &str, public_key: &[u8]) -> Value {
    json!({
        "kty": "OKP",
        "kid": kid,
        "crv": "Ed25519",
        "x": URL_SAFE_NO_PAD.encode(public_key),
        "alg": "EdDSA",
    })
}

/// Build an RSA JWK entry from raw modulus and exponent bytes.
pub fn rsa_jwk(kid: &str, n: &[u8], e: &[u8]) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "n": URL_SAFE_NO_PAD.encode(n),
        "e": URL_SAFE_NO_PAD.encode(e),
    })
}

impl TestKeypair {
    /// This keypair's public half as a JWK entry.
    pub fn to_jwk(&self, kid: &str) -> Value {
        okp_jwk(kid, &self.public_key)
    }
}

/// Wiremock harness standing in for a provider's key-set endpoint.
pub struct MockKeySetServer {
    server: MockServer,
}

impl MockKeySetServer {
    /// Start a fresh mock server with no mounted responses; requests
    /// against it 404 until [`set_keys`](Self::set_keys) or
    /// [`set_status`](Self::set_status) is called.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Full URL of the key-set endpoint.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Publish the given JWK entries, replacing any previous response.
    /// Previously received requests still count toward
    /// [`request_count`](Self::request_count).
    pub async fn set_keys(&self, keys: Vec<Value>) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .mount(&self.server)
            .await;
    }

    /// Publish the given JWK entries but delay every response, for
    /// exercising fetch timeouts.
    pub async fn set_keys_with_delay(&self, keys: Vec<Value>, delay: std::time::Duration) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "keys": keys }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Make the endpoint answer with a fixed error status.
    pub async fn set_status(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of key-set fetches the server has received so far.
    ///
    /// Note that [`set_keys`](Self::set_keys) resets wiremock's request
    /// log along with the mounted mocks, so counts are relative to the
    /// most recent mount.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}
