//! Builder patterns for test token construction
//!
//! Provides a fluent API for creating signed (and deliberately broken)
//! test tokens.

use crate::crypto_fixtures::TestKeypair;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

/// Builder for test JWT claim sets.
///
/// # Example
/// ```rust,ignore
/// let token = TestClaimsBuilder::new()
///     .subject("Leonard McCoy")
///     .roles("role1,role2")
///     .expires_in(3600)
///     .sign_hs256(Some("kid/a"), b"secret");
/// ```
pub struct TestClaimsBuilder {
    claims: serde_json::Map<String, Value>,
}

impl TestClaimsBuilder {
    /// Create a builder with a default subject and no other claims.
    pub fn new() -> Self {
        let mut claims = serde_json::Map::new();
        claims.insert("sub".to_string(), json!("test-subject"));
        Self { claims }
    }

    /// Set the subject claim.
    pub fn subject(mut self, subject: &str) -> Self {
        self.claims.insert("sub".to_string(), json!(subject));
        self
    }

    /// Remove the subject claim entirely.
    pub fn without_subject(mut self) -> Self {
        self.claims.remove("sub");
        self
    }

    /// Set the issuer claim.
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.claims.insert("iss".to_string(), json!(issuer));
        self
    }

    /// Set a single-string audience claim.
    pub fn audience(mut self, audience: &str) -> Self {
        self.claims.insert("aud".to_string(), json!(audience));
        self
    }

    /// Set an array-shaped audience claim.
    pub fn audiences(mut self, audiences: &[&str]) -> Self {
        self.claims.insert("aud".to_string(), json!(audiences));
        self
    }

    /// Set a comma-delimited roles claim.
    pub fn roles(mut self, roles: &str) -> Self {
        self.claims.insert("roles".to_string(), json!(roles));
        self
    }

    /// Set an array-shaped roles claim.
    pub fn roles_list(mut self, roles: &[&str]) -> Self {
        self.claims.insert("roles".to_string(), json!(roles));
        self
    }

    /// Set an absolute expiry timestamp.
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.claims.insert("exp".to_string(), json!(exp));
        self
    }

    /// Set expiry relative to now, in seconds (negative for expired).
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.expires_at(exp)
    }

    /// Set an absolute not-before timestamp.
    pub fn not_before(mut self, nbf: i64) -> Self {
        self.claims.insert("nbf".to_string(), json!(nbf));
        self
    }

    /// Set not-before relative to now, in seconds.
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.not_before(nbf)
    }

    /// Set an arbitrary claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Build the claim set as a JSON value.
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign the claims with HS256 over the given secret.
    pub fn sign_hs256(self, kid: Option<&str>, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = kid.map(str::to_string);
        encode(&header, &self.build(), &EncodingKey::from_secret(secret))
            .expect("HS256 signing of test claims cannot fail")
    }

    /// Sign the claims with EdDSA over the given test keypair.
    pub fn sign_eddsa(self, kid: Option<&str>, keypair: &TestKeypair) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_ed_der(&keypair.pkcs8);
        encode(&header, &self.build(), &key).expect("EdDSA signing of test claims cannot fail")
    }
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble an unsigned `alg: none` token with an empty signature
/// segment.
pub fn unsigned_token(claims: &Value) -> String {
    let header = json!({ "alg": "none" });
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Assemble a token from an arbitrary header, claims, and raw
/// signature bytes, bypassing any real signing.
pub fn token_with_header(header: &Value, claims: &Value, signature: &[u8]) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}
