//! Token signature verification against a resolved key.
//!
//! Verification is signature-only: temporal and audience claims are
//! checked separately by [`crate::claims`] so the two failure classes
//! stay distinct in logs. The algorithm the token declares must belong
//! to the resolved key's family, and must equal the key's pinned
//! algorithm when the provider published one.

use crate::errors::AuthError;
use crate::keyset::{Jwk, KeyMaterial};
use crate::token::TokenHead;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};

/// Verified token payload, an arbitrary JSON object.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Verify a token's signature with the given key.
///
/// # Errors
///
/// - `AuthError::AlgorithmMismatch` when the declared algorithm is
///   outside the key's family or differs from a pinned algorithm.
/// - `AuthError::SignatureMismatch` when the signature does not verify.
/// - `AuthError::Malformed` when the payload is not a JSON object.
pub fn verify_signature(token: &str, head: &TokenHead, jwk: &Jwk) -> Result<Claims, AuthError> {
    if !jwk.family().allows(head.alg) {
        tracing::debug!(
            target: "authn.verify",
            token_alg = ?head.alg,
            key_family = ?jwk.family(),
            "Token algorithm outside the key's family"
        );
        return Err(AuthError::AlgorithmMismatch);
    }

    if let Some(pinned) = jwk.alg {
        if pinned != head.alg {
            tracing::debug!(
                target: "authn.verify",
                token_alg = ?head.alg,
                key_alg = ?pinned,
                "Token algorithm differs from the key's pinned algorithm"
            );
            return Err(AuthError::AlgorithmMismatch);
        }
    }

    let key = decoding_key(jwk)?;

    // Signature check only: temporal and audience validation happen in
    // the claims layer with an explicit clock.
    let mut validation = Validation::new(head.alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::InvalidToken => {
            tracing::debug!(target: "authn.verify", error = %e, "Token payload undecodable");
            AuthError::Malformed
        }
        _ => {
            tracing::debug!(target: "authn.verify", error = %e, "Signature verification failed");
            AuthError::SignatureMismatch
        }
    })?;

    Ok(data.claims)
}

/// Build a decoding key from the resolved key material.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    match &jwk.material {
        KeyMaterial::Oct { secret } => Ok(DecodingKey::from_secret(secret)),
        KeyMaterial::Rsa { n, e } => DecodingKey::from_rsa_components(n, e).map_err(|err| {
            tracing::warn!(
                target: "authn.verify",
                kid = %jwk.kid,
                error = %err,
                "RSA key components rejected"
            );
            AuthError::SignatureMismatch
        }),
        KeyMaterial::Okp { public_key } => Ok(DecodingKey::from_ed_der(public_key)),
    }
}
