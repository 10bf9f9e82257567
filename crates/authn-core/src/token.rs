//! Compact-token structural parsing.
//!
//! Decodes only the token header (algorithm, key id) without verifying
//! anything. The token is size-checked before any base64 or JSON work,
//! and the raw compact string is kept intact for signature verification
//! so the signing input is exactly the transmitted bytes.

use crate::errors::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Algorithm;
use std::str::FromStr;

/// Maximum allowed compact token size in bytes (8 KiB).
///
/// Tokens larger than this are rejected before any decoding happens.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Unverified header fields of a compact token.
///
/// `kid` is `None` when the header carries no key id; a present but
/// empty or non-string `kid` is rejected as malformed rather than
/// mapped to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHead {
    /// Declared signing algorithm.
    pub alg: Algorithm,

    /// Declared key id, used only to look up the verification key.
    pub kid: Option<String>,
}

/// Parse the header segment of a compact token.
///
/// # Errors
///
/// Returns `AuthError::Malformed` when the token exceeds
/// [`MAX_TOKEN_SIZE_BYTES`], is not three dot-separated segments, the
/// header segment is not base64url-encoded JSON, the `alg` field is
/// missing or names no supported algorithm (`none` included), or the
/// `kid` field is present but not a non-empty JSON string.
pub fn parse_head(token: &str) -> Result<TokenHead, AuthError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "authn.token",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::Malformed);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "authn.token",
            parts = parts.len(),
            "Token rejected: not a three-segment compact serialization"
        );
        return Err(AuthError::Malformed);
    }

    let header_part = parts.first().ok_or(AuthError::Malformed)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "authn.token", error = %e, "Failed to decode token header base64");
        AuthError::Malformed
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "authn.token", error = %e, "Failed to parse token header JSON");
        AuthError::Malformed
    })?;

    let alg_name = header
        .get("alg")
        .and_then(|v| v.as_str())
        .ok_or(AuthError::Malformed)?;

    // `Algorithm::from_str` rejects "none" and unknown names outright.
    let alg = Algorithm::from_str(alg_name).map_err(|e| {
        tracing::debug!(target: "authn.token", alg = %alg_name, error = %e, "Unsupported token algorithm");
        AuthError::Malformed
    })?;

    let kid = match header.get("kid") {
        None => None,
        Some(value) => {
            // A declared kid must be a non-empty string; the JSON parser
            // has already canonicalized any escapes at this point.
            let kid = value
                .as_str()
                .filter(|s| !s.is_empty())
                .ok_or(AuthError::Malformed)?;
            Some(kid.to_string())
        }
    };

    Ok(TokenHead { alg, kid })
}
