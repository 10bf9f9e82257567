//! Credential-verification error types.
//!
//! Every rejection reason is a distinct variant so diagnostics can log
//! exactly which check failed, but `Display` renders the same generic
//! message for all token-level failures. Remote clients only ever see
//! that generic text; the variant itself stays server-side.

use thiserror::Error;

/// Reasons a presented credential can fail verification.
///
/// None of these is fatal to the process; each is a per-request outcome.
/// `ProviderUnreachable` carries the underlying fetch diagnostic, which
/// is logged but never rendered to clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token structure could not be parsed (size, segments, header).
    #[error("the access token is invalid or expired")]
    Malformed,

    /// Key id not present in the provider key set after one refresh.
    #[error("the access token is invalid or expired")]
    UnknownKey,

    /// Cryptographic verification failed against the resolved key.
    #[error("the access token is invalid or expired")]
    SignatureMismatch,

    /// Declared header algorithm does not belong to the key's family.
    #[error("the access token is invalid or expired")]
    AlgorithmMismatch,

    /// `exp` claim is in the past relative to now plus skew allowance.
    #[error("the access token is invalid or expired")]
    ClaimExpired,

    /// `nbf` claim is in the future relative to now minus skew allowance.
    #[error("the access token is invalid or expired")]
    ClaimNotYetValid,

    /// Policy requires an issuer the token does not carry or match.
    #[error("the access token is invalid or expired")]
    IssuerMismatch,

    /// Policy requires an audience the token does not carry or match.
    #[error("the access token is invalid or expired")]
    AudienceMismatch,

    /// Key-set fetch failed and no cached key could satisfy the lookup.
    #[error("authentication service unavailable")]
    ProviderUnreachable(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_failures_share_generic_message() {
        let variants = [
            AuthError::Malformed,
            AuthError::UnknownKey,
            AuthError::SignatureMismatch,
            AuthError::AlgorithmMismatch,
            AuthError::ClaimExpired,
            AuthError::ClaimNotYetValid,
            AuthError::IssuerMismatch,
            AuthError::AudienceMismatch,
        ];

        for variant in variants {
            assert_eq!(
                format!("{}", variant),
                "the access token is invalid or expired",
                "client-facing message must not reveal which check failed"
            );
        }
    }

    #[test]
    fn test_provider_unreachable_hides_diagnostic() {
        let error = AuthError::ProviderUnreachable("dns lookup failed".to_string());
        let message = format!("{}", error);

        assert_eq!(message, "authentication service unavailable");
        assert!(!message.contains("dns"));
    }
}
