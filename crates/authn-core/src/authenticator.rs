//! Bearer-token authenticator façade.
//!
//! Ties the pipeline together: header extraction, structural parse,
//! key resolution, signature verification, claim validation. Each call
//! is stateless; the shared key-set cache is the only cross-request
//! state. Implementations of [`HttpAuthenticator`] are selected by
//! configuration and invoked in a chain by the surrounding pipeline,
//! which falls back to [`crate::challenge`] when no authenticator
//! completes a credential.

use crate::claims::{self, ClaimsPolicy};
use crate::credential::Credential;
use crate::errors::AuthError;
use crate::keyset::KeySetClient;
use crate::token;
use crate::verify;
use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, AUTHORIZATION};
use http::Response;
use std::sync::Arc;

/// Scheme prefix for bearer credentials, matched exactly.
const BEARER_PREFIX: &str = "Bearer ";

/// Result of one authenticator's extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A fully verified credential.
    Authenticated(Credential),

    /// The request carried no credentials this authenticator owns; the
    /// caller should try the next authenticator in its chain.
    NoCredentials,

    /// Credentials were presented but failed verification. The reason
    /// stays in diagnostics; callers surface a generic failure.
    Failed(AuthError),
}

/// One authenticator in the pipeline's chain.
///
/// The protocol is two-phase: `extract_credentials` runs on the way
/// in, and `re_request_authentication` is consulted when the chain
/// ends without a completed credential, letting multi-round schemes
/// issue their own challenge.
#[async_trait]
pub trait HttpAuthenticator: Send + Sync {
    /// Short name for logs.
    fn kind(&self) -> &'static str;

    /// Attempt to authenticate the request from its headers.
    async fn extract_credentials(&self, headers: &HeaderMap) -> AuthOutcome;

    /// Challenge response for a failed round, if this scheme has one.
    /// `None` means the caller falls back to the global challenge.
    fn re_request_authentication(&self) -> Option<Response<String>>;
}

/// Authenticator for provider-signed bearer tokens.
pub struct JwtAuthenticator {
    keys: Arc<KeySetClient>,
    policy: ClaimsPolicy,
    header_name: HeaderName,
}

impl JwtAuthenticator {
    /// Build an authenticator wired from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            Arc::new(config.key_set_client()),
            config.claims_policy(),
        )
    }

    /// Create an authenticator reading the standard `Authorization`
    /// header.
    pub fn new(keys: Arc<KeySetClient>, policy: ClaimsPolicy) -> Self {
        Self {
            keys,
            policy,
            header_name: AUTHORIZATION,
        }
    }

    /// Read credentials from a non-standard header instead.
    #[must_use]
    pub fn with_header_name(mut self, header_name: HeaderName) -> Self {
        self.header_name = header_name;
        self
    }

    /// Pull the bearer token out of the configured header.
    ///
    /// Missing header, undecodable value, or a non-bearer scheme all
    /// yield `None`: another authenticator may own that scheme.
    fn bearer_token<'h>(&self, headers: &'h HeaderMap) -> Option<&'h str> {
        headers
            .get(&self.header_name)?
            .to_str()
            .ok()?
            .strip_prefix(BEARER_PREFIX)
    }

    async fn verify_token(&self, raw: &str) -> Result<Credential, AuthError> {
        let head = token::parse_head(raw)?;

        let jwk = match &head.kid {
            Some(kid) => self.keys.get_key(kid).await?,
            None => self.keys.single_key().await?,
        };

        let token_claims = verify::verify_signature(raw, &head, &jwk)?;
        let validated = claims::validate(&token_claims, &self.policy)?;

        Ok(Credential::new(validated.subject, validated.roles).mark_complete())
    }
}

#[async_trait]
impl HttpAuthenticator for JwtAuthenticator {
    fn kind(&self) -> &'static str {
        "jwt"
    }

    async fn extract_credentials(&self, headers: &HeaderMap) -> AuthOutcome {
        let Some(raw) = self.bearer_token(headers) else {
            tracing::debug!(
                target: "authn.authenticator",
                authenticator = self.kind(),
                "No bearer credentials presented"
            );
            return AuthOutcome::NoCredentials;
        };

        match self.verify_token(raw).await {
            Ok(credential) => {
                tracing::debug!(
                    target: "authn.authenticator",
                    authenticator = self.kind(),
                    subject = %credential.subject(),
                    role_count = credential.roles().len(),
                    "Token verified"
                );
                AuthOutcome::Authenticated(credential)
            }
            Err(reason) => {
                // The exact reason stays here; the client-facing message
                // is the generic one on AuthError's Display.
                tracing::debug!(
                    target: "authn.authenticator",
                    authenticator = self.kind(),
                    reason = ?reason,
                    "Token rejected"
                );
                AuthOutcome::Failed(reason)
            }
        }
    }

    /// Bearer tokens are single-round; there is no scheme-specific
    /// challenge, so the caller falls back to the global one.
    fn re_request_authentication(&self) -> Option<Response<String>> {
        None
    }
}
