//! Bearer-token authentication core.
//!
//! Verifies provider-signed bearer tokens presented on incoming
//! requests and turns them into credentials for downstream
//! authorization:
//!
//! - Key-set resolution against an identity provider's published keys,
//!   with snapshot caching and rate-limited refresh
//! - Signature verification with algorithm-family enforcement
//! - Claim validation (expiry, not-before, issuer, audience) plus
//!   subject and role extraction
//! - An authenticator façade implementing the two-phase
//!   extract / re-challenge protocol used by authenticator chains
//!
//! # Pipeline
//!
//! ```text
//! headers -> token::parse_head -> keyset::KeySetClient
//!         -> verify::verify_signature -> claims::validate
//!         -> Credential
//! ```

pub mod authenticator;
pub mod challenge;
pub mod claims;
pub mod config;
pub mod credential;
pub mod errors;
pub mod keyset;
pub mod token;
pub mod verify;

pub use authenticator::{AuthOutcome, HttpAuthenticator, JwtAuthenticator};
pub use claims::ClaimsPolicy;
pub use config::{Config, ConfigError};
pub use credential::Credential;
pub use errors::AuthError;
pub use keyset::KeySetClient;
