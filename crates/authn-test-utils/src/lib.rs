//! # Authn Test Utilities
//!
//! Shared test utilities for the bearer-token authentication core.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed HMAC secrets and Ed25519
//!   keypairs for reproducible tests)
//! - Token builders (claims builder plus signing helpers)
//! - A mock key-set server harness built on wiremock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authn_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = TestKeypair::from_seed(1);
//!     let server = MockKeySetServer::start().await;
//!     server.set_keys(vec![keypair.to_jwk("kid/a")]).await;
//!
//!     let token = TestClaimsBuilder::new()
//!         .subject("Leonard McCoy")
//!         .roles("role1,role2")
//!         .sign_eddsa("kid/a", &keypair);
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use jwks::*;
pub use token_builders::*;
