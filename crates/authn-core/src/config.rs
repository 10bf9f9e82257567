//! Authenticator configuration.
//!
//! Configuration is loaded from environment variables; every option
//! that shapes verification policy or cache behavior is validated up
//! front so a bad deployment fails at startup, not per request.

use crate::claims::{ClaimsPolicy, DEFAULT_CLOCK_SKEW, DEFAULT_ROLES_CLAIM, DEFAULT_SUBJECT_CLAIM};
use crate::keyset::{
    KeySetClient, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, DEFAULT_MIN_REFRESH_INTERVAL,
};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on clock-skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Default realm quoted into challenge responses.
pub const DEFAULT_REALM: &str = "authn";

/// Authenticator configuration.
///
/// Loaded from environment variables with sensible defaults; only the
/// key-set URL is required.
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the identity provider's key-set endpoint.
    pub jwks_url: String,

    /// Required token issuer; unset accepts any.
    pub expected_issuer: Option<String>,

    /// Required token audience; unset accepts any.
    pub expected_audience: Option<String>,

    /// Claim name carrying the subject identifier.
    pub subject_claim: String,

    /// Claim name carrying roles.
    pub roles_claim: String,

    /// Clock skew tolerance in seconds for temporal claims.
    pub clock_skew_seconds: u64,

    /// Minimum seconds between key-set refresh attempts.
    pub min_refresh_interval_seconds: u64,

    /// Key-set cache TTL in seconds.
    pub cache_ttl_seconds: u64,

    /// Key-set fetch timeout in seconds.
    pub fetch_timeout_seconds: u64,

    /// Realm quoted into challenge responses.
    pub realm: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid {0} configuration: {1}")]
    InvalidDuration(&'static str, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwks_url = vars
            .get("AUTHN_JWKS_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTHN_JWKS_URL".to_string()))?
            .clone();

        let expected_issuer = vars.get("AUTHN_EXPECTED_ISSUER").cloned();
        let expected_audience = vars.get("AUTHN_EXPECTED_AUDIENCE").cloned();

        let subject_claim = vars
            .get("AUTHN_SUBJECT_CLAIM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SUBJECT_CLAIM.to_string());

        let roles_claim = vars
            .get("AUTHN_ROLES_CLAIM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROLES_CLAIM.to_string());

        // Parse clock skew with validation
        let clock_skew_seconds = if let Some(value_str) = vars.get("AUTHN_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "AUTHN_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidClockSkew(
                    "AUTHN_CLOCK_SKEW_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "AUTHN_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs()
        };

        let min_refresh_interval_seconds = parse_seconds(
            vars,
            "AUTHN_MIN_REFRESH_INTERVAL_SECONDS",
            DEFAULT_MIN_REFRESH_INTERVAL.as_secs(),
            // Zero disables refresh rate limiting, which is valid in tests.
            true,
        )?;

        let cache_ttl_seconds = parse_seconds(
            vars,
            "AUTHN_CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL.as_secs(),
            false,
        )?;

        let fetch_timeout_seconds = parse_seconds(
            vars,
            "AUTHN_FETCH_TIMEOUT_SECONDS",
            DEFAULT_FETCH_TIMEOUT.as_secs(),
            false,
        )?;

        let realm = vars
            .get("AUTHN_REALM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REALM.to_string());

        Ok(Config {
            jwks_url,
            expected_issuer,
            expected_audience,
            subject_claim,
            roles_claim,
            clock_skew_seconds,
            min_refresh_interval_seconds,
            cache_ttl_seconds,
            fetch_timeout_seconds,
            realm,
        })
    }

    /// Claim-validation policy derived from this configuration.
    pub fn claims_policy(&self) -> ClaimsPolicy {
        ClaimsPolicy {
            expected_issuer: self.expected_issuer.clone(),
            expected_audience: self.expected_audience.clone(),
            subject_claim: self.subject_claim.clone(),
            roles_claim: self.roles_claim.clone(),
            clock_skew: Duration::from_secs(self.clock_skew_seconds),
        }
    }

    /// Key-set client configured from this configuration.
    pub fn key_set_client(&self) -> KeySetClient {
        KeySetClient::with_options(
            self.jwks_url.clone(),
            Duration::from_secs(self.cache_ttl_seconds),
            Duration::from_secs(self.min_refresh_interval_seconds),
            Duration::from_secs(self.fetch_timeout_seconds),
        )
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: u64,
    allow_zero: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(
            name,
            format!("must be a valid positive integer, got '{}': {}", value_str, e),
        )
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidDuration(
            name,
            "must be greater than 0".to_string(),
        ));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn minimal_vars() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert(
            "AUTHN_JWKS_URL".to_string(),
            "http://localhost:8082/.well-known/jwks.json".to_string(),
        );
        vars
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_vars(&minimal_vars()).unwrap();

        assert_eq!(
            config.jwks_url,
            "http://localhost:8082/.well-known/jwks.json"
        );
        assert_eq!(config.expected_issuer, None);
        assert_eq!(config.expected_audience, None);
        assert_eq!(config.subject_claim, "sub");
        assert_eq!(config.roles_claim, "roles");
        assert_eq!(config.clock_skew_seconds, 300);
        assert_eq!(config.min_refresh_interval_seconds, 10);
        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.fetch_timeout_seconds, 10);
        assert_eq!(config.realm, "authn");
    }

    #[test]
    fn test_missing_jwks_url_fails() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_clock_skew_bounds() {
        let mut vars = minimal_vars();

        vars.insert("AUTHN_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidClockSkew(_))
        ));

        vars.insert("AUTHN_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidClockSkew(_))
        ));

        vars.insert("AUTHN_CLOCK_SKEW_SECONDS".to_string(), "60".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().clock_skew_seconds, 60);

        vars.insert(
            "AUTHN_CLOCK_SKEW_SECONDS".to_string(),
            "not-a-number".to_string(),
        );
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidClockSkew(_))
        ));
    }

    #[test]
    fn test_zero_refresh_interval_allowed() {
        let mut vars = minimal_vars();
        vars.insert(
            "AUTHN_MIN_REFRESH_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.min_refresh_interval_seconds, 0);
    }

    #[test]
    fn test_zero_cache_ttl_rejected() {
        let mut vars = minimal_vars();
        vars.insert("AUTHN_CACHE_TTL_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidDuration("AUTHN_CACHE_TTL_SECONDS", _))
        ));
    }

    #[test]
    fn test_policy_from_config() {
        let mut vars = minimal_vars();
        vars.insert(
            "AUTHN_EXPECTED_ISSUER".to_string(),
            "https://idp.example".to_string(),
        );
        vars.insert(
            "AUTHN_EXPECTED_AUDIENCE".to_string(),
            "test_audience".to_string(),
        );
        vars.insert("AUTHN_ROLES_CLAIM".to_string(), "groups".to_string());

        let policy = Config::from_vars(&vars).unwrap().claims_policy();

        assert_eq!(policy.expected_issuer.as_deref(), Some("https://idp.example"));
        assert_eq!(policy.expected_audience.as_deref(), Some("test_audience"));
        assert_eq!(policy.roles_claim, "groups");
        assert_eq!(policy.subject_claim, "sub");
        assert_eq!(policy.clock_skew, Duration::from_secs(300));
    }
}
