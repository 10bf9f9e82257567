//! Claim validation for verified token payloads.
//!
//! Runs after signature verification, so every claim here is
//! provider-asserted. Expiry and not-before are always enforced when
//! present; issuer and audience are enforced only when the policy
//! names an expected value. All comparisons take an explicit `now` so
//! boundary behavior is testable without a real clock.

use crate::errors::AuthError;
use crate::verify::Claims;
use std::time::Duration;

/// Default clock-skew allowance (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Default claim name carrying the subject identifier.
pub const DEFAULT_SUBJECT_CLAIM: &str = "sub";

/// Default claim name carrying roles.
pub const DEFAULT_ROLES_CLAIM: &str = "roles";

/// Policy for claim validation and identity extraction.
#[derive(Debug, Clone)]
pub struct ClaimsPolicy {
    /// Required `iss` value; `None` accepts any issuer including none.
    pub expected_issuer: Option<String>,

    /// Required audience; `None` accepts any `aud` including none.
    /// When set, matches a single-string `aud` by equality or any
    /// member of an array `aud`.
    pub expected_audience: Option<String>,

    /// Claim name carrying the subject identifier.
    pub subject_claim: String,

    /// Claim name carrying roles, either a comma-delimited string or
    /// an array of strings.
    pub roles_claim: String,

    /// Allowance for clock drift between this host and the provider.
    pub clock_skew: Duration,
}

impl Default for ClaimsPolicy {
    fn default() -> Self {
        Self {
            expected_issuer: None,
            expected_audience: None,
            subject_claim: DEFAULT_SUBJECT_CLAIM.to_string(),
            roles_claim: DEFAULT_ROLES_CLAIM.to_string(),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Identity extracted from a validated claim set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaims {
    /// Subject identifier from the configured subject claim.
    pub subject: String,

    /// Roles from the configured roles claim, deduplicated, in claim
    /// order. Empty when the claim is absent.
    pub roles: Vec<String>,
}

/// Validate claims against the policy using the current wall clock.
///
/// # Errors
///
/// See [`validate_at`].
pub fn validate(claims: &Claims, policy: &ClaimsPolicy) -> Result<ValidatedClaims, AuthError> {
    validate_at(claims, policy, chrono::Utc::now().timestamp())
}

/// Validate claims against the policy at an explicit Unix time.
///
/// # Errors
///
/// - `AuthError::ClaimExpired` when `now >= exp + skew`.
/// - `AuthError::ClaimNotYetValid` when `now < nbf - skew`.
/// - `AuthError::IssuerMismatch` / `AuthError::AudienceMismatch` when
///   the policy names an expected value the token does not satisfy.
/// - `AuthError::Malformed` when a temporal claim is not an integer or
///   the subject claim is missing or not a string.
pub fn validate_at(
    claims: &Claims,
    policy: &ClaimsPolicy,
    now: i64,
) -> Result<ValidatedClaims, AuthError> {
    let skew = i64::try_from(policy.clock_skew.as_secs()).unwrap_or(i64::MAX);

    if let Some(exp) = numeric_claim(claims, "exp")? {
        if now >= exp.saturating_add(skew) {
            tracing::debug!(
                target: "authn.claims",
                exp,
                now,
                skew_seconds = skew,
                "Token expired"
            );
            return Err(AuthError::ClaimExpired);
        }
    }

    if let Some(nbf) = numeric_claim(claims, "nbf")? {
        if now < nbf.saturating_sub(skew) {
            tracing::debug!(
                target: "authn.claims",
                nbf,
                now,
                skew_seconds = skew,
                "Token not yet valid"
            );
            return Err(AuthError::ClaimNotYetValid);
        }
    }

    if let Some(expected) = &policy.expected_issuer {
        match claims.get("iss").and_then(|v| v.as_str()) {
            Some(iss) if iss == expected => {}
            other => {
                tracing::debug!(
                    target: "authn.claims",
                    expected = %expected,
                    presented = ?other,
                    "Issuer mismatch"
                );
                return Err(AuthError::IssuerMismatch);
            }
        }
    }

    if let Some(expected) = &policy.expected_audience {
        let matched = match claims.get("aud") {
            Some(serde_json::Value::String(aud)) => aud == expected,
            Some(serde_json::Value::Array(entries)) => entries
                .iter()
                .any(|v| v.as_str() == Some(expected.as_str())),
            _ => false,
        };
        if !matched {
            tracing::debug!(target: "authn.claims", expected = %expected, "Audience mismatch");
            return Err(AuthError::AudienceMismatch);
        }
    }

    let subject = claims
        .get(policy.subject_claim.as_str())
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            tracing::debug!(
                target: "authn.claims",
                claim = %policy.subject_claim,
                "Subject claim missing or not a string"
            );
            AuthError::Malformed
        })?;

    let roles = extract_roles(claims, &policy.roles_claim);

    Ok(ValidatedClaims { subject, roles })
}

/// Read an integer temporal claim; non-integer presence is malformed.
fn numeric_claim(claims: &Claims, name: &str) -> Result<Option<i64>, AuthError> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            tracing::debug!(target: "authn.claims", claim = %name, "Temporal claim is not an integer");
            AuthError::Malformed
        }),
    }
}

/// Normalize the roles claim into a deduplicated list.
///
/// Accepts a comma-delimited string or an array of strings; anything
/// else is treated as no roles. Whitespace around delimited entries is
/// trimmed and empty entries are dropped.
fn extract_roles(claims: &Claims, roles_claim: &str) -> Vec<String> {
    let mut roles: Vec<String> = Vec::new();
    let mut push = |role: &str| {
        let role = role.trim();
        if !role.is_empty() && !roles.iter().any(|r| r == role) {
            roles.push(role.to_string());
        }
    };

    match claims.get(roles_claim) {
        None => {}
        Some(serde_json::Value::String(delimited)) => {
            for role in delimited.split(',') {
                push(role);
            }
        }
        Some(serde_json::Value::Array(entries)) => {
            for entry in entries {
                if let Some(role) = entry.as_str() {
                    push(role);
                }
            }
        }
        Some(other) => {
            tracing::warn!(
                target: "authn.claims",
                claim = %roles_claim,
                value_type = %json_type_name(other),
                "Roles claim has unsupported shape, ignoring"
            );
        }
    }

    roles
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_of(value: serde_json::Value) -> Claims {
        match value {
            serde_json::Value::Object(map) => map,
            other => unreachable!("test claims must be an object, got {other:?}"),
        }
    }

    fn policy_with_skew(skew_seconds: u64) -> ClaimsPolicy {
        ClaimsPolicy {
            clock_skew: Duration::from_secs(skew_seconds),
            ..ClaimsPolicy::default()
        }
    }

    #[test]
    fn test_validate_minimal_claims() {
        let claims = claims_of(json!({ "sub": "Leonard McCoy" }));
        let validated = validate_at(&claims, &ClaimsPolicy::default(), 1_700_000_000).unwrap();

        assert_eq!(validated.subject, "Leonard McCoy");
        assert!(validated.roles.is_empty());
    }

    #[test]
    fn test_expiry_boundary_with_skew() {
        let policy = policy_with_skew(30);
        let claims = claims_of(json!({ "sub": "u", "exp": 1000 }));

        // Still inside the skew window.
        assert!(validate_at(&claims, &policy, 1029).is_ok());
        // Exactly at the boundary: rejected.
        assert_eq!(
            validate_at(&claims, &policy, 1030).unwrap_err(),
            AuthError::ClaimExpired
        );
        assert_eq!(
            validate_at(&claims, &policy, 5000).unwrap_err(),
            AuthError::ClaimExpired
        );
    }

    #[test]
    fn test_not_before_boundary_with_skew() {
        let policy = policy_with_skew(30);
        let claims = claims_of(json!({ "sub": "u", "nbf": 1000 }));

        assert_eq!(
            validate_at(&claims, &policy, 969).unwrap_err(),
            AuthError::ClaimNotYetValid
        );
        // The skew window opens the token early.
        assert!(validate_at(&claims, &policy, 970).is_ok());
        assert!(validate_at(&claims, &policy, 1000).is_ok());
    }

    #[test]
    fn test_non_integer_temporal_claim_is_malformed() {
        let policy = ClaimsPolicy::default();
        let claims = claims_of(json!({ "sub": "u", "exp": "soon" }));

        assert_eq!(
            validate_at(&claims, &policy, 0).unwrap_err(),
            AuthError::Malformed
        );
    }

    #[test]
    fn test_issuer_enforced_only_when_configured() {
        let claims = claims_of(json!({ "sub": "u", "iss": "https://idp.example" }));

        // No policy: any issuer accepted.
        assert!(validate_at(&claims, &ClaimsPolicy::default(), 0).is_ok());

        let policy = ClaimsPolicy {
            expected_issuer: Some("https://idp.example".to_string()),
            ..ClaimsPolicy::default()
        };
        assert!(validate_at(&claims, &policy, 0).is_ok());

        let wrong = ClaimsPolicy {
            expected_issuer: Some("https://other.example".to_string()),
            ..ClaimsPolicy::default()
        };
        assert_eq!(
            validate_at(&claims, &wrong, 0).unwrap_err(),
            AuthError::IssuerMismatch
        );

        // Policy requires an issuer the token never presents.
        let absent = claims_of(json!({ "sub": "u" }));
        assert_eq!(
            validate_at(&absent, &policy, 0).unwrap_err(),
            AuthError::IssuerMismatch
        );
    }

    #[test]
    fn test_audience_single_value_and_set() {
        let policy = ClaimsPolicy {
            expected_audience: Some("test_audience".to_string()),
            ..ClaimsPolicy::default()
        };

        let single = claims_of(json!({ "sub": "u", "aud": "test_audience" }));
        assert!(validate_at(&single, &policy, 0).is_ok());

        let set = claims_of(json!({ "sub": "u", "aud": ["other", "test_audience"] }));
        assert!(validate_at(&set, &policy, 0).is_ok());

        let wrong = claims_of(json!({ "sub": "u", "aud": ["other"] }));
        assert_eq!(
            validate_at(&wrong, &policy, 0).unwrap_err(),
            AuthError::AudienceMismatch
        );

        let absent = claims_of(json!({ "sub": "u" }));
        assert_eq!(
            validate_at(&absent, &policy, 0).unwrap_err(),
            AuthError::AudienceMismatch
        );

        // Without a configured audience, any shape is accepted.
        assert!(validate_at(&wrong, &ClaimsPolicy::default(), 0).is_ok());
    }

    #[test]
    fn test_roles_from_delimited_string() {
        let claims = claims_of(json!({ "sub": "u", "roles": "role1, role2,role1,, role3" }));
        let validated = validate_at(&claims, &ClaimsPolicy::default(), 0).unwrap();

        assert_eq!(validated.roles, vec!["role1", "role2", "role3"]);
    }

    #[test]
    fn test_roles_from_array() {
        let claims = claims_of(json!({ "sub": "u", "roles": ["admin", "audit", "admin"] }));
        let validated = validate_at(&claims, &ClaimsPolicy::default(), 0).unwrap();

        assert_eq!(validated.roles, vec!["admin", "audit"]);
    }

    #[test]
    fn test_roles_unsupported_shape_yields_empty() {
        let claims = claims_of(json!({ "sub": "u", "roles": 42 }));
        let validated = validate_at(&claims, &ClaimsPolicy::default(), 0).unwrap();

        assert!(validated.roles.is_empty());
    }

    #[test]
    fn test_custom_subject_and_roles_claim_names() {
        let policy = ClaimsPolicy {
            subject_claim: "preferred_username".to_string(),
            roles_claim: "groups".to_string(),
            ..ClaimsPolicy::default()
        };
        let claims = claims_of(json!({
            "sub": "ignored",
            "preferred_username": "mccoy",
            "groups": ["crew"],
        }));

        let validated = validate_at(&claims, &policy, 0).unwrap();
        assert_eq!(validated.subject, "mccoy");
        assert_eq!(validated.roles, vec!["crew"]);
    }

    #[test]
    fn test_missing_subject_is_malformed() {
        let claims = claims_of(json!({ "roles": "admin" }));
        assert_eq!(
            validate_at(&claims, &ClaimsPolicy::default(), 0).unwrap_err(),
            AuthError::Malformed
        );

        let non_string = claims_of(json!({ "sub": 7 }));
        assert_eq!(
            validate_at(&non_string, &ClaimsPolicy::default(), 0).unwrap_err(),
            AuthError::Malformed
        );
    }
}
