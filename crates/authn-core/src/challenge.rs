//! Unauthorized challenge responses.
//!
//! Pure builders for the fixed 401 response the pipeline sends when no
//! authenticator in the chain produced a completed credential. The
//! realm is sanitized before it is quoted into the header, so a
//! configured realm can never inject additional header content.

use http::{header, Response, StatusCode};

/// Fixed body carried by every challenge response.
pub const UNAUTHORIZED_BODY: &str = "Unauthorized";

/// Build the default 401 response with a Basic challenge.
pub fn unauthorized_challenge(realm: &str) -> Response<String> {
    challenge_response(format!("Basic realm=\"{}\"", sanitize_realm(realm)))
}

/// Build a 401 response with a Bearer challenge, for callers that know
/// the client speaks token auth.
pub fn bearer_challenge(realm: &str) -> Response<String> {
    challenge_response(format!(
        "Bearer realm=\"{}\", error=\"invalid_token\"",
        sanitize_realm(realm)
    ))
}

fn challenge_response(challenge: String) -> Response<String> {
    let mut response = Response::new(UNAUTHORIZED_BODY.to_string());
    *response.status_mut() = StatusCode::UNAUTHORIZED;

    if let Ok(value) = header::HeaderValue::from_str(&challenge) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    } else {
        tracing::warn!(
            target: "authn.challenge",
            "Challenge header value rejected, sending bare 401"
        );
    }

    response
}

/// Strip characters that would terminate or escape the quoted realm.
fn sanitize_realm(realm: &str) -> String {
    realm
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect()
}
