//! Authenticated credential produced by the extraction pipeline.

/// An authenticated principal: subject, roles, and a completeness flag.
///
/// Instances are immutable once built. The completeness flag exists
/// for multi-round authenticators; single-round authenticators mark
/// the credential complete as soon as verification succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    subject: String,
    roles: Vec<String>,
    complete: bool,
}

impl Credential {
    /// Build an incomplete credential for the given identity.
    pub fn new(subject: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            roles,
            complete: false,
        }
    }

    /// Consume the credential, returning it marked complete.
    #[must_use]
    pub fn mark_complete(mut self) -> Self {
        self.complete = true;
        self
    }

    /// Subject identifier.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Roles granted to the subject.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Whether the authentication exchange finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}
