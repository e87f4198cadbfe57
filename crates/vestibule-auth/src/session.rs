//! Authenticated session and extraction helpers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single `(type, value)` assertion about the signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    /// The claim type, e.g. `emails` or `given_name`.
    #[serde(rename = "type")]
    pub claim_type: String,
    /// The claim value, stringified.
    pub value: String,
}

impl Claim {
    /// Create a claim.
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// An authenticated session, established by a successful OIDC callback.
///
/// There is no partially-authenticated form: a `Session` only exists once
/// the provider's ID token has been verified, and the request layer holds
/// either one of these or nothing. Stored in HTTP request extensions by
/// the gate middleware for downstream handlers.
#[derive(Debug, Clone)]
pub struct Session {
    claims: Vec<Claim>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from the claims of a verified ID token.
    ///
    /// Claims keep the provider's original ordering, repeats included.
    pub fn verified(claims: Vec<Claim>, expires_at: DateTime<Utc>) -> Self {
        Self { claims, expires_at }
    }

    /// The claim set, in provider order.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// When the underlying token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the session is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// First value of the given claim type, if present.
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// A human-friendly name for page chrome: `name`, then `given_name`,
    /// then the first email, then the subject.
    pub fn display_name(&self) -> Option<&str> {
        ["name", "given_name", "emails", "email", "sub"]
            .iter()
            .find_map(|t| self.claim(t))
    }
}

/// Extract the `Session` from HTTP request `Parts`, if present.
pub fn session_from_parts(parts: &http::request::Parts) -> Option<&Session> {
    parts.extensions.get::<Session>()
}
