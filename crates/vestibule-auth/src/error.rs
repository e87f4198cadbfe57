//! Auth-specific error types.

use crate::config::Policy;

/// Errors that can occur while configuring, gating, or completing sign-in.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A mandatory provider setting is missing or malformed.
    #[error("configuration error for '{key}': {message}")]
    Configuration {
        /// Dotted setting name, such as `identity.client_id`.
        key: String,
        /// What is wrong with the value.
        message: String,
    },

    /// An operation was invoked outside its contract (e.g. presenting
    /// claims for a request that never passed the gate).
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// No ID token was returned by the provider.
    #[error("missing ID token")]
    MissingToken,

    /// Token format is invalid (not a valid JWT).
    #[error("invalid token format: {0}")]
    InvalidFormat(String),

    /// JWT signature verification failed.
    #[error("invalid token signature: {0}")]
    InvalidSignature(String),

    /// Token has expired.
    #[error("token has expired")]
    Expired,

    /// Token audience doesn't match the configured client ID.
    #[error("invalid audience")]
    InvalidAudience,

    /// Token issuer doesn't match the discovered issuer.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The callback's `state` does not belong to a pending sign-in.
    #[error("invalid or unknown state parameter")]
    InvalidState,

    /// The ID token's nonce does not match the one sent with the request.
    #[error("nonce mismatch")]
    NonceMismatch,

    /// No key in the JWKS matches the token's kid.
    #[error("no matching key for kid '{0}'")]
    NoMatchingKey(String),

    /// The requested provider flow has no policy configured.
    #[error("policy not configured: {0}")]
    PolicyNotConfigured(Policy),

    /// The user chose "forgot password" on the sign-in page.
    #[error("provider requested the password reset flow")]
    PasswordResetRequested,

    /// The user cancelled the provider flow.
    #[error("user cancelled the provider flow")]
    Cancelled,

    /// The provider returned an error response on the callback.
    #[error("provider error '{code}': {description}")]
    Provider {
        /// The `error` code from the callback.
        code: String,
        /// The `error_description` text, empty when the provider sent none.
        description: String,
    },

    /// Failed to fetch discovery metadata or JWKS from the provider.
    #[error("failed to fetch provider metadata: {0}")]
    MetadataFetch(String),

    /// The authorization code could not be exchanged for tokens.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

impl AuthError {
    /// Build a configuration error for the given key.
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the failure should send the user back through sign-in
    /// rather than to the error view.
    ///
    /// Provider-side authentication failures are answered with a fresh
    /// challenge; configuration faults, broken preconditions and
    /// unreachable provider endpoints are not.
    pub fn should_rechallenge(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::InvalidFormat(_)
                | AuthError::InvalidSignature(_)
                | AuthError::Expired
                | AuthError::InvalidAudience
                | AuthError::InvalidIssuer
                | AuthError::InvalidState
                | AuthError::NonceMismatch
                | AuthError::NoMatchingKey(_)
                | AuthError::Provider { .. }
                | AuthError::TokenExchange(_)
        )
    }
}
