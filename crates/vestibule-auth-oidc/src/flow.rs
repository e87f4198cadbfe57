//! Sign-in flow types: outbound authorization requests and inbound callbacks.

use serde::Deserialize;
use vestibule_auth::{AuthError, Policy};

/// Provider error code sent when the user clicks "forgot password" on
/// the sign-up/sign-in page.
pub const B2C_FORGOT_PASSWORD_CODE: &str = "AADB2C90118";

/// Provider error code sent when the user cancels a flow.
pub const B2C_CANCELLED_CODE: &str = "AADB2C90091";

/// Per-attempt state kept server-side between the redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSignIn {
    /// Opaque correlation value echoed back by the provider.
    pub state: String,
    /// Replay protection value that must appear in the ID token.
    pub nonce: String,
    /// The user flow this attempt runs.
    pub policy: Policy,
    /// Local path to return to once signed in.
    pub return_to: String,
}

/// A ready-to-follow authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Provider authorization endpoint URL with all query parameters.
    pub url: String,
    /// State to keep until the callback arrives.
    pub pending: PendingSignIn,
}

/// Query parameters of the provider's redirect back to the callback path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code, on success.
    pub code: Option<String>,
    /// Echoed `state`.
    pub state: Option<String>,
    /// Provider error code, on failure.
    pub error: Option<String>,
    /// Provider error description, on failure.
    pub error_description: Option<String>,
}

/// Map a provider error response to an [`AuthError`].
///
/// The provider reports "forgot password" and "user cancelled" as errors
/// with well-known codes inside the description; those get their own
/// variants so the caller can route them instead of failing.
pub fn classify_provider_error(error: &str, description: Option<&str>) -> AuthError {
    let description = description.unwrap_or_default();

    if description.contains(B2C_FORGOT_PASSWORD_CODE) {
        return AuthError::PasswordResetRequested;
    }
    if description.contains(B2C_CANCELLED_CODE) {
        return AuthError::Cancelled;
    }

    AuthError::Provider {
        code: error.to_string(),
        description: description.to_string(),
    }
}
