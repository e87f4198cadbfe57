//! OpenID Connect client for Vestibule.
//!
//! Drives the authorization-code handshake against a policy-based
//! provider (one authority per user flow):
//! - Discovery metadata per policy, cached with TTL-based refresh
//! - Authorization requests carrying `state` and `nonce`
//! - Callback completion: provider error mapping, code exchange,
//!   ID token validation via JWKS, claim flattening into a [`Session`]
//! - Provider sign-out URLs
//!
//! [`Session`]: vestibule_auth::Session

mod client;
mod flow;
mod token;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Jwk, OidcClient, ProviderMetadata};
pub use flow::{
    classify_provider_error, AuthorizationRequest, CallbackParams, PendingSignIn,
    B2C_CANCELLED_CODE, B2C_FORGOT_PASSWORD_CODE,
};
pub use token::{flatten_claims, TokenResponse};
