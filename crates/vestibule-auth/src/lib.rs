//! Authentication and authorization decision layer for Vestibule.
//!
//! Provides:
//! - [`ProviderConfig`]: Identity provider settings, loaded once from a [`ConfigSource`]
//! - [`Session`]: An authenticated identity and its claim set
//! - [`AuthorizationGate`]: Allow-list-first, fail-closed route authorization
//! - [`GateLayer`] / [`GateService`]: Tower middleware parameterised over [`SessionResolver`]
//! - [`present`]: Claims presenter producing a [`ClaimsView`]
//! - [`AuthError`]: Auth-specific error types
//!
//! Nothing in this crate talks to the identity provider. The handshake
//! itself lives in `vestibule-auth-oidc`; this crate only decides.

mod claims;
mod config;
mod error;
mod gate;
mod middleware;
mod session;

pub use claims::{present, ClaimsView};
pub use crate::config::{
    ConfigSource, Policy, ProviderConfig, DEFAULT_CALLBACK_PATH, DEFAULT_SIGNED_OUT_CALLBACK_PATH,
};
pub use error::AuthError;
pub use gate::{normalize_route, AllowList, AuthorizationGate, Challenge, Decision, RoutePolicy};
pub use middleware::{GateLayer, GateService, DEFAULT_CHALLENGE_PATH, RETURN_URL_PARAM};
pub use session::{session_from_parts, Claim, Session};

/// Trait for resolving the caller's session from an incoming request.
///
/// Implement this for each session backing (cookie store, bearer token, etc.).
/// The middleware calls `resolve()` once per request; returning `None`
/// means "no session", which the gate treats as unauthenticated.
pub trait SessionResolver: Send + Sync + 'static {
    /// Resolve the session attached to the given request headers, if any.
    fn resolve(
        &self,
        headers: &http::HeaderMap,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<Session>> + Send + '_>>;
}
