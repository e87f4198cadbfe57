//! Shared application state handed to every handler.

use std::sync::Arc;

use vestibule_auth::{AllowList, AuthorizationGate, ProviderConfig};
use vestibule_auth_oidc::OidcClient;

use crate::settings::AppConfig;
use crate::store::SessionStore;

/// Everything a handler needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Server, session and gate settings.
    pub config: Arc<AppConfig>,
    /// Identity provider registration.
    pub provider: Arc<ProviderConfig>,
    /// OIDC client bound to `provider`.
    pub oidc: Arc<OidcClient>,
    /// Sessions and in-flight sign-ins.
    pub store: Arc<SessionStore>,
}

impl AppState {
    /// Assemble state from loaded settings and an OIDC client.
    pub fn new(config: AppConfig, provider: Arc<ProviderConfig>, oidc: OidcClient) -> Self {
        let store = SessionStore::new(config.session.cookie_name.clone());
        Self {
            config: Arc::new(config),
            provider,
            oidc: Arc::new(oidc),
            store: Arc::new(store),
        }
    }

    /// Build the authorization gate from the configured allow-list.
    pub fn gate(&self) -> AuthorizationGate {
        AuthorizationGate::new(
            AllowList::from_routes(&self.config.gate.anonymous_routes),
            self.provider.sign_up_sign_in_policy_id(),
        )
    }

    /// Absolute redirect URI registered with the provider.
    pub fn callback_url(&self) -> String {
        self.absolute_url(self.provider.callback_path())
    }

    /// Absolute URI the provider returns to after sign-out.
    pub fn signed_out_callback_url(&self) -> String {
        self.absolute_url(self.provider.signed_out_callback_path())
    }

    fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.server.public_url.trim_end_matches('/'),
            path
        )
    }
}
