//! Common test utilities and harness for vestibule-web integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;
use axum::Router;
use chrono::{TimeDelta, Utc};
use http::{header, Request};
use tower::ServiceExt;
use url::Url;
use vestibule_auth::{Claim, Session};
use vestibule_auth_oidc::testing::{
    provider_config, static_metadata_for, test_jwk, TEST_POLICY, TEST_RESET_POLICY,
};
use vestibule_auth_oidc::OidcClient;
use vestibule_web::{AppConfig, AppState, ServerSettings};

/// Provider base URL used when no mock server is involved.
pub const OFFLINE_PROVIDER: &str = "https://login.test";

/// Public URL of the application under test.
pub const PUBLIC_URL: &str = "https://app.test";

/// Test harness wrapping a fully assembled router.
pub struct TestApp {
    /// Shared state, for inspecting the session store.
    pub state: AppState,
    /// The router under test.
    pub router: Router,
}

impl TestApp {
    /// App whose provider metadata and keys are preloaded for `base`.
    ///
    /// Only the token endpoint (`{base}/token`) is ever called.
    pub fn with_provider(base: &str, with_reset_password: bool) -> Self {
        let provider = Arc::new(provider_config(base, with_reset_password));
        let mut policies = vec![TEST_POLICY];
        if with_reset_password {
            policies.push(TEST_RESET_POLICY);
        }
        let oidc = OidcClient::with_static_metadata(
            provider.clone(),
            static_metadata_for(base, &policies),
            vec![test_jwk()],
        );
        Self::build(app_config("production"), provider, oidc)
    }

    /// App that makes no provider calls at all.
    pub fn offline() -> Self {
        Self::with_provider(OFFLINE_PROVIDER, true)
    }

    /// Offline app running in the development environment.
    pub fn development() -> Self {
        let provider = Arc::new(provider_config(OFFLINE_PROVIDER, false));
        let oidc = OidcClient::with_static_metadata(
            provider.clone(),
            static_metadata_for(OFFLINE_PROVIDER, &[TEST_POLICY]),
            vec![test_jwk()],
        );
        Self::build(app_config("development"), provider, oidc)
    }

    /// App that discovers metadata over HTTP from `base`.
    pub fn discovering(base: &str) -> Self {
        let provider = Arc::new(provider_config(base, false));
        let oidc = OidcClient::new(provider.clone());
        Self::build(app_config("production"), provider, oidc)
    }

    fn build(
        config: AppConfig,
        provider: Arc<vestibule_auth::ProviderConfig>,
        oidc: OidcClient,
    ) -> Self {
        let state = AppState::new(config, provider, oidc);
        let router = vestibule_web::router(state.clone());
        Self { state, router }
    }

    /// Send a GET with optional `Cookie` header.
    pub async fn get(&self, uri: &str, cookies: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Send an arbitrary request.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Store a session directly and return the matching `Cookie` header.
    pub fn sign_in_with(&self, claims: Vec<Claim>, ttl: TimeDelta) -> String {
        let id = self
            .state
            .store
            .insert_session(Session::verified(claims, Utc::now() + ttl));
        format!("{}={id}", self.state.store.cookie_name())
    }

    /// Store a typical signed-in session.
    pub fn sign_in(&self) -> String {
        self.sign_in_with(default_claims(), TimeDelta::hours(1))
    }
}

fn app_config(environment: &str) -> AppConfig {
    AppConfig {
        server: ServerSettings {
            public_url: PUBLIC_URL.to_string(),
            environment: environment.to_string(),
            ..ServerSettings::default()
        },
        ..AppConfig::default()
    }
}

/// Claims of a typical signed-in user.
pub fn default_claims() -> Vec<Claim> {
    vec![
        Claim::new("sub", "sub_123"),
        Claim::new("given_name", "Alice"),
        Claim::new("emails", "alice@contoso.com"),
        Claim::new("tfp", TEST_POLICY),
    ]
}

/// Response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The `Location` header.
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Raw `Set-Cookie` header for `name`, if set.
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// `name=value` part of a raw `Set-Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

/// Query parameters of an absolute or relative URL.
pub fn query_params(url: &str) -> HashMap<String, String> {
    let url = Url::parse(url)
        .or_else(|_| Url::parse(PUBLIC_URL).and_then(|base| base.join(url)))
        .unwrap();
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
