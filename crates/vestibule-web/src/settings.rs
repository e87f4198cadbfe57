//! Application settings.
//!
//! Settings are layered with the `config` crate: an optional TOML file
//! first, then `VESTIBULE__SECTION__KEY` environment variables. The
//! `identity` section is handed to [`ProviderConfig::load`] as-is; the
//! remaining sections deserialize into [`AppConfig`].

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use vestibule_auth::ProviderConfig;

use crate::Result;

/// Default configuration file name (extension resolved by `config`).
pub const DEFAULT_CONFIG_FILE: &str = "vestibule";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "VESTIBULE";

/// Name of the environment in which HSTS and secure cookies may be relaxed.
pub const DEVELOPMENT: &str = "development";

/// Fully loaded settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Server, session and gate settings.
    pub app: AppConfig,
    /// Identity provider registration.
    pub provider: ProviderConfig,
}

impl Settings {
    /// Load settings from `path` (required when given) or from an optional
    /// `vestibule.toml` in the working directory, overlaid with environment
    /// variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// [`load`](Self::load) with the environment overlay read from `env`
    /// instead of the process environment when given.
    pub fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let raw = config::Config::builder()
            .add_source(file)
            .add_source(environment(env))
            .build()?;

        Self::from_config(raw)
    }

    /// Split an already-built `config::Config` into settings.
    pub fn from_config(raw: config::Config) -> Result<Self> {
        let provider = ProviderConfig::load(&raw)?;
        let app: AppConfig = raw.try_deserialize()?;
        tracing::debug!(
            "Loaded settings: bind={}, environment={}, provider={:?}",
            app.server.bind,
            app.server.environment,
            provider
        );
        Ok(Self { app, provider })
    }
}

/// `VESTIBULE__SECTION__KEY` variables, read from `env` when given.
fn environment(env: Option<config::Map<String, String>>) -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("gate.anonymous_routes")
        .try_parsing(true)
        .source(env)
}

/// Non-identity settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Listener and deployment settings.
    #[serde(default)]
    pub server: ServerSettings,
    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionSettings,
    /// Authorization gate settings.
    #[serde(default)]
    pub gate: GateSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind: SocketAddr,
    /// Externally visible base URL, used to build provider redirect URIs.
    pub public_url: String,
    /// Deployment environment name.
    pub environment: String,
}

impl ServerSettings {
    /// Whether this is a development deployment.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEVELOPMENT)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            public_url: "http://localhost:5000".to_string(),
            environment: "production".to_string(),
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Mark cookies `Secure`.
    pub secure_cookies: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: ".vestibule.session".to_string(),
            secure_cookies: true,
        }
    }
}

/// `[gate]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Routes reachable without a session.
    pub anonymous_routes: Vec<String>,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            anonymous_routes: vec!["/".to_string(), "/privacy".to_string()],
        }
    }
}
