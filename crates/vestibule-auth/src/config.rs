//! Identity provider configuration.
//!
//! Loaded once at startup from any key/value [`ConfigSource`] and shared
//! read-only for the lifetime of the process.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::AuthError;

/// Default path the provider redirects back to after sign-in.
pub const DEFAULT_CALLBACK_PATH: &str = "/signin-oidc";

/// Default path the provider redirects back to after sign-out.
pub const DEFAULT_SIGNED_OUT_CALLBACK_PATH: &str = "/signout-callback-oidc";

const KEY_INSTANCE: &str = "identity.instance";
const KEY_DOMAIN: &str = "identity.domain";
const KEY_CLIENT_ID: &str = "identity.client_id";
const KEY_CLIENT_SECRET: &str = "identity.client_secret";
const KEY_SIGN_UP_SIGN_IN: &str = "identity.sign_up_sign_in_policy_id";
const KEY_RESET_PASSWORD: &str = "identity.reset_password_policy_id";
const KEY_EDIT_PROFILE: &str = "identity.edit_profile_policy_id";
const KEY_CALLBACK_PATH: &str = "identity.callback_path";
const KEY_SIGNED_OUT_CALLBACK_PATH: &str = "identity.signed_out_callback_path";

/// A flat key/value configuration source.
///
/// Keys are dotted (`identity.client_id`).
pub trait ConfigSource {
    /// Look up a raw value by key.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

impl ConfigSource for config::Config {
    fn get(&self, key: &str) -> Option<String> {
        self.get_string(key).ok()
    }
}

/// A provider-configured user flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Combined sign-up / sign-in. Always configured.
    SignUpSignIn,
    /// Self-service password reset.
    ResetPassword,
    /// Profile editing.
    EditProfile,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::SignUpSignIn => write!(f, "sign-up-sign-in"),
            Policy::ResetPassword => write!(f, "reset-password"),
            Policy::EditProfile => write!(f, "edit-profile"),
        }
    }
}

/// Immutable identity provider configuration.
#[derive(Clone)]
pub struct ProviderConfig {
    instance: String,
    domain: String,
    client_id: String,
    client_secret: Option<String>,
    sign_up_sign_in_policy_id: String,
    reset_password_policy_id: Option<String>,
    edit_profile_policy_id: Option<String>,
    callback_path: String,
    signed_out_callback_path: String,
}

impl ProviderConfig {
    /// Load the provider configuration from a key/value source.
    ///
    /// Fails with [`AuthError::Configuration`] when the instance, domain,
    /// client ID or sign-up/sign-in policy is missing or empty. The reset
    /// password and edit profile policies are optional.
    pub fn load<S: ConfigSource + ?Sized>(source: &S) -> Result<Self, AuthError> {
        let instance = required(source, KEY_INSTANCE)?
            .trim_end_matches('/')
            .to_string();
        if !(instance.starts_with("https://") || instance.starts_with("http://")) {
            return Err(AuthError::configuration(
                KEY_INSTANCE,
                "must be an absolute http(s) URL",
            ));
        }

        let domain = required(source, KEY_DOMAIN)?;
        let client_id = required(source, KEY_CLIENT_ID)?;
        let sign_up_sign_in_policy_id = required(source, KEY_SIGN_UP_SIGN_IN)?;

        let callback_path = path_or_default(source, KEY_CALLBACK_PATH, DEFAULT_CALLBACK_PATH)?;
        let signed_out_callback_path = path_or_default(
            source,
            KEY_SIGNED_OUT_CALLBACK_PATH,
            DEFAULT_SIGNED_OUT_CALLBACK_PATH,
        )?;

        let config = Self {
            instance,
            domain,
            client_id,
            client_secret: optional(source, KEY_CLIENT_SECRET),
            sign_up_sign_in_policy_id,
            reset_password_policy_id: optional(source, KEY_RESET_PASSWORD),
            edit_profile_policy_id: optional(source, KEY_EDIT_PROFILE),
            callback_path,
            signed_out_callback_path,
        };

        log::debug!(
            "Loaded provider config for {} (reset password: {}, edit profile: {})",
            config.domain,
            config.reset_password_policy_id.is_some(),
            config.edit_profile_policy_id.is_some()
        );

        Ok(config)
    }

    /// The provider instance URL, without trailing slash.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The tenant domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The OAuth client ID; also the expected ID token audience.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The client credential, if this is a confidential client.
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// The mandatory sign-up/sign-in policy ID.
    pub fn sign_up_sign_in_policy_id(&self) -> &str {
        &self.sign_up_sign_in_policy_id
    }

    /// The policy ID for a flow, or `None` if that flow is disabled.
    pub fn policy_id(&self, policy: Policy) -> Option<&str> {
        match policy {
            Policy::SignUpSignIn => Some(&self.sign_up_sign_in_policy_id),
            Policy::ResetPassword => self.reset_password_policy_id.as_deref(),
            Policy::EditProfile => self.edit_profile_policy_id.as_deref(),
        }
    }

    /// Whether the given flow is available.
    pub fn supports(&self, policy: Policy) -> bool {
        self.policy_id(policy).is_some()
    }

    /// Local path the provider redirects to after sign-in.
    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    /// Local path the provider redirects to after sign-out.
    pub fn signed_out_callback_path(&self) -> &str {
        &self.signed_out_callback_path
    }

    /// The OIDC authority for a policy: `{instance}/{domain}/{policy}/v2.0`.
    pub fn authority(&self, policy_id: &str) -> String {
        format!("{}/{}/{}/v2.0", self.instance, self.domain, policy_id)
    }

    /// The discovery document URL for a policy.
    pub fn discovery_url(&self, policy_id: &str) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.authority(policy_id)
        )
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("instance", &self.instance)
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("sign_up_sign_in_policy_id", &self.sign_up_sign_in_policy_id)
            .field("reset_password_policy_id", &self.reset_password_policy_id)
            .field("edit_profile_policy_id", &self.edit_profile_policy_id)
            .field("callback_path", &self.callback_path)
            .field("signed_out_callback_path", &self.signed_out_callback_path)
            .finish()
    }
}

/// Trimmed, non-empty value for `key`, or `None`.
fn optional<S: ConfigSource + ?Sized>(source: &S, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<S: ConfigSource + ?Sized>(source: &S, key: &str) -> Result<String, AuthError> {
    optional(source, key).ok_or_else(|| AuthError::configuration(key, "missing or empty"))
}

fn path_or_default<S: ConfigSource + ?Sized>(
    source: &S,
    key: &str,
    default: &str,
) -> Result<String, AuthError> {
    let path = optional(source, key).unwrap_or_else(|| default.to_string());
    if !path.starts_with('/') {
        return Err(AuthError::configuration(key, "must start with '/'"));
    }
    Ok(path)
}
