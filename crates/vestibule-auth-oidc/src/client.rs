//! Policy-aware OIDC client with cached discovery and JWKS.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::DateTime;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;
use vestibule_auth::{AuthError, Policy, ProviderConfig, Session};

use crate::flow::{classify_provider_error, AuthorizationRequest, CallbackParams, PendingSignIn};
use crate::token::{flatten_claims, TokenErrorResponse, TokenResponse};

/// TTL for cached JWKS keys (1 hour).
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// TTL for cached discovery documents (24 hours).
const METADATA_CACHE_TTL: Duration = Duration::from_secs(86400);

/// Scopes requested on every authorization request.
const SCOPES: &str = "openid profile offline_access";

/// The subset of the discovery document this client uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    /// Expected `iss` of ID tokens.
    pub issuer: String,
    /// Where the browser is sent to sign in.
    pub authorization_endpoint: String,
    /// Where authorization codes are redeemed.
    pub token_endpoint: String,
    /// Where the browser is sent to sign out, if supported.
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    /// Signing keys location.
    pub jwks_uri: String,
}

/// A single RSA JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID, matched against the JWT header's `kid`.
    pub kid: String,
    /// RSA modulus (base64url-encoded).
    pub n: String,
    /// RSA exponent (base64url-encoded).
    pub e: String,
}

/// The JWKS response body.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

struct CachedMetadata {
    metadata: ProviderMetadata,
    fetched_at: Instant,
}

struct CachedKeys {
    keys: Vec<Jwk>,
    fetched_at: Instant,
}

/// OIDC client for a single application registration.
///
/// Safe to share across concurrent requests; the caches are the only
/// mutable state and are refreshed in place.
pub struct OidcClient {
    config: Arc<ProviderConfig>,
    http_client: reqwest::Client,
    /// policy id -> discovery document
    metadata: RwLock<HashMap<String, CachedMetadata>>,
    /// jwks_uri -> keys
    keys: RwLock<HashMap<String, CachedKeys>>,
    /// When set, caches never expire and are never fetched.
    offline: bool,
}

impl OidcClient {
    /// Create a client that discovers provider metadata over HTTP.
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            metadata: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            offline: false,
        }
    }

    /// Create a client with pre-loaded discovery documents (keyed by policy
    /// ID) and signing keys.
    ///
    /// Nothing is discovered or fetched; the token endpoint is still
    /// called over HTTP to redeem codes.
    pub fn with_static_metadata(
        config: Arc<ProviderConfig>,
        metadata: HashMap<String, ProviderMetadata>,
        keys: Vec<Jwk>,
    ) -> Self {
        let now = Instant::now();
        let jwks_uris: Vec<String> = metadata.values().map(|m| m.jwks_uri.clone()).collect();
        let metadata: HashMap<String, CachedMetadata> = metadata
            .into_iter()
            .map(|(policy_id, metadata)| {
                (
                    policy_id,
                    CachedMetadata {
                        metadata,
                        fetched_at: now,
                    },
                )
            })
            .collect();
        let keys: HashMap<String, CachedKeys> = jwks_uris
            .into_iter()
            .map(|uri| {
                (
                    uri,
                    CachedKeys {
                        keys: keys.clone(),
                        fetched_at: now,
                    },
                )
            })
            .collect();

        Self {
            config,
            http_client: reqwest::Client::new(),
            metadata: RwLock::new(metadata),
            keys: RwLock::new(keys),
            offline: true,
        }
    }

    /// The provider configuration this client was built with.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the authorization request for a user flow.
    ///
    /// Fails with [`AuthError::PolicyNotConfigured`] when the flow is
    /// disabled in configuration.
    pub async fn authorization_request(
        &self,
        policy: Policy,
        redirect_uri: &str,
        return_to: &str,
    ) -> Result<AuthorizationRequest, AuthError> {
        let policy_id = self.policy_id(policy)?;
        let metadata = self.metadata(policy_id).await?;

        let state = Uuid::new_v4().simple().to_string();
        let nonce = Uuid::new_v4().simple().to_string();

        let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|e| {
            AuthError::MetadataFetch(format!("invalid authorization endpoint: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", self.config.client_id())
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", SCOPES)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce);

        log::debug!("Built authorization request for policy {policy_id}");

        Ok(AuthorizationRequest {
            url: url.into(),
            pending: PendingSignIn {
                state,
                nonce,
                policy,
                return_to: return_to.to_string(),
            },
        })
    }

    /// Complete a sign-in from the provider's callback.
    ///
    /// Checks provider errors first, then `state`, then redeems the code
    /// and validates the returned ID token against the pending nonce.
    pub async fn complete_sign_in(
        &self,
        params: &CallbackParams,
        pending: &PendingSignIn,
        redirect_uri: &str,
    ) -> Result<Session, AuthError> {
        if let Some(error) = &params.error {
            return Err(classify_provider_error(
                error,
                params.error_description.as_deref(),
            ));
        }

        if params.state.as_deref() != Some(pending.state.as_str()) {
            return Err(AuthError::InvalidState);
        }

        let code = params
            .code
            .as_deref()
            .ok_or_else(|| AuthError::InvalidFormat("missing authorization code".to_string()))?;

        let policy_id = self.policy_id(pending.policy)?;
        let metadata = self.metadata(policy_id).await?;

        let tokens = self.exchange_code(&metadata, code, redirect_uri).await?;
        let id_token = tokens.id_token.ok_or(AuthError::MissingToken)?;

        let session = self
            .validate_id_token(&metadata, &id_token, &pending.nonce)
            .await?;

        log::info!(
            "Completed {} sign-in for subject {}",
            pending.policy,
            session.claim("sub").unwrap_or("<unknown>")
        );

        Ok(session)
    }

    /// Provider sign-out URL for the sign-up/sign-in policy, if the
    /// provider advertises one.
    pub async fn end_session_url(
        &self,
        post_logout_redirect_uri: &str,
    ) -> Result<Option<String>, AuthError> {
        let metadata = self
            .metadata(self.config.sign_up_sign_in_policy_id())
            .await?;

        let Some(endpoint) = metadata.end_session_endpoint else {
            return Ok(None);
        };

        let mut url = Url::parse(&endpoint)
            .map_err(|e| AuthError::MetadataFetch(format!("invalid end session endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("post_logout_redirect_uri", post_logout_redirect_uri);

        Ok(Some(url.into()))
    }

    fn policy_id(&self, policy: Policy) -> Result<&str, AuthError> {
        self.config
            .policy_id(policy)
            .ok_or(AuthError::PolicyNotConfigured(policy))
    }

    /// Redeem an authorization code at the token endpoint.
    async fn exchange_code(
        &self,
        metadata: &ProviderMetadata,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
        ];
        if let Some(secret) = self.config.client_secret() {
            form.push(("client_secret", secret));
        }

        let response = self
            .http_client
            .post(&metadata.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = match response.json::<TokenErrorResponse>().await {
                Ok(body) => format!(
                    "{}: {}",
                    body.error,
                    body.error_description.unwrap_or_default()
                ),
                Err(_) => format!("HTTP {status}"),
            };
            return Err(AuthError::TokenExchange(detail));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("token response parse failed: {e}")))
    }

    /// Validate an ID token (JWT) and build the session from its claims.
    async fn validate_id_token(
        &self,
        metadata: &ProviderMetadata,
        token: &str,
        nonce: &str,
    ) -> Result<Session, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidFormat(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidFormat("missing kid in JWT header".to_string()))?;

        let key = self.find_key(&metadata.jwks_uri, &kid).await?;
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.config.client_id()]);
        validation.set_issuer(&[metadata.issuer.as_str()]);

        let token_data = decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                _ => AuthError::InvalidSignature(e.to_string()),
            })?;

        let payload = token_data.claims;

        if payload.get("nonce").and_then(Value::as_str) != Some(nonce) {
            return Err(AuthError::NonceMismatch);
        }

        let expires_at = payload
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .ok_or_else(|| AuthError::InvalidFormat("missing or invalid exp".to_string()))?;

        Ok(Session::verified(flatten_claims(&payload), expires_at))
    }

    /// Discovery metadata for a policy, fetching/refreshing as needed.
    async fn metadata(&self, policy_id: &str) -> Result<ProviderMetadata, AuthError> {
        if let Some(metadata) = self.lookup_metadata(policy_id) {
            return Ok(metadata);
        }

        if self.offline {
            return Err(AuthError::MetadataFetch(format!(
                "no static metadata for policy {policy_id}"
            )));
        }

        let url = self.config.discovery_url(policy_id);
        log::debug!("Fetching discovery document {url}");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?;
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?;

        let mut cache = self
            .metadata
            .write()
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?;
        cache.insert(
            policy_id.to_string(),
            CachedMetadata {
                metadata: metadata.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(metadata)
    }

    fn lookup_metadata(&self, policy_id: &str) -> Option<ProviderMetadata> {
        let cache = self.metadata.read().ok()?;
        let cached = cache.get(policy_id)?;

        if !self.offline && cached.fetched_at.elapsed() > METADATA_CACHE_TTL {
            return None;
        }

        Some(cached.metadata.clone())
    }

    /// Find a key by `kid`, fetching/refreshing the cache as needed.
    async fn find_key(&self, jwks_uri: &str, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(key) = self.lookup_key(jwks_uri, kid) {
            return Ok(key);
        }

        if !self.offline {
            self.refresh_keys(jwks_uri).await?;
            if let Some(key) = self.lookup_key(jwks_uri, kid) {
                return Ok(key);
            }
        }

        Err(AuthError::NoMatchingKey(kid.to_string()))
    }

    fn lookup_key(&self, jwks_uri: &str, kid: &str) -> Option<Jwk> {
        let cache = self.keys.read().ok()?;
        let cached = cache.get(jwks_uri)?;

        if !self.offline && cached.fetched_at.elapsed() > JWKS_CACHE_TTL {
            return None;
        }

        cached.keys.iter().find(|k| k.kid == kid).cloned()
    }

    async fn refresh_keys(&self, jwks_uri: &str) -> Result<(), AuthError> {
        let response: JwksResponse = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?;

        let mut cache = self
            .keys
            .write()
            .map_err(|e| AuthError::MetadataFetch(e.to_string()))?;

        cache.insert(
            jwks_uri.to_string(),
            CachedKeys {
                keys: response.keys,
                fetched_at: Instant::now(),
            },
        );

        Ok(())
    }
}
