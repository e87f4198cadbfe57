//! Token endpoint response and ID token claim flattening.

use serde::Deserialize;
use serde_json::{Map, Value};
use vestibule_auth::Claim;

/// Successful response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The ID token (JWT). Required for sign-in.
    pub id_token: Option<String>,
    /// Access token, when an API scope was requested.
    pub access_token: Option<String>,
    /// Refresh token, when `offline_access` was granted.
    pub refresh_token: Option<String>,
    /// Token type, usually `Bearer`.
    pub token_type: Option<String>,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Flatten a verified ID token payload into claims, in payload order.
///
/// Strings map one-to-one, arrays yield one claim per element (so a
/// multi-valued claim repeats its type), other scalars are stringified
/// and nulls are dropped.
pub fn flatten_claims(payload: &Map<String, Value>) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(payload.len());
    for (claim_type, value) in payload {
        match value {
            Value::Array(items) => {
                claims.extend(
                    items
                        .iter()
                        .filter_map(scalar_to_string)
                        .map(|v| Claim::new(claim_type.as_str(), v)),
                );
            }
            other => {
                if let Some(v) = scalar_to_string(other) {
                    claims.push(Claim::new(claim_type.as_str(), v));
                }
            }
        }
    }
    claims
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
