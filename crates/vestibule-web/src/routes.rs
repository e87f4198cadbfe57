//! Page handlers. All of them run behind the authorization gate, so a
//! `Session` extension is present exactly when the caller is signed in.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, State};
use axum::response::{Html, Response};
use http::request::Parts;
use http::{HeaderMap, StatusCode};
use vestibule_auth::{present, session_from_parts, AuthError, Session};

use crate::views::{self, Nav};
use crate::{AppState, Result};

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The session the gate admitted for this request, if any.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self(session_from_parts(parts).cloned()))
    }
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Html<String> {
    views::index(Nav::new(session.as_ref(), &state.provider))
}

/// `GET /privacy`
pub async fn privacy(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Html<String> {
    views::privacy(Nav::new(session.as_ref(), &state.provider))
}

/// `GET /profile`
pub async fn profile(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Html<String>> {
    let claims = present(session.as_ref())?;
    Ok(views::profile(
        Nav::new(session.as_ref(), &state.provider),
        &claims,
    ))
}

/// `GET /claims`
pub async fn claims(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Html<String>> {
    let Some(session) = session else {
        return Err(AuthError::Precondition(
            "claims requested for a request without a session".to_string(),
        )
        .into());
    };
    Ok(views::claims(
        Nav::new(Some(&session), &state.provider),
        session.claims(),
    ))
}

/// `GET /error`
pub async fn error(headers: HeaderMap) -> Response {
    views::error_page(StatusCode::OK, request_id(&headers))
}

/// Fallback for paths with no page. Gated like every page, so only a
/// signed-in caller ever sees it.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// The request id assigned by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
}
