//! Account handshake endpoints.
//!
//! These sit outside the authorization gate: they start provider flows,
//! receive the provider's callbacks and end sessions.

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use vestibule_auth::{AuthError, Policy, DEFAULT_CHALLENGE_PATH, RETURN_URL_PARAM};
use vestibule_auth_oidc::{classify_provider_error, CallbackParams};

use crate::views;
use crate::{AppState, Result};

/// Local page shown once signed out.
pub const SIGNED_OUT_PATH: &str = "/account/signed-out";

/// Cookie tying a callback to the browser that started the attempt.
pub const CORRELATION_COOKIE: &str = ".vestibule.correlation";

/// `?returnUrl=` query accepted by the flow-starting endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ReturnUrl {
    /// Where to go after the flow completes.
    #[serde(rename = "returnUrl")]
    pub return_url: Option<String>,
}

/// Accept only local absolute paths as return targets; anything else
/// (absolute URLs, scheme-relative `//host`, backslash tricks) becomes `/`.
pub fn local_return_target(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(target)
            if target.starts_with('/')
                && !target.starts_with("//")
                && !target.starts_with("/\\")
                && !target.chars().any(char::is_control) =>
        {
            target.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Local sign-in location that returns to `return_to` afterwards.
pub fn sign_in_location(return_to: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(RETURN_URL_PARAM, return_to)
        .finish();
    format!("{DEFAULT_CHALLENGE_PATH}?{query}")
}

/// `GET /account/sign-in`
pub async fn sign_in(
    State(state): State<AppState>,
    Query(query): Query<ReturnUrl>,
    jar: CookieJar,
) -> Result<Response> {
    let return_to = local_return_target(query.return_url.as_deref());
    start_flow(&state, jar, Policy::SignUpSignIn, return_to).await
}

/// `GET /account/reset-password`
pub async fn reset_password(
    State(state): State<AppState>,
    Query(query): Query<ReturnUrl>,
    jar: CookieJar,
) -> Result<Response> {
    let return_to = local_return_target(query.return_url.as_deref());
    start_flow(&state, jar, Policy::ResetPassword, return_to).await
}

/// `GET /account/edit-profile`
pub async fn edit_profile(
    State(state): State<AppState>,
    Query(query): Query<ReturnUrl>,
    jar: CookieJar,
) -> Result<Response> {
    let return_to = local_return_target(query.return_url.as_deref());
    start_flow(&state, jar, Policy::EditProfile, return_to).await
}

/// Record a pending attempt and redirect the browser to the provider.
async fn start_flow(
    state: &AppState,
    jar: CookieJar,
    policy: Policy,
    return_to: String,
) -> Result<Response> {
    let request = state
        .oidc
        .authorization_request(policy, &state.callback_url(), &return_to)
        .await?;

    let correlation = Cookie::build((CORRELATION_COOKIE, request.pending.state.clone()))
        .path(state.provider.callback_path().to_string())
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.secure_cookies)
        .build();
    state.store.insert_pending(request.pending);

    tracing::debug!(%policy, "Redirecting to identity provider");
    Ok((jar.add(correlation), Redirect::to(&request.url)).into_response())
}

/// `GET {callback_path}`: the provider's redirect after a flow.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> Result<Response> {
    let correlation = jar.get(CORRELATION_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(expired_cookie(
        CORRELATION_COOKIE,
        state.provider.callback_path(),
    ));

    let pending = params
        .state
        .as_deref()
        .filter(|s| correlation.as_deref() == Some(*s))
        .and_then(|s| state.store.take_pending(s));

    let Some(pending) = pending else {
        if let Some(error) = &params.error
            && matches!(
                classify_provider_error(error, params.error_description.as_deref()),
                AuthError::Cancelled
            )
        {
            return Ok((jar, Redirect::to("/")).into_response());
        }
        tracing::warn!("Callback does not match a sign-in attempt from this browser");
        return Ok((jar, Redirect::to(&sign_in_location("/"))).into_response());
    };

    match state
        .oidc
        .complete_sign_in(&params, &pending, &state.callback_url())
        .await
    {
        Ok(session) => {
            tracing::info!(
                policy = %pending.policy,
                subject = session.claim("sub").unwrap_or("<unknown>"),
                "Signed in"
            );
            let id = state.store.insert_session(session);
            let cookie = Cookie::build((state.store.cookie_name().to_string(), id))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.config.session.secure_cookies)
                .build();
            Ok((jar.add(cookie), Redirect::to(&pending.return_to)).into_response())
        }
        Err(AuthError::PasswordResetRequested)
            if state.provider.supports(Policy::ResetPassword) =>
        {
            tracing::info!("Password reset requested from sign-in page");
            start_flow(&state, jar, Policy::ResetPassword, pending.return_to).await
        }
        Err(AuthError::Cancelled) => {
            tracing::info!(policy = %pending.policy, "User cancelled flow");
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) if e.should_rechallenge() || matches!(e, AuthError::PasswordResetRequested) => {
            tracing::warn!(error = %e, "Sign-in failed, challenging again");
            Ok((jar, Redirect::to(&sign_in_location(&pending.return_to))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `GET /account/sign-out`
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(id) = jar.get(state.store.cookie_name()).map(|c| c.value().to_string())
        && state.store.remove_session(&id)
    {
        tracing::info!("Signed out");
    }
    let jar = jar.remove(expired_cookie(state.store.cookie_name(), "/"));

    let target = match state
        .oidc
        .end_session_url(&state.signed_out_callback_url())
        .await
    {
        Ok(Some(url)) => url,
        Ok(None) => SIGNED_OUT_PATH.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Provider sign-out unavailable, signing out locally");
            SIGNED_OUT_PATH.to_string()
        }
    };
    (jar, Redirect::to(&target)).into_response()
}

/// `GET {signed_out_callback_path}`: the provider's redirect after sign-out.
pub async fn signed_out_callback() -> Redirect {
    Redirect::to(SIGNED_OUT_PATH)
}

/// `GET /account/signed-out`
pub async fn signed_out() -> Html<String> {
    views::signed_out()
}

fn expired_cookie(name: &str, path: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path(path.to_string())
        .build()
}
