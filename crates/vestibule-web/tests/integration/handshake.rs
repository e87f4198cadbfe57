//! Integration tests for the account handshake endpoints.

use http::StatusCode;
use serde_json::json;
use vestibule_auth::Policy;
use vestibule_auth_oidc::testing::{sign_id_token, valid_id_claims};
use vestibule_web::account::CORRELATION_COOKIE;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    body_text, cookie_pair, location, query_params, set_cookie, TestApp, OFFLINE_PROVIDER,
};

/// Start a sign-in and return (state, nonce, correlation cookie pair).
async fn begin_sign_in(app: &TestApp, return_url: &str) -> (String, String, String) {
    let resp = app
        .get(&format!("/account/sign-in?returnUrl={return_url}"), None)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let params = query_params(&location(&resp));
    let correlation = cookie_pair(&set_cookie(&resp, CORRELATION_COOKIE).unwrap());
    (params["state"].clone(), params["nonce"].clone(), correlation)
}

#[tokio::test]
async fn test_sign_in_redirects_to_provider() {
    let app = TestApp::offline();
    let resp = app.get("/account/sign-in?returnUrl=%2Fprofile", None).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let target = location(&resp);
    assert!(target.starts_with(&format!("{OFFLINE_PROVIDER}/authorize?")));

    let params = query_params(&target);
    assert_eq!(params["redirect_uri"], "https://app.test/signin-oidc");
    assert_eq!(params["response_type"], "code");
    assert!(params["scope"].contains("openid"));

    let correlation = set_cookie(&resp, CORRELATION_COOKIE).unwrap();
    assert!(correlation.contains("HttpOnly"));
    assert!(correlation.contains("Path=/signin-oidc"));

    let pending = app.state.store.take_pending(&params["state"]).unwrap();
    assert_eq!(pending.policy, Policy::SignUpSignIn);
    assert_eq!(pending.return_to, "/profile");
}

#[tokio::test]
async fn test_external_return_url_is_replaced() {
    let app = TestApp::offline();
    let (state, _, _) = begin_sign_in(&app, "https%3A%2F%2Fevil.example%2F").await;
    let pending = app.state.store.take_pending(&state).unwrap();
    assert_eq!(pending.return_to, "/");
}

#[tokio::test]
async fn test_full_sign_in_flow() {
    let server = MockServer::start().await;
    let app = TestApp::with_provider(&server.uri(), false);

    let (state, nonce, correlation) = begin_sign_in(&app, "%2Fprofile").await;

    let id_token = sign_id_token(&valid_id_claims(&server.uri(), &nonce));
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": id_token,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = app
        .get(
            &format!("/signin-oidc?code=auth-code&state={state}"),
            Some(&correlation),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/profile");

    let session = set_cookie(&resp, app.state.store.cookie_name()).unwrap();
    assert!(session.contains("HttpOnly"));
    assert!(session.contains("SameSite=Lax"));
    assert!(session.contains("Secure"));

    let resp = app.get("/profile", Some(&cookie_pair(&session))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("Hello, Alice"));
    assert!(body.contains("sub_123"));

    // The attempt is consumed: replaying the callback challenges again
    let resp = app
        .get(
            &format!("/signin-oidc?code=auth-code&state={state}"),
            Some(&correlation),
        )
        .await;
    assert_eq!(location(&resp), "/account/sign-in?returnUrl=%2F");
}

#[tokio::test]
async fn test_callback_without_correlation_cookie_challenges() {
    let app = TestApp::offline();
    let (state, _, _) = begin_sign_in(&app, "%2Fprofile").await;

    let resp = app
        .get(&format!("/signin-oidc?code=auth-code&state={state}"), None)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account/sign-in?returnUrl=%2F");
}

#[tokio::test]
async fn test_forgot_password_starts_reset_flow() {
    let app = TestApp::offline();
    let (state, _, correlation) = begin_sign_in(&app, "%2Fclaims").await;

    let resp = app
        .get(
            &format!(
                "/signin-oidc?error=access_denied&error_description=AADB2C90118%3A+forgot&state={state}"
            ),
            Some(&correlation),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let params = query_params(&location(&resp));
    let pending = app.state.store.take_pending(&params["state"]).unwrap();
    assert_eq!(pending.policy, Policy::ResetPassword);
    assert_eq!(pending.return_to, "/claims");
    assert!(set_cookie(&resp, CORRELATION_COOKIE).is_some());
}

#[tokio::test]
async fn test_forgot_password_without_reset_policy_challenges() {
    let app = TestApp::with_provider(OFFLINE_PROVIDER, false);
    let (state, _, correlation) = begin_sign_in(&app, "%2Fclaims").await;

    let resp = app
        .get(
            &format!(
                "/signin-oidc?error=access_denied&error_description=AADB2C90118&state={state}"
            ),
            Some(&correlation),
        )
        .await;
    assert_eq!(location(&resp), "/account/sign-in?returnUrl=%2Fclaims");
}

#[tokio::test]
async fn test_cancelled_flow_returns_home() {
    let app = TestApp::offline();
    let (state, _, correlation) = begin_sign_in(&app, "%2Fprofile").await;

    let resp = app
        .get(
            &format!(
                "/signin-oidc?error=access_denied&error_description=AADB2C90091%3A+cancelled&state={state}"
            ),
            Some(&correlation),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn test_rejected_code_challenges_again() {
    let server = MockServer::start().await;
    let app = TestApp::with_provider(&server.uri(), false);
    let (state, _, correlation) = begin_sign_in(&app, "%2Fprofile").await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "AADB2C90080: The provided grant has expired.",
        })))
        .mount(&server)
        .await;

    let resp = app
        .get(
            &format!("/signin-oidc?code=stale&state={state}"),
            Some(&correlation),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account/sign-in?returnUrl=%2Fprofile");
    assert!(set_cookie(&resp, app.state.store.cookie_name()).is_none());
}

#[tokio::test]
async fn test_sign_out_ends_session_and_redirects_to_provider() {
    let app = TestApp::offline();
    let cookie = app.sign_in();

    let resp = app.get("/account/sign-out", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp),
        format!(
            "{OFFLINE_PROVIDER}/logout?post_logout_redirect_uri=https%3A%2F%2Fapp.test%2Fsignout-callback-oidc"
        )
    );
    let cleared = set_cookie(&resp, app.state.store.cookie_name()).unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let resp = app.get("/profile", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_edit_profile_requires_configured_policy() {
    let app = TestApp::offline();
    let resp = app.get("/account/edit-profile", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_password_uses_reset_policy() {
    let app = TestApp::offline();
    let resp = app.get("/account/reset-password", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let params = query_params(&location(&resp));
    let pending = app.state.store.take_pending(&params["state"]).unwrap();
    assert_eq!(pending.policy, Policy::ResetPassword);
    assert_eq!(pending.return_to, "/");
}
