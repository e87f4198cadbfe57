//! Integration tests for the authorization gate in front of the pages.

use chrono::TimeDelta;
use http::{header, StatusCode};
use vestibule_auth::Claim;

use crate::common::{body_text, location, TestApp};

#[tokio::test]
async fn test_landing_page_is_anonymous() {
    let app = TestApp::offline();
    let resp = app.get("/", None).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("/account/sign-in"));
    assert!(body.contains("/account/reset-password"));
}

#[tokio::test]
async fn test_privacy_page_is_anonymous() {
    let app = TestApp::offline();
    let resp = app.get("/privacy", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("Privacy Policy"));
}

#[tokio::test]
async fn test_protected_pages_challenge_anonymous_callers() {
    let app = TestApp::offline();

    for (uri, expected) in [
        ("/profile", "/account/sign-in?returnUrl=%2Fprofile"),
        ("/claims", "/account/sign-in?returnUrl=%2Fclaims"),
        ("/error", "/account/sign-in?returnUrl=%2Ferror"),
        (
            "/profile?tab=emails",
            "/account/sign-in?returnUrl=%2Fprofile%3Ftab%3Demails",
        ),
    ] {
        let resp = app.get(uri, None).await;
        assert_eq!(resp.status(), StatusCode::FOUND, "{uri}");
        assert_eq!(location(&resp), expected, "{uri}");
    }
}

#[tokio::test]
async fn test_profile_with_session_shows_claims() {
    let app = TestApp::offline();
    let cookie = app.sign_in();

    let resp = app.get("/profile", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_text(resp).await;
    assert!(body.contains("Hello, Alice"));
    assert!(body.contains("alice@contoso.com"));
    assert!(body.contains("/account/sign-out"));
}

#[tokio::test]
async fn test_profile_collapses_repeated_claims_and_claims_page_keeps_them() {
    let app = TestApp::offline();
    let cookie = app.sign_in_with(
        vec![
            Claim::new("email", "a@contoso.com"),
            Claim::new("role", "x"),
            Claim::new("email", "b@contoso.com"),
        ],
        TimeDelta::hours(1),
    );

    let profile = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(profile.contains("<td>email</td><td>b@contoso.com</td>"));
    assert!(!profile.contains("<td>a@contoso.com</td>"));

    let claims = body_text(app.get("/claims", Some(&cookie)).await).await;
    assert!(claims.contains("a@contoso.com"));
    assert!(claims.contains("b@contoso.com"));
}

#[tokio::test]
async fn test_claim_values_are_escaped() {
    let app = TestApp::offline();
    let cookie = app.sign_in_with(
        vec![Claim::new("given_name", "<img src=x onerror=alert(1)>")],
        TimeDelta::hours(1),
    );

    let body = body_text(app.get("/profile", Some(&cookie)).await).await;
    assert!(!body.contains("<img"));
    assert!(body.contains("&lt;img src=x onerror=alert(1)&gt;"));
}

#[tokio::test]
async fn test_expired_session_is_challenged() {
    let app = TestApp::offline();
    let cookie = app.sign_in_with(vec![Claim::new("sub", "sub_123")], TimeDelta::minutes(-1));

    let resp = app.get("/profile", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_forged_session_cookie_is_challenged() {
    let app = TestApp::offline();
    let cookie = format!("{}=not-a-session", app.state.store.cookie_name());

    let resp = app.get("/claims", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_error_route_with_session_renders_error_view() {
    let app = TestApp::offline();
    let cookie = app.sign_in();

    let resp = app.get("/error", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store, no-cache"
    );
    let body = body_text(resp).await;
    assert!(body.contains("An error occurred while processing your request."));
    assert!(!body.contains("alice@contoso.com"));
}

#[tokio::test]
async fn test_handshake_routes_bypass_gate() {
    let app = TestApp::offline();
    let resp = app.get("/account/signed-out", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.get("/signout-callback-oidc", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account/signed-out");
}

#[tokio::test]
async fn test_hsts_outside_development_only() {
    let production = TestApp::offline();
    let resp = production.get("/", None).await;
    assert!(resp.headers().contains_key(header::STRICT_TRANSPORT_SECURITY));

    let development = TestApp::development();
    let resp = development.get("/", None).await;
    assert!(!resp.headers().contains_key(header::STRICT_TRANSPORT_SECURITY));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::offline();
    let resp = app.get("/", None).await;
    let id = resp.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(!id.is_empty());
}
