//! Integration tests for error page rendering.

use axum::body::Body;
use http::{header, Request, StatusCode};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{body_text, location, TestApp};

#[tokio::test]
async fn test_provider_outage_renders_error_view_with_request_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/\.well-known/openid-configuration$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = TestApp::discovering(&server.uri());

    let request = Request::builder()
        .uri("/account/sign-in")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let resp = app.send(request).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store, no-cache"
    );
    assert_eq!(resp.headers().get(header::PRAGMA).unwrap(), "no-cache");
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "req-123");

    let body = body_text(resp).await;
    assert!(body.contains("req-123"));
    assert!(!body.contains("openid-configuration"));
    assert!(!body.contains("HTTP 500"));
}

#[tokio::test]
async fn test_generated_request_id_is_shown_on_error_view() {
    let app = TestApp::offline();
    let resp = app.get("/account/edit-profile", None).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let id = resp
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = body_text(resp).await;
    assert!(body.contains(&id));
}

#[tokio::test]
async fn test_unknown_route_challenges_anonymous_caller() {
    let app = TestApp::offline();
    let resp = app.get("/does-not-exist?x=1", None).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        "/account/sign-in?returnUrl=%2Fdoes-not-exist%3Fx%3D1"
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found_when_signed_in() {
    let app = TestApp::offline();
    let cookie = app.sign_in();

    let resp = app.get("/does-not-exist", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
