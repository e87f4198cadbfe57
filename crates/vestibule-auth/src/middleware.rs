//! Tower middleware that runs the authorization gate on every request.
//!
//! `GateLayer` and `GateService` wrap any inner service. Generic over
//! `SessionResolver` so the session backing can be swapped without
//! touching the decision logic.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use http::{Request, StatusCode};
use tower::{Layer, Service};

use crate::{AuthorizationGate, Challenge, Decision, Session, SessionResolver};

/// Default local endpoint that starts the OIDC flow.
pub const DEFAULT_CHALLENGE_PATH: &str = "/account/sign-in";

/// Query parameter carrying the post-login return target.
pub const RETURN_URL_PARAM: &str = "returnUrl";

/// Tower `Layer` that wraps services with the authorization gate.
pub struct GateLayer<R: SessionResolver> {
    resolver: Arc<R>,
    gate: Arc<AuthorizationGate>,
    challenge_path: Arc<str>,
}

impl<R: SessionResolver> GateLayer<R> {
    /// Create a new gate layer with the given resolver and gate.
    pub fn new(resolver: Arc<R>, gate: Arc<AuthorizationGate>) -> Self {
        Self {
            resolver,
            gate,
            challenge_path: Arc::from(DEFAULT_CHALLENGE_PATH),
        }
    }

    /// Redirect challenges to a different local sign-in endpoint.
    pub fn with_challenge_path(mut self, path: &str) -> Self {
        self.challenge_path = Arc::from(path);
        self
    }
}

// Manual impl: the resolver sits behind an `Arc`, so `R` need not be `Clone`.
impl<R: SessionResolver> Clone for GateLayer<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            gate: self.gate.clone(),
            challenge_path: self.challenge_path.clone(),
        }
    }
}

impl<R: SessionResolver, S> Layer<S> for GateLayer<R> {
    type Service = GateService<R, S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            resolver: self.resolver.clone(),
            gate: self.gate.clone(),
            challenge_path: self.challenge_path.clone(),
        }
    }
}

/// Tower `Service` that gates requests before forwarding them.
///
/// On `Allow` with a valid session, inserts the `Session` into request
/// extensions where it's available to downstream handlers.
pub struct GateService<R: SessionResolver, S> {
    inner: S,
    resolver: Arc<R>,
    gate: Arc<AuthorizationGate>,
    challenge_path: Arc<str>,
}

impl<R: SessionResolver, S: Clone> Clone for GateService<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resolver: self.resolver.clone(),
            gate: self.gate.clone(),
            challenge_path: self.challenge_path.clone(),
        }
    }
}

impl<R, S> Service<Request<Body>> for GateService<R, S>
where
    R: SessionResolver,
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = axum::response::Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let resolver = self.resolver.clone();
        let gate = self.gate.clone();
        let challenge_path = self.challenge_path.clone();

        Box::pin(async move {
            let route = route_identifier(&req);
            let session = resolver.resolve(req.headers()).await;

            match admit(&gate, &route, session, Utc::now()) {
                Ok(session) => {
                    if let Some(session) = session {
                        req.extensions_mut().insert(session);
                    }
                    let resp = inner
                        .call(req)
                        .await
                        .unwrap_or_else(|infallible| match infallible {});
                    Ok(resp.into_response())
                }
                Err(challenge) => {
                    let return_to = original_target(&req);
                    log::debug!(
                        "Challenging unauthenticated request for {route} (policy {})",
                        challenge.policy_id
                    );
                    Ok(challenge_response(&challenge_path, &challenge, &return_to))
                }
            }
        })
    }
}

/// Decide a request at a single instant. On success, yields the session
/// handlers may see: only one that is still valid at `now`.
fn admit(
    gate: &AuthorizationGate,
    route: &str,
    session: Option<Session>,
    now: DateTime<Utc>,
) -> Result<Option<Session>, Challenge> {
    match gate.authorize_at(route, session.as_ref(), now) {
        Decision::Allow => Ok(session.filter(|s| s.is_valid_at(now))),
        Decision::ChallengeRedirect(challenge) => Err(challenge),
    }
}

/// Route identifier used for the allow-list: the matched route pattern
/// when axum provides one, otherwise the raw path.
fn route_identifier(req: &Request<Body>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

/// The concrete path and query the caller asked for.
fn original_target(req: &Request<Body>) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Build a 302 redirect to the local challenge endpoint.
fn challenge_response(
    challenge_path: &str,
    challenge: &Challenge,
    return_to: &str,
) -> axum::response::Response {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(RETURN_URL_PARAM, return_to)
        .finish();
    let location = format!("{challenge_path}?{query}");

    let mut response = StatusCode::FOUND.into_response();
    match http::HeaderValue::from_str(&location) {
        Ok(value) => {
            response.headers_mut().insert(http::header::LOCATION, value);
        }
        Err(e) => {
            log::error!(
                "Unencodable challenge location for policy {}: {e}",
                challenge.policy_id
            );
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    response
}
