//! Router assembly and the HTTP listener.

use std::any::Any;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http::{header, HeaderValue, StatusCode};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use vestibule_auth::{GateLayer, DEFAULT_CHALLENGE_PATH};
use vestibule_auth_oidc::OidcClient;

use crate::account::{self, SIGNED_OUT_PATH};
use crate::error::{error_page_response, RenderErrorPage};
use crate::routes::{self, request_id, REQUEST_ID_HEADER};
use crate::views;
use crate::{AppState, Result, Settings};

/// HSTS value sent outside development (30 days).
const HSTS: &str = "max-age=2592000";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let gate = GateLayer::new(state.store.clone(), Arc::new(state.gate()))
        .with_challenge_path(DEFAULT_CHALLENGE_PATH);

    let pages = Router::new()
        .route("/", get(routes::index))
        .route("/privacy", get(routes::privacy))
        .route("/profile", get(routes::profile))
        .route("/claims", get(routes::claims))
        .route("/error", get(routes::error))
        .fallback(routes::not_found)
        .layer(gate);

    let handshake = Router::new()
        .route(DEFAULT_CHALLENGE_PATH, get(account::sign_in))
        .route("/account/sign-out", get(account::sign_out))
        .route("/account/reset-password", get(account::reset_password))
        .route("/account/edit-profile", get(account::edit_profile))
        .route(SIGNED_OUT_PATH, get(account::signed_out))
        .route(state.provider.callback_path(), get(account::callback))
        .route(
            state.provider.signed_out_callback_path(),
            get(account::signed_out_callback),
        );

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri().path(),
                request_id = request_id(request.headers()).unwrap_or_default(),
            )
        })
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let mut app = pages
        .merge(handshake)
        .with_state(state.clone())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(render_error_pages))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    if !state.config.server.is_development() {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ));
    }

    app
}

/// Replace tagged responses with the generic error view.
async fn render_error_pages(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;
    if response.extensions().get::<RenderErrorPage>().is_some() {
        return views::error_page(response.status(), request_id.as_deref());
    }
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("<non-string panic>");
    tracing::error!(panic = detail, "Handler panicked");
    error_page_response(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Bind the listener and serve until Ctrl-C or SIGTERM.
pub async fn serve(settings: Settings) -> Result<()> {
    let Settings { app, provider } = settings;
    let provider = Arc::new(provider);
    let oidc = OidcClient::new(provider.clone());
    let bind = app.server.bind;
    let state = AppState::new(app, provider, oidc);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
