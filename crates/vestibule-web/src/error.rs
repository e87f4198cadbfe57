//! Error types for the web front end.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;
use vestibule_auth::AuthError;

/// Result type alias for vestibule-web operations.
pub type Result<T> = std::result::Result<T, WebError>;

/// Errors raised while loading settings or serving a request.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WebError {
    /// Error from the auth layer or the OIDC client.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Settings could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Response extension asking the error-page middleware to replace the body
/// with the generic error view.
#[derive(Debug, Clone, Copy)]
pub struct RenderErrorPage;

/// A bare status response tagged for the error view.
pub fn error_page_response(status: StatusCode) -> Response {
    let mut response = status.into_response();
    response.extensions_mut().insert(RenderErrorPage);
    response
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Auth(AuthError::PolicyNotConfigured(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        error_page_response(status)
    }
}
