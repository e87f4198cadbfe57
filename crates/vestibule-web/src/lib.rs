//! Vestibule web front end.
//!
//! An axum application that signs users in through a policy-based OpenID
//! Connect provider and gates every page behind an authenticated session
//! unless the route is on the anonymous allow-list.
//!
//! Request pipeline, outermost first:
//! - request id assignment and propagation (`x-request-id`)
//! - HTTP tracing
//! - error page rendering for failed handlers
//! - panic recovery
//! - the authorization gate (page routes only)
//!
//! The account handshake endpoints (`/account/*` and the provider
//! callbacks) sit outside the gate.

pub mod account;
pub mod error;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;
pub mod store;
pub mod views;

pub use error::{Result, WebError};
pub use server::{router, serve};
pub use settings::{AppConfig, GateSettings, ServerSettings, SessionSettings, Settings};
pub use state::AppState;
pub use store::SessionStore;
