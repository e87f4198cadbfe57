//! In-memory session store.
//!
//! Holds signed-in sessions keyed by an opaque cookie value and sign-in
//! attempts keyed by their `state` until the provider calls back. Both
//! maps are bounded by expiry: sessions by the ID token lifetime, pending
//! attempts by [`PENDING_TTL`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vestibule_auth::{Session, SessionResolver};
use vestibule_auth_oidc::PendingSignIn;

/// How long a sign-in attempt may take before its callback is refused.
pub const PENDING_TTL: Duration = Duration::from_secs(600);

struct PendingEntry {
    pending: PendingSignIn,
    created_at: Instant,
}

/// Server-side session and sign-in state.
pub struct SessionStore {
    cookie_name: String,
    sessions: RwLock<HashMap<String, Session>>,
    pending: RwLock<HashMap<String, PendingEntry>>,
}

impl SessionStore {
    /// Create an empty store whose sessions are looked up via `cookie_name`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            sessions: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the cookie carrying the session id.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Store a freshly verified session and return its id.
    pub fn insert_session(&self, session: Session) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        sessions.retain(|_, s| s.is_valid_at(now));
        sessions.insert(id.clone(), session);
        id
    }

    /// Look up a session that is still valid.
    pub fn session(&self, id: &str) -> Option<Session> {
        self.session_at(id, Utc::now())
    }

    /// Look up a session that is valid at `now`.
    pub fn session_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).filter(|s| s.is_valid_at(now)).cloned()
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Number of stored sessions, including expired ones not yet purged.
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Remember a sign-in attempt until its callback arrives.
    pub fn insert_pending(&self, pending: PendingSignIn) {
        let mut map = self.pending.write().unwrap_or_else(PoisonError::into_inner);
        map.retain(|_, e| e.created_at.elapsed() < PENDING_TTL);
        map.insert(
            pending.state.clone(),
            PendingEntry {
                pending,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return the attempt for `state`. Each attempt can be taken
    /// once; stale attempts are discarded.
    pub fn take_pending(&self, state: &str) -> Option<PendingSignIn> {
        let entry = self
            .pending
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)?;
        if entry.created_at.elapsed() >= PENDING_TTL {
            tracing::debug!("Discarding stale sign-in attempt");
            return None;
        }
        Some(entry.pending)
    }

    /// Session id carried by the request's cookie, if any.
    pub fn session_id(&self, headers: &http::HeaderMap) -> Option<String> {
        CookieJar::from_headers(headers)
            .get(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl SessionResolver for SessionStore {
    fn resolve(
        &self,
        headers: &http::HeaderMap,
    ) -> Pin<Box<dyn Future<Output = Option<Session>> + Send + '_>> {
        let session = self.session_id(headers).and_then(|id| self.session(&id));
        Box::pin(async move { session })
    }
}
