//! Route authorization: allow-list first, then "must be authenticated".
//!
//! The precedence is an explicit ordered check rather than two layers
//! whose interaction depends on registration order:
//!
//! 1. route in the anonymous allow-list → [`Decision::Allow`]
//! 2. valid session present → [`Decision::Allow`]
//! 3. otherwise → [`Decision::ChallengeRedirect`]
//!
//! Every route that is not listed is protected. The gate is a pure
//! function of its inputs; it holds no counters and performs no I/O.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::Session;

/// Authorization rule for a single route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Route pattern or page identifier, e.g. `/privacy`.
    pub route: String,
    /// Whether unauthenticated callers may reach it.
    pub anonymous: bool,
}

impl RoutePolicy {
    /// A route reachable without signing in.
    pub fn anonymous(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            anonymous: true,
        }
    }

    /// A route that requires an authenticated session.
    pub fn authenticated(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            anonymous: false,
        }
    }
}

/// Immutable set of routes exempt from the authentication requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    routes: HashSet<String>,
}

impl AllowList {
    /// Build an allow-list from route policies; only anonymous entries count.
    pub fn from_policies<I>(policies: I) -> Self
    where
        I: IntoIterator<Item = RoutePolicy>,
    {
        let routes = policies
            .into_iter()
            .filter(|p| p.anonymous)
            .map(|p| normalize_route(&p.route))
            .collect();
        Self { routes }
    }

    /// Build an allow-list from plain route strings.
    pub fn from_routes<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_policies(
            routes
                .into_iter()
                .map(|r| RoutePolicy::anonymous(r.as_ref())),
        )
    }

    /// Whether the route is exempt.
    pub fn contains(&self, route: &str) -> bool {
        self.routes.contains(&normalize_route(route))
    }

    /// Number of exempt routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no route is exempt.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for AllowList {
    /// The landing page and the privacy page.
    fn default() -> Self {
        Self::from_routes(["/", "/privacy"])
    }
}

/// Normalise a route identifier for allow-list comparison.
///
/// Drops any query string or fragment, lowercases ASCII, and removes
/// trailing slashes (the root stays `/`).
pub fn normalize_route(route: &str) -> String {
    let path = route.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with('/') {
        lowered
    } else {
        format!("/{lowered}")
    }
}

/// Instruction to start (or resume) the OIDC flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Provider policy to run, always the sign-up/sign-in policy here.
    pub policy_id: String,
    /// The originally requested route, to return to after sign-in.
    pub return_to: String,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The caller must authenticate first.
    ChallengeRedirect(Challenge),
}

/// Global fallback policy evaluator.
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    allow_list: AllowList,
    sign_up_sign_in_policy_id: String,
}

impl AuthorizationGate {
    /// Create a gate with the given exemptions, challenging against the
    /// given sign-up/sign-in policy.
    pub fn new(allow_list: AllowList, sign_up_sign_in_policy_id: impl Into<String>) -> Self {
        Self {
            allow_list,
            sign_up_sign_in_policy_id: sign_up_sign_in_policy_id.into(),
        }
    }

    /// The exempt routes.
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Decide whether `route` may proceed given the current session.
    pub fn authorize(&self, route: &str, session: Option<&Session>) -> Decision {
        self.authorize_at(route, session, Utc::now())
    }

    /// [`authorize`](Self::authorize) evaluated at a fixed instant.
    ///
    /// `route` is the route identifier used for the allow-list check; the
    /// return target recorded on a challenge is `route` verbatim.
    pub fn authorize_at(
        &self,
        route: &str,
        session: Option<&Session>,
        now: DateTime<Utc>,
    ) -> Decision {
        if self.allow_list.contains(route) {
            return Decision::Allow;
        }

        // Expired is the same as absent
        if session.is_some_and(|s| s.is_valid_at(now)) {
            return Decision::Allow;
        }

        Decision::ChallengeRedirect(Challenge {
            policy_id: self.sign_up_sign_in_policy_id.clone(),
            return_to: route.to_string(),
        })
    }
}
