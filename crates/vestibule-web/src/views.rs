//! HTML views.
//!
//! Plain `format!` templates around a shared layout. Every dynamic value
//! goes through [`escape_html`].

use axum::response::{Html, IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};
use vestibule_auth::{Claim, ClaimsView, Policy, ProviderConfig, Session};

const APP_NAME: &str = "Vestibule";

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Navigation-relevant facts about the current request.
#[derive(Debug, Clone, Copy)]
pub struct Nav<'a> {
    /// The signed-in session, if any.
    pub session: Option<&'a Session>,
    /// Whether the edit-profile flow is configured.
    pub can_edit_profile: bool,
    /// Whether the reset-password flow is configured.
    pub can_reset_password: bool,
}

impl<'a> Nav<'a> {
    /// Navigation for `session` under `provider`'s configured flows.
    pub fn new(session: Option<&'a Session>, provider: &ProviderConfig) -> Self {
        Self {
            session,
            can_edit_profile: provider.supports(Policy::EditProfile),
            can_reset_password: provider.supports(Policy::ResetPassword),
        }
    }

    /// Navigation with no session and no optional flows.
    pub fn anonymous() -> Self {
        Self {
            session: None,
            can_edit_profile: false,
            can_reset_password: false,
        }
    }
}

fn layout(title: &str, nav: Nav<'_>, body: &str) -> String {
    let account = match nav.session {
        Some(session) => {
            let name = escape_html(session.display_name().unwrap_or("account"));
            let edit = if nav.can_edit_profile {
                r#"<a href="/account/edit-profile">Edit profile</a>"#
            } else {
                ""
            };
            format!(
                r#"<span class="user">Hello, {name}</span> {edit} <a href="/account/sign-out">Sign out</a>"#
            )
        }
        None => {
            let reset = if nav.can_reset_password {
                r#"<a href="/account/reset-password">Reset password</a>"#
            } else {
                ""
            };
            format!(r#"{reset} <a href="/account/sign-in">Sign in</a>"#)
        }
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title} - {APP_NAME}</title>
</head>
<body>
<header>
<nav>
<a href="/">{APP_NAME}</a>
<a href="/">Home</a>
<a href="/privacy">Privacy</a>
<a href="/profile">Profile</a>
<a href="/claims">Claims</a>
<span class="account">{account}</span>
</nav>
</header>
<main>
{body}
</main>
<footer>&copy; {APP_NAME} - <a href="/privacy">Privacy</a></footer>
</body>
</html>
"#,
        title = escape_html(title),
    )
}

/// Landing page.
pub fn index(nav: Nav<'_>) -> Html<String> {
    let greeting = match nav.session.and_then(Session::display_name) {
        Some(name) => format!("<p>Signed in as {}.</p>", escape_html(name)),
        None => "<p>Sign in to see your profile.</p>".to_string(),
    };
    Html(layout(
        "Home",
        nav,
        &format!("<h1>Welcome</h1>\n{greeting}"),
    ))
}

/// Privacy notice.
pub fn privacy(nav: Nav<'_>) -> Html<String> {
    Html(layout(
        "Privacy Policy",
        nav,
        "<h1>Privacy Policy</h1>\n<p>Use this page to detail your site's privacy policy.</p>",
    ))
}

/// Profile page: one row per claim type.
pub fn profile(nav: Nav<'_>, claims: &ClaimsView) -> Html<String> {
    let rows: String = claims
        .iter()
        .map(|(claim_type, value)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape_html(claim_type),
                escape_html(value)
            )
        })
        .collect();
    Html(layout(
        "Profile",
        nav,
        &format!(
            "<h1>Profile</h1>\n<table>\n<thead><tr><th>Claim</th><th>Value</th></tr></thead>\n<tbody>\n{rows}</tbody>\n</table>"
        ),
    ))
}

/// Raw claim list, repeated types included.
pub fn claims(nav: Nav<'_>, claims: &[Claim]) -> Html<String> {
    let items: String = claims
        .iter()
        .map(|c| {
            format!(
                "<li><strong>{}</strong>: {}</li>\n",
                escape_html(&c.claim_type),
                escape_html(&c.value)
            )
        })
        .collect();
    Html(layout(
        "Claims",
        nav,
        &format!("<h1>Claims</h1>\n<ul>\n{items}</ul>"),
    ))
}

/// Shown after a completed sign-out.
pub fn signed_out() -> Html<String> {
    Html(layout(
        "Signed out",
        Nav::anonymous(),
        "<h1>Signed out</h1>\n<p>You have successfully signed out.</p>",
    ))
}

/// The generic error view with caching disabled.
///
/// Shows only the request id, never error details or claims.
pub fn error_page(status: StatusCode, request_id: Option<&str>) -> Response {
    let request_id = match request_id {
        Some(id) => format!(
            "<p><strong>Request ID:</strong> <code>{}</code></p>",
            escape_html(id)
        ),
        None => String::new(),
    };
    let html = layout(
        "Error",
        Nav::anonymous(),
        &format!(
            "<h1>Error.</h1>\n<h2>An error occurred while processing your request.</h2>\n{request_id}"
        ),
    );

    let mut response = (status, Html(html)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
