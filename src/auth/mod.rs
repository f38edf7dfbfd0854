//! Session authentication and the access-control gate for protected pages.
//!
//! The gate runs ahead of routing. Requests under the protected prefix
//! need a valid session token; anything else passes straight through.

mod password;
mod session;

pub use password::*;
pub use session::*;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded;

/// Query parameter the login page reads its return target from.
pub const CALLBACK_PARAM: &str = "callbackUrl";

/// Path prefixes that never require a session (API, build assets, static files).
const EXEMPT_PREFIXES: &[&str] = &["/api", "/_next", "/static"];

/// Settings the gate needs, shared across requests.
pub struct SessionGate {
    pub sessions: Arc<SessionManager>,
    pub protected_prefix: String,
    pub login_path: String,
}

/// How the gate classified a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Outside the protected prefix, or an API/asset path
    Exempt,
    /// Protected path with a valid session
    Authorized(SessionUser),
    /// Protected path without a valid session
    Denied,
}

impl SessionGate {
    /// Decide what happens to a request for `path` with the given headers.
    pub fn decide(&self, path: &str, headers: &axum::http::HeaderMap) -> GateDecision {
        if !is_protected(path, &self.protected_prefix) {
            return GateDecision::Exempt;
        }
        match self.sessions.user_from_headers(headers) {
            Some(user) => GateDecision::Authorized(user),
            None => GateDecision::Denied,
        }
    }
}

/// Session gate middleware.
pub async fn session_gate(
    State(gate): State<Arc<SessionGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.decide(request.uri().path(), request.headers()) {
        GateDecision::Exempt => next.run(request).await,
        GateDecision::Authorized(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        GateDecision::Denied => {
            let location = login_location(&gate.login_path, request.uri());
            tracing::debug!(path = %request.uri().path(), "No session, redirecting to login");
            Redirect::temporary(&location).into_response()
        }
    }
}

/// Whether `path` falls under `prefix` on a segment boundary and is not exempt.
pub fn is_protected(path: &str, prefix: &str) -> bool {
    if EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p)) || path.contains('.') {
        return false;
    }
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Login URL carrying the originally requested path and query as the return target.
pub fn login_location(login_path: &str, original: &Uri) -> String {
    let target = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| original.path());
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(CALLBACK_PARAM, target)
        .finish();
    format!("{}?{}", login_path, query)
}

/// Accept only same-site relative targets for post-login redirects.
pub fn safe_callback(callback: Option<&str>, fallback: &str) -> String {
    match callback {
        Some(target)
            if target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\") =>
        {
            target.to_string()
        }
        _ => fallback.to_string(),
    }
}
