//! Per-request route decisions.

use serde::Serialize;
use tracing::trace;
use url::form_urlencoded;

use super::routes::RouteConfig;

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Let the request through
    Allow,
    /// Send the caller to sign in, then back to `callback_url`
    RedirectToSignIn { callback_url: String },
    /// Send a signed-in caller to the dashboard
    RedirectToDashboard,
}

impl RouteDecision {
    /// Whether the request passes through unchanged.
    pub fn is_allow(&self) -> bool {
        matches!(self, RouteDecision::Allow)
    }

    /// Redirect target, or `None` for [`RouteDecision::Allow`].
    ///
    /// The callback is percent-encoded: `/dashboard` becomes
    /// `/auth/signin?callbackUrl=%2Fdashboard`.
    pub fn location(&self, routes: &RouteConfig) -> Option<String> {
        match self {
            RouteDecision::Allow => None,
            RouteDecision::RedirectToDashboard => Some(routes.dashboard_path.clone()),
            RouteDecision::RedirectToSignIn { callback_url } => {
                let query = form_urlencoded::Serializer::new(String::new())
                    .append_pair(&routes.callback_param, callback_url)
                    .finish();
                Some(format!("{}?{}", routes.sign_in_path, query))
            }
        }
    }
}

/// Classifies requests into allow or redirect.
///
/// Pure and stateless: the outcome depends only on the target, the
/// logged-in signal and the route configuration.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RouteConfig,
}

impl RouteGuard {
    /// A guard over the given route settings.
    pub fn new(routes: RouteConfig) -> Self {
        Self { routes }
    }

    /// Route settings in effect.
    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Decide what to do with a request for `target` (path plus optional `?query`).
    ///
    /// Rules apply in order; the first that matches wins.
    pub fn decide(&self, target: &str, is_logged_in: bool) -> RouteDecision {
        let path = target.split_once('?').map(|(p, _)| p).unwrap_or(target);
        let routes = &self.routes;

        let decision = if routes.is_static(path)
            || routes.is_unguarded(path)
            || routes.is_api_auth(path)
        {
            RouteDecision::Allow
        } else if path == "/" && is_logged_in && routes.redirect_home_when_authenticated {
            RouteDecision::RedirectToDashboard
        } else if routes.is_auth_page(path) && is_logged_in {
            RouteDecision::RedirectToDashboard
        } else if routes.is_public(path) {
            RouteDecision::Allow
        } else if !is_logged_in {
            RouteDecision::RedirectToSignIn {
                callback_url: target.to_string(),
            }
        } else {
            RouteDecision::Allow
        };

        trace!(route = %target, is_logged_in, decision = ?decision, "Route decided");
        decision
    }
}
