//! Route classification settings.

use serde::{Deserialize, Serialize};

/// Which paths are public, which are auth-flow pages, and where redirects go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Sign-in page, target of unauthenticated redirects
    pub sign_in_path: String,
    /// Landing page for signed-in users
    pub dashboard_path: String,
    /// Prefix of the authentication API, always passed through
    pub api_auth_prefix: String,
    /// Prefix of the auth-flow pages (sign in, sign up, error)
    pub auth_prefix: String,
    /// Paths reachable without a session
    pub public_paths: Vec<String>,
    /// Send signed-in users from `/` to the dashboard
    pub redirect_home_when_authenticated: bool,
    /// Query parameter carrying the original destination
    pub callback_param: String,
    /// Prefixes of framework static files
    pub static_prefixes: Vec<String>,
    /// Prefixes the guard never sees, such as API routes that answer for themselves
    pub unguarded_prefixes: Vec<String>,
    /// File extensions served as static images
    pub static_extensions: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            sign_in_path: "/auth/signin".to_string(),
            dashboard_path: "/dashboard".to_string(),
            api_auth_prefix: "/api/auth".to_string(),
            auth_prefix: "/auth".to_string(),
            public_paths: ["/", "/auth/signin", "/auth/signup", "/auth/error"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            redirect_home_when_authenticated: true,
            callback_param: "callbackUrl".to_string(),
            static_prefixes: ["/_next/static", "/_next/image", "/favicon.ico"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            unguarded_prefixes: vec!["/api".to_string()],
            static_extensions: ["svg", "png", "jpg", "jpeg", "gif", "webp"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl RouteConfig {
    /// Whether `path` is a static file or image.
    pub fn is_static(&self, path: &str) -> bool {
        if self
            .static_prefixes
            .iter()
            .any(|prefix| under_prefix(path, prefix))
        {
            return true;
        }

        let file = path.rsplit('/').next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self
                .static_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }

    /// Whether `path` sits under one of the unguarded prefixes.
    pub fn is_unguarded(&self, path: &str) -> bool {
        self.unguarded_prefixes
            .iter()
            .any(|prefix| under_prefix(path, prefix))
    }

    /// Whether `path` belongs to the authentication API.
    pub fn is_api_auth(&self, path: &str) -> bool {
        under_prefix(path, &self.api_auth_prefix)
    }

    /// Whether `path` is an auth-flow page.
    pub fn is_auth_page(&self, path: &str) -> bool {
        under_prefix(path, &self.auth_prefix)
    }

    /// Whether `path` is listed as public. Matching is exact.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }
}

/// Segment-aware prefix match: `/auth` covers `/auth` and `/auth/x`, not `/authors`.
pub(crate) fn under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_prefix() {
        assert!(under_prefix("/auth", "/auth"));
        assert!(under_prefix("/auth/signin", "/auth"));
        assert!(under_prefix("/auth/signin", "/auth/"));
        assert!(!under_prefix("/authors", "/auth"));
        assert!(!under_prefix("/api", "/api/auth"));
    }

    #[test]
    fn test_static_detection() {
        let routes = RouteConfig::default();
        assert!(routes.is_static("/_next/static/chunks/main.js"));
        assert!(routes.is_static("/favicon.ico"));
        assert!(routes.is_static("/images/logo.SVG"));
        assert!(routes.is_static("/hero.webp"));
        assert!(!routes.is_static("/dashboard"));
        assert!(!routes.is_static("/exercises/bench.press"));
        assert!(!routes.is_static("/.png"));
    }

    #[test]
    fn test_unguarded_detection() {
        let routes = RouteConfig::default();
        assert!(routes.is_unguarded("/api"));
        assert!(routes.is_unguarded("/api/exercises"));
        assert!(!routes.is_unguarded("/apiary"));
        assert!(!routes.is_unguarded("/dashboard"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let routes: RouteConfig = serde_yaml::from_str("dashboard_path: /home\n").unwrap();
        assert_eq!(routes.dashboard_path, "/home");
        assert_eq!(routes.sign_in_path, "/auth/signin");
        assert_eq!(routes.public_paths.len(), 4);
    }
}
