//! Route lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest prefix wins; ties keep configuration order
//! - O(n) scan (acceptable for typical route counts)
//! - Explicit no-match rather than silent default

use crate::config::RouteConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub matcher: PathPrefixMatcher,
    pub backend: String,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// Service to schedule against.
    pub backend: &'a str,
    /// Prefix that matched.
    pub prefix: &'a str,
    /// Request path with the prefix stripped.
    pub forward_path: String,
}

/// Ordered set of routes.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes from configuration.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs
            .iter()
            .map(|c| Route {
                matcher: PathPrefixMatcher::new(c.path_prefix.clone()),
                backend: c.backend.clone(),
            })
            .collect();
        // Stable: equal lengths keep file order.
        routes.sort_by(|a, b| b.matcher.prefix().len().cmp(&a.matcher.prefix().len()));

        tracing::debug!(routes = routes.len(), "Route table compiled");
        Self { routes }
    }

    /// Find the route for `path`.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            route.matcher.strip(path).map(|forward_path| RouteMatch {
                backend: &route.backend,
                prefix: route.matcher.prefix(),
                forward_path,
            })
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
