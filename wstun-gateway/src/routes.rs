//! Gateway-side route tables (§3 TunnelRoute/HttpRoute, §5 "built once, read
//! concurrently thereafter").

use std::collections::HashMap;

use wstun_core::{Credential, RouteName};

/// `{ name, upstream_addr, auth?, disabled }` (§3). Built once at startup
/// and never mutated afterward — no lock is needed to read it from the
/// many concurrent upgrade handlers.
#[derive(Debug, Clone)]
pub struct TunnelRoute {
    pub name: RouteName,
    pub upstream_addr: String,
    pub auth: Option<Credential>,
    pub disabled: bool,
}

/// `{ prefix, upstream_addr, dir_mode, path_header, disabled }` (§3, §4.5).
#[derive(Debug, Clone)]
pub struct HttpRoute {
    pub prefix: String,
    pub upstream_addr: String,
    pub dir_mode: bool,
    pub path_header: String,
    pub disabled: bool,
}

impl HttpRoute {
    pub fn is_root(&self) -> bool {
        self.prefix == "/"
    }

    /// Canonical prefix: `dir_mode` routes always end with a trailing slash.
    pub fn canonical_prefix(&self) -> String {
        if self.dir_mode && !self.prefix.ends_with('/') {
            format!("{}/", self.prefix)
        } else {
            self.prefix.clone()
        }
    }
}

/// The gateway's complete, immutable route table (§3 Ownership: "the
/// gateway's HTTP server owns the TunnelRoute table, read-only after
/// startup").
pub struct RouteTable {
    pub tunnel_routes: HashMap<String, TunnelRoute>,
    /// Non-root HTTP routes, longest prefix first so a linear scan performs
    /// longest-prefix match.
    pub http_routes: Vec<HttpRoute>,
    pub root_route: Option<HttpRoute>,
}

impl RouteTable {
    pub fn lookup_tunnel(&self, name: &str) -> Option<&TunnelRoute> {
        self.tunnel_routes
            .get(name)
            .filter(|route| !route.disabled)
    }

    /// Longest-prefix match among the non-root HTTP routes.
    pub fn match_http(&self, path: &str) -> Option<&HttpRoute> {
        self.http_routes
            .iter()
            .find(|route| !route.disabled && path_matches(path, &route.canonical_prefix()))
    }
}

fn path_matches(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Logs the composed route table once at startup (§4.6).
pub fn log_table(table: &RouteTable) {
    let mut tunnel_names: Vec<&str> = table.tunnel_routes.keys().map(String::as_str).collect();
    tunnel_names.sort_unstable();
    for name in tunnel_names {
        let route = &table.tunnel_routes[name];
        tracing::info!(
            route = name,
            upstream = %route.upstream_addr,
            disabled = route.disabled,
            auth = route.auth.is_some(),
            "tunnel route"
        );
    }
    if let Some(root) = &table.root_route {
        tracing::info!(upstream = %root.upstream_addr, "http route / (root fallback)");
    }
    for route in &table.http_routes {
        tracing::info!(
            prefix = %route.canonical_prefix(),
            upstream = %route.upstream_addr,
            dir_mode = route.dir_mode,
            "http route"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel_route(name: &str, disabled: bool) -> TunnelRoute {
        TunnelRoute {
            name: RouteName::new(name).unwrap(),
            upstream_addr: "127.0.0.1:9000".to_string(),
            auth: None,
            disabled,
        }
    }

    fn http_route(prefix: &str, dir_mode: bool, disabled: bool) -> HttpRoute {
        HttpRoute {
            prefix: prefix.to_string(),
            upstream_addr: "127.0.0.1:9100".to_string(),
            dir_mode,
            path_header: "X-Forwarded-Prefix".to_string(),
            disabled,
        }
    }

    fn table(http_routes: Vec<HttpRoute>) -> RouteTable {
        RouteTable {
            tunnel_routes: HashMap::new(),
            http_routes,
            root_route: None,
        }
    }

    #[test]
    fn lookup_tunnel_finds_enabled_route() {
        let mut tunnel_routes = HashMap::new();
        tunnel_routes.insert("echo".to_string(), tunnel_route("echo", false));
        let t = RouteTable {
            tunnel_routes,
            http_routes: Vec::new(),
            root_route: None,
        };
        assert!(t.lookup_tunnel("echo").is_some());
        assert!(t.lookup_tunnel("nope").is_none());
    }

    #[test]
    fn lookup_tunnel_excludes_disabled_routes() {
        let mut tunnel_routes = HashMap::new();
        tunnel_routes.insert("echo".to_string(), tunnel_route("echo", true));
        let t = RouteTable {
            tunnel_routes,
            http_routes: Vec::new(),
            root_route: None,
        };
        assert!(t.lookup_tunnel("echo").is_none());
    }

    #[test]
    fn match_http_picks_the_longest_overlapping_prefix() {
        let t = table(vec![
            http_route("/api/v2", false, false),
            http_route("/api", false, false),
        ]);
        let matched = t.match_http("/api/v2/users").unwrap();
        assert_eq!(matched.prefix, "/api/v2");
    }

    #[test]
    fn match_http_falls_back_to_the_shorter_prefix_outside_the_longer_ones_scope() {
        let t = table(vec![
            http_route("/api/v2", false, false),
            http_route("/api", false, false),
        ]);
        let matched = t.match_http("/api/widgets").unwrap();
        assert_eq!(matched.prefix, "/api");
    }

    #[test]
    fn match_http_excludes_disabled_routes() {
        let t = table(vec![http_route("/api", false, true)]);
        assert!(t.match_http("/api/x").is_none());
    }

    #[test]
    fn path_matches_accepts_the_bare_prefix_and_rejects_lookalike_siblings() {
        assert!(path_matches("/api", "/api/"));
        assert!(path_matches("/api/x", "/api/"));
        assert!(!path_matches("/apix", "/api/"));
    }
}
