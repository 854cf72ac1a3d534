//! Gateway configuration: a small CLI surface (clap) layered over a YAML
//! file that carries the route tables (`tcp_sockets`/`http` shape). Nested
//! maps don't fit cleanly into CLI flags, so only the scalar settings are
//! CLI-overridable; routes always come from the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use wstun_core::{Credential, RouteName};

use crate::error::ConfigError;
use crate::routes::{HttpRoute, RouteTable, TunnelRoute};

/// Gateway (`wstun server`) CLI flags. Anything route-shaped lives in the
/// YAML file named by `--config`.
#[derive(Parser, Debug, Clone)]
pub struct GatewayArgs {
    /// Path to the gateway's YAML configuration file.
    #[arg(long, env = "WSTUN_GATEWAY_CONFIG", default_value = "wstun-gateway.yaml")]
    pub config: PathBuf,

    /// Address to listen on, overrides the file's `addr`.
    #[arg(long, env = "WSTUN_GATEWAY_ADDR")]
    pub addr: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WSTUN_GATEWAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "WSTUN_GATEWAY_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialFile {
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub disabled: bool,
}

impl From<CredentialFile> for Credential {
    fn from(c: CredentialFile) -> Self {
        Credential {
            user: c.user,
            password: c.password,
            disabled: c.disabled,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TunnelRouteFile {
    pub addr: String,
    pub auth: Option<CredentialFile>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpRouteFile {
    pub addr: String,
    #[serde(default)]
    pub dir: bool,
    #[serde(default = "default_path_header")]
    pub path_header: String,
    #[serde(default)]
    pub disabled: bool,
}

fn default_path_header() -> String {
    "X-Forwarded-Prefix".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TcpSocketsFile {
    pub handshake_timeout: Option<u64>,
    pub dial_timeout: Option<u64>,
    /// Accepted but applied only at the outer HTTP server level (§9 Open
    /// Question — documented as a real write deadline in DESIGN.md).
    pub write_timeout: Option<u64>,
    #[serde(default)]
    pub compression_enabled: bool,
    pub auth: Option<CredentialFile>,
    #[serde(default)]
    pub routes: HashMap<String, TunnelRouteFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpFile {
    #[serde(default)]
    pub routes: HashMap<String, HttpRouteFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfigFile {
    pub addr: String,
    pub not_found: Option<String>,
    #[serde(default)]
    pub not_found_disabled: bool,
    #[serde(default)]
    pub tcp_sockets: TcpSocketsFile,
    #[serde(default)]
    pub http: HttpFile,
}

impl GatewayConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// The fully-resolved configuration the dispatcher and server run against.
pub struct Config {
    pub addr: String,
    pub not_found: Option<PathBuf>,
    pub not_found_disabled: bool,
    pub handshake_timeout: Duration,
    pub dial_timeout: Duration,
    pub write_timeout: Duration,
    pub compression_enabled: bool,
    pub table: RouteTable,
}

impl Config {
    /// Merges CLI args over the YAML file (CLI > file > default) and
    /// builds the immutable route table.
    pub fn load(args: &GatewayArgs) -> anyhow::Result<Self> {
        let file = GatewayConfigFile::load(&args.config)?;
        let addr = args.addr.clone().unwrap_or(file.addr);

        let global_auth = file.tcp_sockets.auth.clone().map(Credential::from);

        let mut tunnel_routes = Vec::with_capacity(file.tcp_sockets.routes.len());
        for (name, entry) in file.tcp_sockets.routes {
            let route_name = RouteName::new(&name).map_err(|e| ConfigError::InvalidRoute {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            let auth = entry
                .auth
                .map(Credential::from)
                .or_else(|| global_auth.clone());
            tunnel_routes.push(TunnelRoute {
                name: route_name,
                upstream_addr: entry.addr,
                auth,
                disabled: entry.disabled,
            });
        }

        let mut all_http_routes = Vec::with_capacity(file.http.routes.len());
        for (prefix, entry) in file.http.routes {
            all_http_routes.push(HttpRoute {
                prefix,
                upstream_addr: entry.addr,
                dir_mode: entry.dir,
                path_header: entry.path_header,
                disabled: entry.disabled,
            });
        }

        Self::validate(&tunnel_routes, &all_http_routes)?;

        let mut root_route = None;
        let mut http_routes: Vec<HttpRoute> = Vec::with_capacity(all_http_routes.len());
        for route in all_http_routes {
            if route.is_root() {
                root_route = Some(route);
            } else {
                http_routes.push(route);
            }
        }
        // Longest prefix first so `RouteTable::match_http`'s linear scan
        // implements longest-prefix match (§3 HttpRoute invariant).
        http_routes.sort_by_key(|r| std::cmp::Reverse(r.canonical_prefix().len()));

        let tunnel_routes: HashMap<String, TunnelRoute> = tunnel_routes
            .into_iter()
            .map(|r| (r.name.as_str().to_string(), r))
            .collect();

        Ok(Config {
            addr,
            not_found: file.not_found.map(PathBuf::from),
            not_found_disabled: file.not_found_disabled,
            handshake_timeout: Duration::from_secs(
                file.tcp_sockets.handshake_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            dial_timeout: Duration::from_secs(
                file.tcp_sockets.dial_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            write_timeout: Duration::from_secs(
                file.tcp_sockets.write_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            compression_enabled: file.tcp_sockets.compression_enabled,
            table: RouteTable {
                tunnel_routes,
                http_routes,
                root_route,
            },
        })
    }

    /// Checks the structural invariants the data model declares (§12):
    /// non-empty route names (already enforced by `RouteName::new` at
    /// construction), unique tunnel route names, unique HTTP route
    /// prefixes, and at most one root HTTP route. Runs before the route
    /// table is assembled, so a collision fails `load()` instead of one
    /// entry silently shadowing another.
    fn validate(tunnel_routes: &[TunnelRoute], http_routes: &[HttpRoute]) -> Result<(), ConfigError> {
        let mut seen_names = std::collections::HashSet::new();
        for route in tunnel_routes {
            if !seen_names.insert(route.name.as_str()) {
                return Err(ConfigError::DuplicateRoute(route.name.as_str().to_string()));
            }
        }

        let mut seen_prefixes = std::collections::HashSet::new();
        let mut root_count = 0;
        for route in http_routes {
            if route.is_root() {
                root_count += 1;
                if root_count > 1 {
                    return Err(ConfigError::MultipleRootRoutes);
                }
                continue;
            }
            let prefix = route.canonical_prefix();
            if !seen_prefixes.insert(prefix.clone()) {
                return Err(ConfigError::DuplicateHttpPrefix(prefix));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &str) -> tempfile_path::TempYaml {
        tempfile_path::TempYaml::new(content)
    }

    /// Minimal hand-rolled temp-file helper, avoiding a `tempfile`
    /// dependency for just a few tests.
    mod tempfile_path {
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct TempYaml {
            pub path: PathBuf,
        }

        impl TempYaml {
            pub fn new(content: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!(
                    "wstun-gateway-test-{}-{}.yaml",
                    std::process::id(),
                    COUNTER.fetch_add(1, Ordering::Relaxed)
                ));
                std::fs::write(&path, content).unwrap();
                Self { path }
            }
        }

        impl Drop for TempYaml {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn tunnel_routes_load_from_the_file() {
        let yaml = write_temp(
            r#"
addr: "0.0.0.0:8080"
tcp_sockets:
  routes:
    echo:
      addr: "127.0.0.1:9000"
"#,
        );
        let args = GatewayArgs {
            config: yaml.path.clone(),
            addr: None,
            log_level: "info".to_string(),
            log_json: false,
        };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert!(config.table.tunnel_routes.contains_key("echo"));
    }

    #[test]
    fn at_most_one_root_http_route_is_allowed() {
        let yaml = write_temp(
            r#"
addr: "0.0.0.0:8080"
http:
  routes:
    "/":
      addr: "127.0.0.1:9100"
    "/api":
      addr: "127.0.0.1:9200"
      dir: true
"#,
        );
        let args = GatewayArgs {
            config: yaml.path.clone(),
            addr: None,
            log_level: "info".to_string(),
            log_json: false,
        };
        let config = Config::load(&args).unwrap();
        assert!(config.table.root_route.is_some());
        assert_eq!(config.table.http_routes.len(), 1);
    }

    #[test]
    fn duplicate_http_prefixes_are_rejected() {
        let yaml = write_temp(
            r#"
addr: "0.0.0.0:8080"
http:
  routes:
    "/api":
      addr: "127.0.0.1:9100"
      dir: true
    "/api/":
      addr: "127.0.0.1:9200"
"#,
        );
        let args = GatewayArgs {
            config: yaml.path.clone(),
            addr: None,
            log_level: "info".to_string(),
            log_json: false,
        };
        let err = Config::load(&args).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn cli_addr_overrides_file_addr() {
        let yaml = write_temp("addr: \"0.0.0.0:8080\"\n");
        let args = GatewayArgs {
            config: yaml.path.clone(),
            addr: Some("0.0.0.0:9999".to_string()),
            log_level: "info".to_string(),
            log_json: false,
        };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.addr, "0.0.0.0:9999");
    }
}
