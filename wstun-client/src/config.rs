//! Client configuration: a small CLI surface (clap) layered over a YAML
//! file (§6 "Client: `server_url`, `auth`, `routes`"), plus the positional
//! `NAME:ADDR` route overrides from §16.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use wstun_core::{Credential, RouteName};

use crate::error::ConfigError;

/// `wstun client` CLI flags. Trailing positional arguments are `NAME:ADDR`
/// route overrides (§16), applied on top of whatever `routes` the config
/// file declares.
#[derive(Parser, Debug, Clone)]
pub struct ClientArgs {
    /// Path to the client's YAML configuration file.
    #[arg(long, env = "WSTUN_CLIENT_CONFIG", default_value = "wstun-client.yaml")]
    pub config: PathBuf,

    /// Overrides the file's `server_url`.
    #[arg(long, env = "WSTUN_CLIENT_SERVER_URL")]
    pub server_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WSTUN_CLIENT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "WSTUN_CLIENT_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// `NAME:ADDR` pairs that override or add routes for this invocation.
    #[arg(value_name = "NAME:ADDR")]
    pub route_overrides: Vec<String>,
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
pub struct RouteFile {
    pub name: String,
    pub local_addr: String,
    pub auth: Option<CredentialFile>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfigFile {
    pub server_url: String,
    pub auth: Option<CredentialFile>,
    #[serde(default)]
    pub routes: Vec<RouteFile>,
}

impl ClientConfigFile {
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

/// One resolved client route (§3 ClientRoute): a name bound to a local
/// listener address, with an optional per-route credential that overrides
/// the global one when dialing the gateway.
#[derive(Debug, Clone)]
pub struct ClientRoute {
    pub name: RouteName,
    pub local_addr: String,
    pub auth: Option<Credential>,
    pub disabled: bool,
}

/// The fully-resolved configuration the Lifecycle Supervisor runs against.
pub struct Config {
    pub server_url: String,
    pub global_auth: Option<Credential>,
    pub routes: Vec<ClientRoute>,
}

impl Config {
    /// Merges CLI args over the YAML file, then applies §16's positional
    /// `NAME:ADDR` overrides, then validates route-name uniqueness.
    pub fn load(args: &ClientArgs) -> anyhow::Result<Self> {
        let file = ClientConfigFile::load(&args.config)?;
        let server_url = args.server_url.clone().unwrap_or(file.server_url);
        let global_auth = file.auth.map(Credential::from);

        let mut routes = Vec::with_capacity(file.routes.len());
        for entry in file.routes {
            let route_name =
                RouteName::new(&entry.name).map_err(|e| ConfigError::InvalidRoute {
                    name: entry.name.clone(),
                    reason: e.to_string(),
                })?;
            routes.push(ClientRoute {
                name: route_name,
                local_addr: entry.local_addr,
                auth: entry.auth.map(Credential::from),
                disabled: entry.disabled,
            });
        }

        for raw in &args.route_overrides {
            apply_override(&mut routes, raw)?;
        }

        validate_unique_names(&routes)?;

        Ok(Config {
            server_url,
            global_auth,
            routes,
        })
    }
}

/// Parses one `NAME:ADDR` positional argument and either replaces the
/// matching route's `local_addr` or appends a new enabled route (§16,
/// mirroring the original's `configRe = ^([^:]+):(.*:\d+)$`).
fn apply_override(routes: &mut Vec<ClientRoute>, raw: &str) -> Result<(), ConfigError> {
    let (name, addr) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
    if name.is_empty() || addr.is_empty() {
        return Err(ConfigError::InvalidOverride(raw.to_string()));
    }
    let route_name = RouteName::new(name).map_err(|e| ConfigError::InvalidRoute {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    if let Some(existing) = routes.iter_mut().find(|r| r.name.as_str() == name) {
        existing.local_addr = addr.to_string();
        existing.disabled = false;
    } else {
        routes.push(ClientRoute {
            name: route_name,
            local_addr: addr.to_string(),
            auth: None,
            disabled: false,
        });
    }
    Ok(())
}

fn validate_unique_names(routes: &[ClientRoute]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for route in routes {
        if !seen.insert(route.name.as_str()) {
            return Err(ConfigError::DuplicateRoute(route.name.as_str().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(content: &str) -> tempfile_path::TempYaml {
        tempfile_path::TempYaml::new(content)
    }

    /// Minimal hand-rolled temp-file helper, mirroring `wstun_gateway`'s
    /// config test module — no existing tempfile dependency to reuse.
    mod tempfile_path {
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct TempYaml(pub PathBuf);

        impl TempYaml {
            pub fn new(content: &str) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let path = std::env::temp_dir().join(format!("wstun-client-test-{n}.yaml"));
                std::fs::write(&path, content).expect("write temp config");
                Self(path)
            }

            pub fn path(&self) -> &std::path::Path {
                &self.0
            }
        }

        impl Drop for TempYaml {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    fn base_args(config: &std::path::Path) -> ClientArgs {
        ClientArgs {
            config: config.to_path_buf(),
            server_url: None,
            log_level: "info".to_string(),
            log_json: false,
            route_overrides: Vec::new(),
        }
    }

    #[test]
    fn routes_load_from_the_file() {
        let yaml = write_temp(
            "server_url: \"http://gw.example:8080\"\nroutes:\n  - name: echo\n    local_addr: \"127.0.0.1:10000\"\n",
        );
        let config = Config::load(&base_args(yaml.path())).unwrap();
        assert_eq!(config.server_url, "http://gw.example:8080");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].local_addr, "127.0.0.1:10000");
    }

    #[test]
    fn cli_server_url_overrides_file() {
        let yaml = write_temp("server_url: \"http://gw.example:8080\"\nroutes: []\n");
        let mut args = base_args(yaml.path());
        args.server_url = Some("http://other.example:9090".to_string());
        let config = Config::load(&args).unwrap();
        assert_eq!(config.server_url, "http://other.example:9090");
    }

    #[test]
    fn positional_override_replaces_existing_route() {
        let yaml = write_temp(
            "server_url: \"http://gw.example:8080\"\nroutes:\n  - name: echo\n    local_addr: \"127.0.0.1:10000\"\n",
        );
        let mut args = base_args(yaml.path());
        args.route_overrides = vec!["echo:127.0.0.1:20000".to_string()];
        let config = Config::load(&args).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].local_addr, "127.0.0.1:20000");
    }

    #[test]
    fn positional_override_adds_new_route() {
        let yaml = write_temp("server_url: \"http://gw.example:8080\"\nroutes: []\n");
        let mut args = base_args(yaml.path());
        args.route_overrides = vec!["shell:127.0.0.1:22000".to_string()];
        let config = Config::load(&args).unwrap();
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].name.as_str(), "shell");
    }

    #[test]
    fn malformed_override_is_rejected() {
        let yaml = write_temp("server_url: \"http://gw.example:8080\"\nroutes: []\n");
        let mut args = base_args(yaml.path());
        args.route_overrides = vec!["no-colon-here".to_string()];
        let err = Config::load(&args).unwrap_err();
        assert!(err.to_string().contains("NAME:ADDR"));
    }

    #[test]
    fn duplicate_route_names_are_rejected() {
        let yaml = write_temp(
            "server_url: \"http://gw.example:8080\"\nroutes:\n  - name: echo\n    local_addr: \"127.0.0.1:10000\"\n  - name: echo\n    local_addr: \"127.0.0.1:10001\"\n",
        );
        let err = Config::load(&base_args(yaml.path())).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
