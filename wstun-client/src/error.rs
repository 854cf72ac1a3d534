use thiserror::Error;

/// Errors from the Lifecycle Supervisor (§4.6): gateway reachability checks
/// and WebSocket dial setup. Distinct from `wstun_core::TunnelError`, which
/// covers the byte-stream adapter and session itself once a tunnel is
/// running.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("probe dial failed: {0}")]
    ProbeDial(tokio_tungstenite::tungstenite::Error),
    #[error("probe failed: {0}")]
    Probe(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("route {name:?}: {reason}")]
    InvalidRoute { name: String, reason: String },
    #[error("duplicate route name {0:?}")]
    DuplicateRoute(String),
    #[error("invalid positional route override {0:?}, expected NAME:ADDR")]
    InvalidOverride(String),
}
