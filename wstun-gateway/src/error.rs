//! Error types for gateway components not already covered by `wstun-core`
//! (§11 "one per module boundary that needs to distinguish error cases
//! programmatically").

use thiserror::Error;

/// Errors particular to the HTTP reverse-proxy route (§4.5, §7's
/// "Reverse-proxy upstream error" row).
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),
}

impl ProxyError {
    /// EOF from the upstream is squelched per §4.5 ("clients commonly close
    /// mid-response") rather than logged as a proxy failure.
    pub fn is_eof(&self) -> bool {
        self.to_string().to_ascii_lowercase().contains("eof")
    }
}

/// Errors raised while loading and validating the gateway configuration
/// (§12's `Config::validate()`).
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
    #[error("tunnel route {name:?}: {reason}")]
    InvalidRoute { name: String, reason: String },
    #[error("duplicate tunnel route name {0:?}")]
    DuplicateRoute(String),
    #[error("duplicate http route prefix {0:?}")]
    DuplicateHttpPrefix(String),
    #[error("at most one root (\"/\") HTTP route is allowed")]
    MultipleRootRoutes,
}
