//! The gateway role (`wstun server`, §4.3): accepts WebSocket tunnels and
//! serves reverse-proxy HTTP routes on one listening address.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Config, GatewayArgs};
pub use error::{ConfigError, ProxyError};
pub use state::GatewayState;

/// Loads configuration, builds shared state, logs the resolved route table,
/// and serves until the process is killed.
pub async fn run(args: &GatewayArgs) -> anyhow::Result<()> {
    let config = Config::load(args)?;
    let addr = config.addr.clone();
    let state = GatewayState::new(config)?;
    routes::log_table(&state.table);
    server::run(&addr, state).await
}
