//! The client role (`wstun client`, §4.4/§4.6): probes the gateway, then
//! exposes one local TCP listener per configured route.

pub mod config;
pub mod dial;
pub mod error;
pub mod listener;
pub mod supervisor;

pub use config::{ClientArgs, ClientRoute, Config};
pub use error::{ClientError, ConfigError};

/// Loads configuration and runs the Lifecycle Supervisor to completion.
pub async fn run(args: &ClientArgs) -> anyhow::Result<()> {
    let config = Config::load(args)?;
    supervisor::run(config).await
}
