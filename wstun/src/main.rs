mod create_config;
mod info;
mod logging;

use clap::{CommandFactory, FromArgMatches};

use create_config::CreateConfigArgs;
use wstun_client::ClientArgs;
use wstun_gateway::GatewayArgs;

/// Builds the full CLI: `server` is the default role (no subcommand name
/// needed) with `client`/`create-config`/`info` as explicit subcommands
/// (§6).
fn build_command() -> clap::Command {
    GatewayArgs::command()
        .name("wstun")
        .about("Firewall-traversal reverse proxy that tunnels TCP over WebSocket")
        .subcommand(ClientArgs::command().name("client").about("Run the client role"))
        .subcommand(
            CreateConfigArgs::command()
                .name("create-config")
                .about("Generate a starter client configuration"),
        )
        .subcommand(clap::Command::new("info").about("Print build information"))
        .subcommand_negates_reqs(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let matches = match build_command().try_get_matches() {
        Ok(m) => m,
        Err(e) => e.exit(),
    };

    match matches.subcommand() {
        Some(("client", sub_m)) => {
            let args = ClientArgs::from_arg_matches(sub_m)?;
            logging::init(&args.log_level, args.log_json);
            tracing::info!(version = env!("CARGO_PKG_VERSION"), role = "client", "wstun starting");
            wstun_client::run(&args).await
        }
        Some(("create-config", sub_m)) => {
            let args = CreateConfigArgs::from_arg_matches(sub_m)?;
            create_config::run(&args)
        }
        Some(("info", _)) => {
            info::run();
            Ok(())
        }
        Some((name, _)) => unreachable!("unregistered subcommand {name:?}"),
        None => {
            let args = GatewayArgs::from_arg_matches(&matches)?;
            logging::init(&args.log_level, args.log_json);
            tracing::info!(version = env!("CARGO_PKG_VERSION"), role = "gateway", "wstun starting");
            wstun_gateway::run(&args).await
        }
    }
}
