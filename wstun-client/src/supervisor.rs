//! Lifecycle Supervisor, client side (§4.6): probes the gateway, spawns a
//! listener per enabled route, and tears everything down on interrupt.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use wstun_core::{PROBE_PING_PAYLOAD, PROBE_ROUTE_NAME};

use crate::config::Config;
use crate::dial;
use crate::error::ClientError;
use crate::listener;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the client role to completion: probe, spawn listeners, wait for
/// interrupt, wait for every listener to finish (§4.6, §8 property 5 —
/// "a failed probe leaves no listeners running").
pub async fn run(config: Config) -> anyhow::Result<()> {
    let url = dial::build_tunnel_url(&config.server_url, PROBE_ROUTE_NAME)?;
    info!(url = %url, "probing gateway");
    probe(&url, DEFAULT_HANDSHAKE_TIMEOUT)
        .await
        .map_err(anyhow::Error::from)?;
    info!("probe ok");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    for route in config.routes.into_iter().filter(|r| !r.disabled) {
        let server_url = config.server_url.clone();
        let global_auth = config.global_auth.clone();
        let shutdown_rx = shutdown_rx.clone();
        handles.push(tokio::spawn(listener::run(
            route,
            server_url,
            global_auth,
            DEFAULT_HANDSHAKE_TIMEOUT,
            shutdown_rx,
        )));
    }

    if handles.is_empty() {
        warn!("no enabled routes configured, nothing to serve");
    }

    let all_done = async {
        for handle in &mut handles {
            let _ = handle.await;
        }
    };
    tokio::pin!(all_done);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "failed to install interrupt handler");
            } else {
                info!("interrupt received, closing listeners");
            }
            let _ = shutdown_tx.send(true);
        }
        _ = &mut all_done => {}
    }

    // Either every listener already finished, or shutdown was just
    // signaled and they're finishing now — wait for all of them (§4.6
    // "wait until every started listener has signaled completion").
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Opens a probe tunnel, sends a PING with the fixed payload, and expects a
/// PONG carrying the identical payload (§4.6). Any deviation is fatal.
async fn probe(url: &url::Url, handshake_timeout: Duration) -> Result<(), ClientError> {
    let mut ws = dial::dial(url, None, handshake_timeout).await?;

    ws.send(Message::Ping(PROBE_PING_PAYLOAD.to_vec().into()))
        .await
        .map_err(ClientError::ProbeDial)?;

    loop {
        match ws.next().await {
            Some(Ok(Message::Pong(payload))) => {
                if payload.as_ref() != PROBE_PING_PAYLOAD {
                    return Err(ClientError::Probe(
                        "gateway returned pong with unexpected payload".to_string(),
                    ));
                }
                let _ = ws.close(None).await;
                return Ok(());
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(ClientError::Probe(
                    "gateway closed probe connection before pong".to_string(),
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ClientError::ProbeDial(e)),
        }
    }
}
