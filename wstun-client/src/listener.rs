//! Client Listener Set (§4.4): one TCP listener per enabled route, each
//! accepted connection forwarded as its own tunnel session.
//!
//! Rust's `TcpListener` exposes no external close callable from another
//! task, so shutdown uses a `tokio::sync::watch` signal raced against
//! `accept()` instead — same observable behavior (§9), same "log once,
//! end the accept loop" disposition.

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use wstun_core::{next_session_id, run_session, WsStream};

use crate::config::ClientRoute;
use crate::dial;

/// Runs the accept loop for one route until `shutdown` fires or a non-bind
/// accept error occurs (§4.4). Reports exactly once by returning; the
/// supervisor observes that via this future's completion.
pub async fn run(
    route: ClientRoute,
    server_url: String,
    global_auth: Option<wstun_core::Credential>,
    handshake_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = format!("route {{{} -> {}}}", route.name.as_str(), route.local_addr);
    info!(route = %id, "started");

    let listener = match TcpListener::bind(&route.local_addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(route = %id, error = %e, "listen failed, skipping route");
            return;
        }
    };

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((conn, peer)) => {
                        let route = route.clone();
                        let server_url = server_url.clone();
                        let credential = route.auth.clone().or_else(|| global_auth.clone());
                        tokio::spawn(async move {
                            handle_connection(route, server_url, credential, handshake_timeout, conn, peer).await;
                        });
                    }
                    Err(e) => {
                        warn!(route = %id, error = %e, "accept failed");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                info!(route = %id, "listener closed");
                break;
            }
        }
    }

    info!(route = %id, "done");
}

async fn handle_connection(
    route: ClientRoute,
    server_url: String,
    credential: Option<wstun_core::Credential>,
    handshake_timeout: Duration,
    conn: TcpStream,
    peer: std::net::SocketAddr,
) {
    debug!(route = %route.name.as_str(), peer = %peer, "serving connection");

    let url = match dial::build_tunnel_url(&server_url, route.name.as_str()) {
        Ok(u) => u,
        Err(e) => {
            warn!(route = %route.name.as_str(), peer = %peer, error = %e, "invalid tunnel url");
            return;
        }
    };

    let ws_stream = match dial::dial(&url, credential.as_ref(), handshake_timeout).await {
        Ok(s) => s,
        Err(e) => {
            warn!(route = %route.name.as_str(), peer = %peer, error = %e, "dial failed");
            return;
        }
    };

    let session_id = next_session_id();
    info!(session_id, route = %route.name.as_str(), peer = %peer, "tunnel session starting");
    run_session(session_id, WsStream::new(ws_stream), conn).await;
}
