//! The gateway's accept loop and per-connection HTTP service (§4.3, §5).
//!
//! Every connection is served as plain HTTP/1.1 with upgrade support; one
//! `service_fn` dispatches by path to the tunnel-upgrade endpoint, the
//! reverse-proxy routes, or the `/` fallback chain.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::state::{BoxBody, GatewayState};
use crate::{dispatcher, fallback, proxy};
use wstun_core::PROXY_PATH;

/// Binds `state.table`'s configured address and serves connections until
/// the process is asked to stop (the supervisor drives shutdown; see
/// `wstun`'s top-level runtime).
pub async fn run(addr: &str, state: Arc<GatewayState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr, "gateway listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
        }

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            serve_connection(TokioIo::new(stream), peer, state).await;
        });
    }
}

async fn serve_connection(io: TokioIo<tokio::net::TcpStream>, peer: SocketAddr, state: Arc<GatewayState>) {
    let service = service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { Ok::<_, std::convert::Infallible>(dispatch(req, peer, state).await) }
    });

    if let Err(e) = http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(false)
        .serve_connection(io, service)
        .with_upgrades()
        .await
    {
        if !e.to_string().contains("connection closed") {
            debug!(peer = %peer, error = %e, "connection error");
        }
    }
}

/// Path-based mux (§4.3): `PROXY_PATH` goes to the tunnel upgrade endpoint;
/// anything matching a registered HTTP route prefix goes to the reverse
/// proxy; everything else falls through to the root route / not-found page.
async fn dispatch(req: Request<Incoming>, peer: SocketAddr, state: Arc<GatewayState>) -> Response<BoxBody> {
    if req.uri().path() == PROXY_PATH {
        return dispatcher::handle(req, peer, state);
    }

    if let Some(route) = state.table.match_http(req.uri().path()) {
        let route = route.clone();
        return proxy::forward(&state, &route, req, &route.path_header).await;
    }

    fallback::handle(&state, req).await
}
