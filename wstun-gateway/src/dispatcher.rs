//! The tunnel upgrade endpoint (§4.3 item 1): upgrades the request to
//! WebSocket, then — now that the connection is committed and HTTP status
//! codes are no longer available — runs the rest of the setup handshake
//! (name check, probe, route lookup, auth, dial) over text frames before
//! handing off to `wstun_core::run_session`.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use hyper_tungstenite::tungstenite::Message;
use tokio::net::TcpStream;
use tracing::{info, warn};

use wstun_core::{
    next_session_id, pong_frame, run_session, text_frame, verify_basic_auth, WsStream,
    PROBE_ROUTE_NAME,
};

use crate::state::{BoxBody, GatewayState};

pub fn handle(
    mut req: Request<Incoming>,
    peer: SocketAddr,
    state: std::sync::Arc<GatewayState>,
) -> Response<BoxBody> {
    if !hyper_tungstenite::is_upgrade_request(&req) {
        return status_response(StatusCode::PRECONDITION_FAILED, "expected websocket upgrade");
    }

    let query = req.uri().query().unwrap_or("").to_string();
    let name = query_param(&query, "name").unwrap_or_default();
    let auth_header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (response, websocket) = match hyper_tungstenite::upgrade(&mut req, None) {
        Ok(v) => v,
        Err(e) => {
            warn!(peer = %peer, error = %e, "websocket upgrade failed");
            return status_response(StatusCode::PRECONDITION_FAILED, "upgrade failed");
        }
    };

    tokio::spawn(async move {
        match tokio::time::timeout(state.handshake_timeout, websocket).await {
            Ok(Ok(ws_stream)) => run_tunnel(ws_stream, name, auth_header, peer, state).await,
            Ok(Err(e)) => warn!(peer = %peer, error = %e, "websocket upgrade future failed"),
            Err(_) => warn!(
                peer = %peer,
                timeout = ?state.handshake_timeout,
                "websocket handshake timed out"
            ),
        }
    });

    response.map(crate::state::boxed)
}

async fn run_tunnel<S>(
    mut ws: S,
    name: String,
    auth_header: Option<String>,
    peer: SocketAddr,
    state: std::sync::Arc<GatewayState>,
) where
    S: futures_util::Stream<Item = Result<Message, hyper_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = hyper_tungstenite::tungstenite::Error>
        + Unpin
        + Send
        + 'static,
{
    if name.is_empty() {
        let _ = ws.send(text_frame("ERROR: name is blank")).await;
        let _ = ws.close().await;
        return;
    }

    if name == PROBE_ROUTE_NAME {
        respond_to_probe(&mut ws, peer).await;
        let _ = ws.close().await;
        return;
    }

    let route = match state.table.lookup_tunnel(&name) {
        Some(route) => route,
        None => {
            let _ = ws
                .send(text_frame(format!("ERROR: {name:?} is not registered")))
                .await;
            let _ = ws.close().await;
            return;
        }
    };

    if let Some(credential) = &route.auth {
        if !credential.disabled {
            if let Err(e) = verify_basic_auth(auth_header.as_deref(), credential) {
                warn!(peer = %peer, route = %name, error = %e, "tunnel auth rejected");
                let _ = ws
                    .send(text_frame(format!("ERROR: {}", wstun_core::MISMATCH_MESSAGE)))
                    .await;
                let _ = ws.close().await;
                return;
            }
        }
    }

    let upstream = match tokio::time::timeout(
        state.dial_timeout,
        TcpStream::connect(&route.upstream_addr),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let _ = ws.send(text_frame(format!("ERROR: {e}"))).await;
            let _ = ws.close().await;
            return;
        }
        Err(_) => {
            let _ = ws
                .send(text_frame(format!(
                    "ERROR: dial timeout after {:?}",
                    state.dial_timeout
                )))
                .await;
            let _ = ws.close().await;
            return;
        }
    };

    let session_id = next_session_id();
    info!(session_id, peer = %peer, route = %name, "tunnel session starting");
    run_session(session_id, WsStream::new(ws), upstream).await;
}

async fn respond_to_probe<S>(ws: &mut S, peer: SocketAddr)
where
    S: futures_util::Stream<Item = Result<Message, hyper_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = hyper_tungstenite::tungstenite::Error>
        + Unpin,
{
    while let Some(next) = ws.next().await {
        match next {
            Ok(Message::Ping(payload)) => {
                let _ = ws.send(pong_frame(payload.to_vec())).await;
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                warn!(peer = %peer, error = %e, "probe read failed");
                return;
            }
        }
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        if k == key {
            let v = parts.next().unwrap_or("");
            return Some(
                percent_decode(v)
                    .unwrap_or_else(|| v.to_string()),
            );
        }
    }
    None
}

/// Minimal percent-decoder for the one query parameter this endpoint reads;
/// the `url` crate's `Url::parse` is overkill for a single key lookup off a
/// raw query string already split out of the request URI.
fn percent_decode(s: &str) -> Option<String> {
    if !s.contains('%') && !s.contains('+') {
        return None;
    }
    let mut out = Vec::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

fn status_response(status: StatusCode, msg: &str) -> Response<BoxBody> {
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    Response::builder()
        .status(status)
        .body(
            Full::new(Bytes::copy_from_slice(msg.as_bytes()))
                .map_err(|never: std::convert::Infallible| match never {})
                .boxed(),
        )
        .expect("static response is well-formed")
}
