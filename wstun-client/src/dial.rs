//! Dialing the gateway's tunnel endpoint (§4.4, §4.6): building the `ws(s)`
//! URL, attaching HTTP Basic auth, and performing the TCP + TLS + WebSocket
//! handshake, against a single short-lived per-connection socket rather
//! than a long-lived multiplexed pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use wstun_core::{basic_auth_header, Credential};

use crate::error::ClientError;

pub type TunnelStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Rewrites `server_url`'s scheme (`http`→`ws`, `https`→`wss`), appends the
/// tunnel path and `name=` query (§4.6).
pub fn build_tunnel_url(server_url: &str, name: &str) -> Result<url::Url, ClientError> {
    let mut url = url::Url::parse(server_url)?;
    let ws_scheme = match url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    url.set_scheme(ws_scheme)
        .map_err(|_| ClientError::Probe(format!("cannot rewrite scheme of {server_url}")))?;
    url.set_path(wstun_core::PROXY_PATH);
    url.set_query(Some(&format!("name={name}")));
    Ok(url)
}

fn build_tls_config() -> rustls::ClientConfig {
    let root_store = rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Dials the gateway's tunnel endpoint for route `name`, attaching
/// `Authorization: Basic ...` when `credential` is present.
pub async fn dial(
    url: &url::Url,
    credential: Option<&Credential>,
    handshake_timeout: Duration,
) -> Result<TunnelStream, ClientError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(ClientError::ProbeDial)?;

    if let Some(credential) = credential {
        let header = basic_auth_header(credential);
        request.headers_mut().insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_str(&header)
                .map_err(|e| ClientError::Probe(format!("invalid auth header: {e}")))?,
        );
    }

    let host = url
        .host_str()
        .ok_or_else(|| ClientError::Probe(format!("missing host in {url}")))?
        .to_string();
    let is_tls = url.scheme() == "wss";
    let port = url.port_or_known_default().unwrap_or(if is_tls { 443 } else { 80 });

    let tcp_stream = tokio::time::timeout(handshake_timeout, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| ClientError::Probe(format!("TCP connect timeout dialing {host}:{port}")))?
        .map_err(|e| ClientError::Probe(format!("TCP connect to {host}:{port} failed: {e}")))?;

    let _ = tcp_stream.set_nodelay(true);

    let connector = if is_tls {
        Some(Connector::Rustls(Arc::new(build_tls_config())))
    } else {
        None
    };

    let (ws_stream, _response) = tokio::time::timeout(
        handshake_timeout,
        tokio_tungstenite::client_async_tls_with_config(request, tcp_stream, None, connector),
    )
    .await
    .map_err(|_| ClientError::Probe("WebSocket handshake timeout".to_string()))?
    .map_err(ClientError::ProbeDial)?;

    Ok(ws_stream)
}
