//! Shared, read-only gateway state handed to every connection (§5 "Shared
//! resources": the route table and HTTP mux are built once at startup and
//! never mutated).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;

use crate::config::Config;
use crate::routes::RouteTable;

/// A boxed body type every handler (tunnel upgrade, reverse proxy, fallback)
/// converges on so `server::dispatch` can return one `Response<BoxBody>`
/// regardless of which path produced it.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The upstream HTTP client shared by every reverse-proxy route (§4.5); one
/// connection pool for the whole process rather than one per route.
pub type UpstreamClient = LegacyClient<HttpConnector, Incoming>;

pub struct GatewayState {
    pub table: RouteTable,
    pub handshake_timeout: Duration,
    pub dial_timeout: Duration,
    pub write_timeout: Duration,
    pub compression_enabled: bool,
    pub not_found_page: Vec<u8>,
    pub not_found_disabled: bool,
    pub upstream_client: UpstreamClient,
}

/// The gateway's built-in "not found" page (§17), used whenever
/// `not_found` names no file.
pub const DEFAULT_NOT_FOUND_PAGE: &str = include_str!("../assets/not_found.html");

impl GatewayState {
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let not_found_page = match &config.not_found {
            Some(path) => std::fs::read(path)
                .map_err(|e| anyhow::anyhow!("reading not_found page {}: {e}", path.display()))?,
            None => DEFAULT_NOT_FOUND_PAGE.as_bytes().to_vec(),
        };

        let upstream_client =
            LegacyClient::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Arc::new(Self {
            table: config.table,
            handshake_timeout: config.handshake_timeout,
            dial_timeout: config.dial_timeout,
            write_timeout: config.write_timeout,
            compression_enabled: config.compression_enabled,
            not_found_page,
            not_found_disabled: config.not_found_disabled,
            upstream_client,
        }))
    }
}

pub fn boxed<B>(body: B) -> BoxBody
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    use http_body_util::BodyExt;
    body.map_err(|e| Box::new(e) as BoxError).boxed()
}
