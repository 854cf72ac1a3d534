//! Wire-level constants for the tunnel protocol.
//!
//! One WebSocket connection carries exactly one raw TCP session; there is no
//! multiplexed stream-id framing here, unlike protocols that pack many
//! logical streams onto a single socket.

use std::fmt;

/// Fixed, well-known path the gateway upgrades on.
pub const PROXY_PATH: &str = "/__httpdx__";

/// Reserved route name denoting a liveness probe; never a configured route.
pub const PROBE_ROUTE_NAME: &str = "__test__";

/// PING/PONG payload exchanged during the liveness probe.
pub const PROBE_PING_PAYLOAD: &[u8] = b"!!test!!";

/// Read and write buffer size for the WS-Stream Adapter (256 KiB), chosen to
/// amortize per-frame overhead for file-transfer-like workloads.
pub const STREAM_BUFFER_SIZE: usize = 256 * 1024;

/// A non-empty route label exchanged as the `name` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteName(String);

impl RouteName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidRouteName> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidRouteName::Empty);
        }
        if name == PROBE_ROUTE_NAME {
            return Err(InvalidRouteName::Reserved);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidRouteName {
    #[error("route name must not be empty")]
    Empty,
    #[error("route name \"{PROBE_ROUTE_NAME}\" is reserved for the liveness probe")]
    Reserved,
}
