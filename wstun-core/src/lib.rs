//! Shared plumbing for both tunnel roles: a byte-stream adapter over a
//! WebSocket connection, the two-task tunnel session that couples one to a
//! raw TCP socket, and the credential digest check used on every upgrade.

pub mod auth;
pub mod error;
pub mod protocol;
pub mod session;
pub mod ws_frame;
pub mod ws_stream;

pub use auth::{basic_auth_header, verify_basic_auth, AuthError, Credential, MISMATCH_MESSAGE};
pub use error::TunnelError;
pub use protocol::{RouteName, PROBE_PING_PAYLOAD, PROBE_ROUTE_NAME, PROXY_PATH, STREAM_BUFFER_SIZE};
pub use session::{next_session_id, run_session};
pub use ws_frame::{binary_frame, classify, pong_frame, text_frame, Classification, CloseKind};
pub use ws_stream::WsStream;
