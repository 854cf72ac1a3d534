use std::io;

/// Errors surfaced by the WS-Stream Adapter and the tunnel session.
///
/// Copy errors are not propagated past the task that hit them (see
/// `session::run_session`); this type exists so that the handful of callers
/// who do need to distinguish "closed gracefully" from "something broke" can,
/// without parsing message strings.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl TunnelError {
    /// True for the expected "peer went away after we initiated teardown"
    /// case, which is suppressed from logs rather than reported as a
    /// session failure.
    pub fn is_closed_connection(&self) -> bool {
        match self {
            TunnelError::Io(e) => is_closed_connection_io(e),
            TunnelError::WebSocket(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | TunnelError::WebSocket(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => true,
            TunnelError::WebSocket(_) => false,
        }
    }
}

/// `io::Error`s that mean "the socket was closed out from under us" — these
/// are expected once teardown has started and are suppressed from logs.
pub fn is_closed_connection_io(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
    )
}
