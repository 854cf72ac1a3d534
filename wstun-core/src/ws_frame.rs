//! Classifies an inbound WebSocket message for the byte-stream adapter and
//! builds the outbound ones it needs (§4.1). Both tunnel roles dial or
//! accept through `tokio-tungstenite`, so a single concrete message type
//! flows through `WsStream` — no abstraction over alternate WebSocket
//! crates is needed here.

use tokio_tungstenite::tungstenite::Message;

/// What a received message means to the byte-stream adapter.
pub enum Classification<'a> {
    Binary(&'a [u8]),
    Text(&'a str),
    Ping(&'a [u8]),
    Pong(&'a [u8]),
    Close(CloseKind),
}

/// Disposition of a close frame, per §4.1: `Normal`/`Abnormal` closes are
/// ordinary end-of-stream; anything else is surfaced as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    Graceful,
    Other(u16),
}

const NORMAL_CLOSURE: u16 = 1000;
const ABNORMAL_CLOSURE: u16 = 1006;

fn close_kind(code: Option<u16>) -> CloseKind {
    match code {
        None | Some(NORMAL_CLOSURE) | Some(ABNORMAL_CLOSURE) => CloseKind::Graceful,
        Some(other) => CloseKind::Other(other),
    }
}

pub fn classify(msg: &Message) -> Classification<'_> {
    match msg {
        Message::Binary(b) => Classification::Binary(b.as_ref()),
        Message::Text(t) => Classification::Text(t.as_str()),
        Message::Ping(p) => Classification::Ping(p.as_ref()),
        Message::Pong(p) => Classification::Pong(p.as_ref()),
        Message::Close(frame) => {
            Classification::Close(close_kind(frame.as_ref().map(|f| u16::from(f.code))))
        }
        // Raw frames are never produced by `Stream::poll_next`; treat
        // defensively as a no-op rather than panicking.
        Message::Frame(_) => Classification::Ping(&[]),
    }
}

/// Builds a single binary frame carrying `data` (the stream write path).
pub fn binary_frame(data: Vec<u8>) -> Message {
    Message::Binary(data.into())
}

/// Builds a text frame: the out-of-band diagnostic channel used by the
/// gateway to report setup errors (§4.3) and by the client to log them.
pub fn text_frame(s: impl Into<String>) -> Message {
    Message::Text(s.into().into())
}

/// Builds a pong reply carrying `payload`, used by the probe responder.
pub fn pong_frame(payload: Vec<u8>) -> Message {
    Message::Pong(payload.into())
}
