//! Adapts a WebSocket connection to a byte-oriented full-duplex stream
//! (§4.1). Read coalesces binary frame boundaries away; Write sends the
//! whole buffer as a single atomic binary frame.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BytesMut};
use futures_util::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

use crate::protocol::STREAM_BUFFER_SIZE;
use crate::ws_frame::{binary_frame, classify, CloseKind, Classification};

/// Generic over the underlying `Stream + Sink` so it works identically
/// whether the other end is `WebSocketStream<MaybeTlsStream<TcpStream>>`
/// (the client dialing out) or `WebSocketStream<TokioIo<Upgraded>>` (the
/// gateway accepting an upgraded hyper connection) — both carry the same
/// `tokio_tungstenite::tungstenite::Message`.
pub struct WsStream<S> {
    inner: S,
    read_buf: BytesMut,
    eof: bool,
}

impl<S> WsStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            read_buf: BytesMut::with_capacity(STREAM_BUFFER_SIZE),
            eof: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

fn to_io_error<E>(e: E) -> io::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    io::Error::new(io::ErrorKind::Other, e)
}

impl<S, E> AsyncRead for WsStream<S>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.read_buf.is_empty() {
                let n = std::cmp::min(buf.remaining(), this.read_buf.len());
                buf.put_slice(&this.read_buf[..n]);
                this.read_buf.advance(n);
                return Poll::Ready(Ok(()));
            }
            if this.eof {
                return Poll::Ready(Ok(()));
            }
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.eof = true;
                    return Poll::Ready(Ok(()));
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(to_io_error(e))),
                Poll::Ready(Some(Ok(msg))) => match classify(&msg) {
                    Classification::Binary(b) => {
                        this.read_buf.extend_from_slice(b);
                    }
                    Classification::Text(t) => {
                        trace!(text = %t, "websocket text frame (out-of-band, not stream data)");
                    }
                    Classification::Ping(_) | Classification::Pong(_) => {}
                    Classification::Close(CloseKind::Graceful) => {
                        this.eof = true;
                        return Poll::Ready(Ok(()));
                    }
                    Classification::Close(CloseKind::Other(code)) => {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::Other,
                            format!("websocket closed with unexpected code {code}"),
                        )));
                    }
                },
            }
        }
    }
}

impl<S, E> AsyncWrite for WsStream<S>
where
    S: Sink<Message, Error = E> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(to_io_error(e))),
            Poll::Ready(Ok(())) => {}
        }
        let len = buf.len();
        match Pin::new(&mut this.inner).start_send(binary_frame(buf.to_vec())) {
            Ok(()) => Poll::Ready(Ok(len)),
            Err(e) => Poll::Ready(Err(to_io_error(e))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_flush(cx)
            .map_err(to_io_error)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_close(cx)
            .map_err(to_io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::Error as WsError;

    /// An in-memory `Stream + Sink` fed from a fixed script, for exercising
    /// `WsStream` without a real socket.
    struct Script {
        incoming: std::collections::VecDeque<Result<Message, WsError>>,
        outgoing: Vec<Message>,
    }

    impl Stream for Script {
        type Item = Result<Message, WsError>;
        fn poll_next(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Self::Item>> {
            Poll::Ready(self.incoming.pop_front())
        }
    }

    impl Sink<Message> for Script {
        type Error = WsError;
        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), WsError> {
            self.outgoing.push(item);
            Ok(())
        }
        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    fn script(msgs: Vec<Result<Message, WsError>>) -> Script {
        Script {
            incoming: msgs.into(),
            outgoing: Vec::new(),
        }
    }

    #[tokio::test]
    async fn coalesces_binary_frames_across_reads() {
        let s = script(vec![
            Ok(Message::Binary(b"hel".to_vec().into())),
            Ok(Message::Binary(b"lo".to_vec().into())),
        ]);
        let mut ws = WsStream::new(s);
        let mut out = [0u8; 5];
        ws.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"hello");
    }

    #[tokio::test]
    async fn skips_text_ping_pong_frames() {
        let s = script(vec![
            Ok(Message::Text("ERROR: irrelevant".into())),
            Ok(Message::Ping(b"!!test!!".to_vec().into())),
            Ok(Message::Binary(b"x".to_vec().into())),
        ]);
        let mut ws = WsStream::new(s);
        let mut out = [0u8; 1];
        ws.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"x");
    }

    #[tokio::test]
    async fn normal_and_abnormal_close_are_eof() {
        for code in [CloseCode::Normal, CloseCode::Abnormal] {
            let s = script(vec![Ok(Message::Close(Some(CloseFrame {
                code,
                reason: "".into(),
            })))]);
            let mut ws = WsStream::new(s);
            let mut out = Vec::new();
            ws.read_to_end(&mut out).await.unwrap();
            assert!(out.is_empty());
        }
    }

    #[tokio::test]
    async fn other_close_code_is_an_error() {
        let s = script(vec![Ok(Message::Close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: "".into(),
        })))]);
        let mut ws = WsStream::new(s);
        let mut out = [0u8; 1];
        let err = ws.read(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[tokio::test]
    async fn write_sends_one_atomic_binary_frame() {
        let s = script(vec![]);
        let mut ws = WsStream::new(s);
        let n = ws.write(b"payload").await.unwrap();
        assert_eq!(n, 7);
        ws.flush().await.unwrap();
        let sent = &ws.into_inner().outgoing;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], Message::Binary(b"payload".to_vec().into()));
    }
}
