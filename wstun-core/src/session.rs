//! Couples one WebSocket side and one raw TCP side with two copy tasks and
//! a two-phase shutdown (§4.2).

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::error::is_closed_connection_io;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Monotonic id used only for log correlation; not part of the wire protocol.
pub fn next_session_id() -> u64 {
    SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Wraps an `AsyncRead + AsyncWrite` endpoint with a force-close switch
/// independent of the underlying transport. TCP and a WebSocket connection
/// don't share a single recipe for "close the whole thing from outside
/// while someone else holds the read half" — this does it uniformly by
/// making any in-flight or future read/write return immediately once
/// closed, which is what lets `run_session` tear down both endpoints
/// deterministically on the first direction's completion.
pub struct Closable<T> {
    inner: T,
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

/// A handle that can force-close the `Closable` it was taken from.
#[derive(Clone)]
pub struct Closer {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Closer {
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

impl<T> Closable<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            closed: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn closer(&self) -> Closer {
        Closer {
            closed: Arc::clone(&self.closed),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Registers interest in the close notification and reports whether
    /// closing has already happened. Must be called (and its result
    /// checked) on every poll so a close arriving while we're pending wakes
    /// us rather than leaving us parked inside the inner transport forever.
    fn poll_closed(&self, cx: &mut Context<'_>) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        let _ = notified.as_mut().poll(cx);
        self.closed.load(Ordering::Acquire)
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Closable<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_closed(cx) {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Closable<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.poll_closed(cx) {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_closed(cx) {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_closed(cx) {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

/// Runs one tunnel session to completion: two independent copy tasks (A→B
/// and B→A) plus a rendezvous channel of capacity 2. On the first
/// direction's completion both endpoints are closed, forcing the other
/// direction's pending read to fail; then waits for the second signal.
pub async fn run_session<A, B>(session_id: u64, a: A, b: B)
where
    A: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    B: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let a = Closable::new(a);
    let b = Closable::new(b);
    let a_closer = a.closer();
    let b_closer = b.closer();

    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let (done_tx, mut done_rx) = mpsc::channel(2);

    let h_ab = tokio::spawn(copy_direction(
        a_read,
        b_write,
        session_id,
        "a->b",
        done_tx.clone(),
    ));
    let h_ba = tokio::spawn(copy_direction(
        b_read,
        a_write,
        session_id,
        "b->a",
        done_tx.clone(),
    ));
    drop(done_tx);

    done_rx.recv().await;
    a_closer.close();
    b_closer.close();
    done_rx.recv().await;

    let _ = h_ab.await;
    let _ = h_ba.await;
    info!(session_id, "tunnel session ended");
}

async fn copy_direction<R, W>(
    mut r: R,
    mut w: W,
    session_id: u64,
    direction: &'static str,
    done: mpsc::Sender<()>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Err(e) = tokio::io::copy(&mut r, &mut w).await {
        if !is_closed_connection_io(&e) {
            warn!(session_id, direction, error = %e, "tunnel copy error");
        }
    }
    let _ = done.send(()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn stream_fidelity_both_directions() {
        let (a_local, a_remote) = duplex(64 * 1024);
        let (b_local, b_remote) = duplex(64 * 1024);

        let session = tokio::spawn(run_session(next_session_id(), a_local, b_local));

        let (mut a_rd, mut a_wr) = tokio::io::split(a_remote);
        let (mut b_rd, mut b_wr) = tokio::io::split(b_remote);

        a_wr.write_all(b"hello from a").await.unwrap();
        let mut buf = vec![0u8; 12];
        b_rd.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello from a");

        b_wr.write_all(b"hello from b").await.unwrap();
        let mut buf2 = vec![0u8; 12];
        a_rd.read_exact(&mut buf2).await.unwrap();
        assert_eq!(&buf2, b"hello from b");

        drop(a_wr);
        drop(a_rd);
        drop(b_wr);
        drop(b_rd);
        tokio::time::timeout(std::time::Duration::from_secs(1), session)
            .await
            .expect("session should tear down once both endpoints are dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn closing_one_endpoint_tears_down_both_directions() {
        let (a_local, a_remote) = duplex(64 * 1024);
        let (b_local, b_remote) = duplex(64 * 1024);

        let session = tokio::spawn(run_session(next_session_id(), a_local, b_local));

        drop(a_remote);

        let (mut b_rd, _b_wr) = tokio::io::split(b_remote);
        let mut buf = [0u8; 1];
        let n = b_rd.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "B's read should observe EOF once A is closed");

        tokio::time::timeout(std::time::Duration::from_secs(1), session)
            .await
            .expect("session should terminate promptly")
            .unwrap();
    }
}
