//! The transceiver: single-writer request/response RPC over the upstream
//! connection to the rig daemon.
//!
//! One tokio task owns the upstream stream exclusively. Concurrent callers
//! submit requests through a bounded handoff channel; the worker writes the
//! extended long format, then reads exactly one response before touching
//! the next request, so write-then-read turns are strictly serialized and
//! responses are paired with requests in FIFO order.
//!
//! A caller that abandons [`Transceiver::send`] (dropping the future, e.g.
//! via `tokio::time::timeout`) does not disturb that pairing: the worker
//! still reads the orphaned response and discards it.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rigrelay_core::{Error, Result};

use crate::parse::ResponseReader;
use crate::types::{Request, Response};

/// Default deadline for a single upstream write or read operation.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the upstream worker task.
///
/// Bound 1:1 to one upstream stream. Once the worker observes end of
/// stream (or [`close`](Transceiver::close) is called) the transceiver is
/// terminally closed; a new one is constructed per upstream connection.
pub struct Transceiver {
    outgoing: mpsc::Sender<Transmission>,
    closed: CancellationToken,
}

struct Transmission {
    request: Request,
    reply: oneshot::Sender<Result<Response>>,
}

impl Transceiver {
    /// Spawn a worker that owns `stream`, using the default per-operation
    /// timeout.
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_timeout(stream, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Spawn a worker that owns `stream`.
    ///
    /// `timeout` bounds each upstream write and each response read so a
    /// stuck daemon surfaces as a transmit/receive error instead of
    /// blocking the worker forever. A zero duration disables the deadline.
    pub fn with_timeout<S>(stream: S, timeout: Duration) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(1);
        let closed = CancellationToken::new();
        let (read_half, write_half) = tokio::io::split(stream);

        tokio::spawn(worker(
            read_half,
            write_half,
            outgoing_rx,
            closed.clone(),
            timeout,
        ));

        Transceiver {
            outgoing: outgoing_tx,
            closed,
        }
    }

    /// Submit a request and wait for its response.
    ///
    /// Fails fast with [`Error::TransceiverClosed`] when the transceiver
    /// has already shut down. Transport faults surface as
    /// [`Error::Transmit`], [`Error::Receive`], or
    /// [`Error::ConnectionClosed`].
    ///
    /// Dropping the returned future cancels the wait, not the exchange:
    /// the request may already be on the wire, and the worker will read
    /// and discard the late response.
    pub async fn send(&self, request: Request) -> Result<Response> {
        if self.closed.is_cancelled() {
            return Err(Error::TransceiverClosed);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.outgoing
            .send(Transmission {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::TransceiverClosed)?;

        reply_rx.await.unwrap_or(Err(Error::TransceiverClosed))
    }

    /// Publish the closed signal and stop the worker. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether the closed signal has been published.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Wait until the closed signal is published.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Run `callback` once after the closed signal is published.
    ///
    /// The callback runs on its own task, never under any lock held by the
    /// transceiver.
    pub fn when_done<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let closed = self.closed.clone();
        tokio::spawn(async move {
            closed.cancelled().await;
            callback();
        });
    }
}

/// Run `operation` under the configured deadline. `None` means the
/// deadline elapsed; a zero deadline waits forever.
async fn deadline<F, T>(limit: Duration, operation: F) -> Option<T>
where
    F: Future<Output = T>,
{
    if limit.is_zero() {
        Some(operation.await)
    } else {
        tokio::time::timeout(limit, operation).await.ok()
    }
}

/// The worker loop. Owns both halves of the upstream stream.
async fn worker<S>(
    read_half: ReadHalf<S>,
    write_half: WriteHalf<S>,
    mut outgoing: mpsc::Receiver<Transmission>,
    closed: CancellationToken,
    timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut reader = ResponseReader::new(BufReader::new(read_half));
    let mut writer = write_half;

    loop {
        let tx = tokio::select! {
            _ = closed.cancelled() => {
                debug!("transceiver closed, worker exiting");
                return;
            }
            tx = outgoing.recv() => match tx {
                Some(tx) => tx,
                None => {
                    // All handles dropped; nobody can submit anymore.
                    closed.cancel();
                    return;
                }
            },
        };

        let frame = format!("{}\n", tx.request.extended_format());
        debug!(frame = frame.trim_end(), "transmit");
        match deadline(timeout, write_frame(&mut writer, frame.as_bytes())).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!(error = %e, "transmit failed");
                let _ = tx.reply.send(Err(Error::Transmit(e.to_string())));
                continue;
            }
            None => {
                warn!("transmit timed out");
                let _ = tx.reply.send(Err(Error::Transmit("timed out".to_string())));
                continue;
            }
        }

        let extended = tx.request.command.supports_extended;
        match deadline(timeout, reader.read_response(extended)).await {
            Some(Ok(response)) => {
                // The caller may have given up waiting; the response was
                // consumed either way, keeping the stream in sync.
                let _ = tx.reply.send(Ok(response));
            }
            Some(Err(Error::ConnectionClosed)) => {
                warn!("upstream connection closed");
                let _ = tx.reply.send(Err(Error::ConnectionClosed));
                closed.cancel();
                return;
            }
            Some(Err(e)) => {
                warn!(error = %e, "receive failed");
                let _ = tx.reply.send(Err(Error::Receive(e.to_string())));
            }
            None => {
                warn!("receive timed out");
                let _ = tx.reply.send(Err(Error::Receive("timed out".to_string())));
            }
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::short_command;
    use crate::types::CommandKey;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn get_freq_request() -> Request {
        Request::new(short_command(b'f').unwrap())
    }

    async fn read_written(far: &mut tokio::io::DuplexStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        far.read_exact(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn send_receive_roundtrip() {
        let (upstream, mut far) = tokio::io::duplex(1024);
        far.write_all(b"get_freq:\nFrequency: 3720000\nRPRT 0\nRPRT 11\n")
            .await
            .unwrap();

        let trx = Transceiver::new(upstream);

        let resp = trx.send(get_freq_request()).await.unwrap();
        assert_eq!(
            resp,
            Response {
                command: CommandKey::from("get_freq"),
                data: vec!["3720000".into()],
                keys: vec!["Frequency".into()],
                result: "0".into(),
            }
        );

        let resp = trx.send(get_freq_request()).await.unwrap();
        assert_eq!(resp.result, "11");

        let written = read_written(&mut far, "+\\get_freq\n+\\get_freq\n".len()).await;
        assert_eq!(written, "+\\get_freq\n+\\get_freq\n");

        trx.close();
    }

    #[tokio::test]
    async fn plain_read_for_commands_without_extended_mode() {
        let (upstream, mut far) = tokio::io::duplex(1024);
        // chk_vfo has no extended form, so the first line is data.
        far.write_all(b"CHKVFO 0\nRPRT 0\n").await.unwrap();

        let trx = Transceiver::new(upstream);
        let resp = trx
            .send(Request::new(short_command(0xf0).unwrap()))
            .await
            .unwrap();
        assert_eq!(resp.command, CommandKey::default());
        assert_eq!(resp.data, vec!["CHKVFO 0"]);
        assert_eq!(resp.result, "0");

        trx.close();
    }

    #[tokio::test]
    async fn upstream_eof_closes_transceiver() {
        let (upstream, mut far) = tokio::io::duplex(1024);
        let trx = Transceiver::new(upstream);

        far.shutdown().await.unwrap();

        let err = trx.send(get_freq_request()).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));

        trx.closed().await;
        assert!(trx.is_closed());

        // Fast-fail after close.
        let err = trx.send(get_freq_request()).await.unwrap_err();
        assert!(matches!(err, Error::TransceiverClosed));
    }

    #[tokio::test]
    async fn transmit_failure_keeps_worker_alive() {
        let (upstream, far) = tokio::io::duplex(1024);
        drop(far);

        let trx = Transceiver::new(upstream);

        let err = trx.send(get_freq_request()).await.unwrap_err();
        assert!(matches!(err, Error::Transmit(_)));

        // The worker stays up; subsequent sends fail the same way.
        let err = trx.send(get_freq_request()).await.unwrap_err();
        assert!(matches!(err, Error::Transmit(_)));
        assert!(!trx.is_closed());

        trx.close();
    }

    #[tokio::test]
    async fn send_after_close_fails_fast() {
        let (upstream, _far) = tokio::io::duplex(1024);
        let trx = Transceiver::new(upstream);

        trx.close();
        trx.close(); // idempotent

        let err = trx.send(get_freq_request()).await.unwrap_err();
        assert!(matches!(err, Error::TransceiverClosed));
    }

    #[tokio::test]
    async fn when_done_fires_after_close() {
        let (upstream, _far) = tokio::io::duplex(1024);
        let trx = Transceiver::new(upstream);

        let (done_tx, done_rx) = oneshot::channel();
        trx.when_done(move || {
            let _ = done_tx.send(());
        });

        trx.close();
        done_rx.await.unwrap();
    }

    #[tokio::test]
    async fn abandoned_send_does_not_mispair_responses() {
        let (upstream, mut far) = tokio::io::duplex(1024);
        let trx = Transceiver::new(upstream);

        // First caller gives up before any response arrives.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), trx.send(get_freq_request())).await;
        assert!(abandoned.is_err());

        // Now both responses arrive: one for the orphaned request, one for
        // the next. The worker must discard the first in FIFO order.
        far.write_all(
            b"get_freq:\nFrequency: 111\nRPRT 0\nget_freq:\nFrequency: 222\nRPRT 0\n",
        )
        .await
        .unwrap();

        let resp = trx.send(get_freq_request()).await.unwrap();
        assert_eq!(resp.data, vec!["222"]);

        trx.close();
    }

    #[tokio::test]
    async fn concurrent_sends_are_serialized_in_order() {
        let (upstream, mut far) = tokio::io::duplex(1024);
        far.write_all(
            b"get_freq:\nFrequency: 14074000\nRPRT 0\nget_vfo:\nVFO: VFOA\nRPRT 0\n",
        )
        .await
        .unwrap();

        let trx = std::sync::Arc::new(Transceiver::new(upstream));

        let first = {
            let trx = trx.clone();
            tokio::spawn(async move { trx.send(get_freq_request()).await })
        };
        // Give the first task a head start so submission order is fixed.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let trx = trx.clone();
            tokio::spawn(
                async move { trx.send(Request::new(short_command(b'v').unwrap())).await },
            )
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.data, vec!["14074000"]);
        assert_eq!(second.data, vec!["VFOA"]);

        let written = read_written(&mut far, "+\\get_freq\n+\\get_vfo\n".len()).await;
        assert_eq!(written, "+\\get_freq\n+\\get_vfo\n");

        trx.close();
    }

    #[tokio::test]
    async fn receive_timeout_surfaces_as_receive_error() {
        let (upstream, mut far) = tokio::io::duplex(1024);
        let trx = Transceiver::with_timeout(upstream, Duration::from_millis(50));

        // No response at all: the read deadline elapses.
        let err = trx.send(get_freq_request()).await.unwrap_err();
        assert!(matches!(err, Error::Receive(_)));
        assert!(!trx.is_closed());

        // The worker is still responsive afterwards.
        far.write_all(b"get_freq:\nFrequency: 7030000\nRPRT 0\n")
            .await
            .unwrap();
        let resp = trx.send(get_freq_request()).await.unwrap();
        assert_eq!(resp.data, vec!["7030000"]);

        trx.close();
    }
}
