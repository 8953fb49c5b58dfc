//! The proxy session and its collaborator traits.
//!
//! # Request pipeline
//!
//! 1. Read the next request from the client. End of stream closes the
//!    session normally; a parse error tears the whole connection down.
//! 2. Answer `chk_vfo` locally without touching cache or upstream.
//! 3. If the command invalidates a cached query, drop that entry
//!    unconditionally before dispatch.
//! 4. Cacheable requests are looked up first; a hit skips the upstream
//!    entirely.
//! 5. On miss, delegate to the transceiver. Transport errors are reported
//!    to the client as `RPRT 501|502|503` and end the session.
//! 6. Successful responses to cacheable requests are stored.
//! 7. The response goes back in extended format (with the client's
//!    separator) when the request was extended, plain otherwise, always
//!    newline terminated.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rigrelay_cache::Cache;
use rigrelay_core::{Error, Result};
use rigrelay_protocol::responses::chk_vfo_response;
use rigrelay_protocol::{CommandKey, Request, RequestReader, Response, Transceiver};

/// The upstream collaborator of a session: anything that can turn a
/// request into a response. Implemented by [`Transceiver`].
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl RequestSender for Transceiver {
    async fn send(&self, request: Request) -> Result<Response> {
        Transceiver::send(self, request).await
    }
}

/// The cache collaborator of a session. Implemented by
/// [`rigrelay_cache::Cache`] and by [`NopCache`].
pub trait ResponseCache: Send + Sync {
    fn put(&self, key: CommandKey, response: Response);
    fn get(&self, key: &CommandKey) -> Option<Response>;
    fn invalidate(&self, key: &CommandKey);
}

impl ResponseCache for Cache {
    fn put(&self, key: CommandKey, response: Response) {
        Cache::put(self, key, response)
    }

    fn get(&self, key: &CommandKey) -> Option<Response> {
        Cache::get(self, key)
    }

    fn invalidate(&self, key: &CommandKey) {
        Cache::invalidate(self, key)
    }
}

/// A cache that stores nothing, for sessions that should always hit the
/// upstream.
pub struct NopCache;

impl ResponseCache for NopCache {
    fn put(&self, _key: CommandKey, _response: Response) {}

    fn get(&self, _key: &CommandKey) -> Option<Response> {
        None
    }

    fn invalidate(&self, _key: &CommandKey) {}
}

/// Handle to one running proxy session.
///
/// The session task starts in the constructor and terminates on client
/// EOF, client protocol error, request-handling error, [`close`], or the
/// supervisor's done signal.
///
/// [`close`]: Proxy::close
pub struct Proxy {
    closed: CancellationToken,
}

impl Proxy {
    /// Start a session over `downstream` with the given cache.
    ///
    /// `done` is the supervisor's signal that the shared upstream is gone;
    /// when it fires the session shuts down and the client connection is
    /// closed. With `trace` enabled the session logs one line per request
    /// (`>`), cache hit (`c`), and upstream response (`<`).
    pub fn new<S>(
        downstream: S,
        sender: Arc<dyn RequestSender>,
        cache: Arc<dyn ResponseCache>,
        done: CancellationToken,
        trace: bool,
    ) -> Proxy
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let closed = CancellationToken::new();
        let session = Session {
            sender,
            cache,
            trace,
        };

        tokio::spawn(run(downstream, session, closed.clone(), done));

        Proxy { closed }
    }

    /// Start a session that never caches.
    pub fn uncached<S>(
        downstream: S,
        sender: Arc<dyn RequestSender>,
        done: CancellationToken,
        trace: bool,
    ) -> Proxy
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::new(downstream, sender, Arc::new(NopCache), done, trace)
    }

    /// Shut the session down. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Wait until the session has terminated.
    pub async fn wait(&self) {
        self.closed.cancelled().await;
    }
}

struct Session {
    sender: Arc<dyn RequestSender>,
    cache: Arc<dyn ResponseCache>,
    trace: bool,
}

impl Session {
    async fn handle_request(&self, request: &Request) -> Result<Response> {
        self.trace(">", &request.long_format());

        if request.key() == CommandKey::from("chk_vfo") {
            self.trace("<", "CHKVFO 0");
            return Ok(chk_vfo_response());
        }

        if let Some(invalidated) = request.invalidated_key() {
            self.cache.invalidate(&invalidated);
        }

        if request.command.cacheable {
            if let Some(response) = self.cache.get(&request.key()) {
                self.trace("c", &response.format());
                return Ok(response);
            }
        }

        let response = self.sender.send(request.clone()).await?;

        if request.command.cacheable {
            self.cache.put(request.key(), response.clone());
        }

        self.trace("<", &response.format());
        Ok(response)
    }

    /// Diagnostics only; must never fail a request.
    fn trace(&self, direction: &str, line: &str) {
        if self.trace {
            info!("{} {}", direction, line);
        }
    }
}

async fn run<S>(downstream: S, session: Session, closed: CancellationToken, done: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(downstream);
    let mut reader = RequestReader::new(BufReader::new(read_half));
    let mut writer = write_half;

    loop {
        let request = tokio::select! {
            _ = closed.cancelled() => break,
            _ = done.cancelled() => {
                debug!("upstream done, closing session");
                break;
            }
            request = reader.read_request() => request,
        };

        let request = match request {
            Ok(request) => request,
            Err(Error::EndOfInput) => {
                debug!("client closed connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "request parsing failed, closing session");
                break;
            }
        };

        match session.handle_request(&request).await {
            Ok(response) => {
                let formatted = match request.extended_separator {
                    Some(separator) => response.extended_format(separator),
                    None => response.format(),
                };
                if write_line(&mut writer, &formatted).await.is_err() {
                    debug!("client write failed, closing session");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "request handling failed, closing session");
                if let Some(code) = e.result_code() {
                    let _ = write_line(&mut writer, &format!("RPRT {}", code)).await;
                }
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
    closed.cancel();
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
