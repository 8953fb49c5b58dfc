// rigrelay -- caching, multiplexing proxy for the Hamlib net-rigctl
// protocol.
//
// Terminates many concurrent rigctl client sessions and serializes their
// requests onto a single connection to a rigctld daemon, answering
// read-only queries from a short-lived response cache. Useful when several
// polling clients (loggers, digital-mode tools, panadapters) would
// otherwise overwhelm the slow serial link behind the daemon.
//
// Usage:
//   rigrelay --destination localhost:4534 --listen 0.0.0.0:4532
//   rigrelay -d radio.local:4532 -L 500ms -v

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use rigrelay_cache::Cache;
use rigrelay_protocol::Transceiver;
use rigrelay_proxy::{Proxy, RequestSender, ResponseCache};

/// rigrelay -- caching proxy in front of a rigctld server.
#[derive(Parser)]
#[command(name = "rigrelay", version, about)]
struct Args {
    /// <host:port> of the destination rigctld server.
    #[arg(short, long, default_value = "localhost:4534")]
    destination: String,

    /// Listening address of this proxy.
    #[arg(short, long, default_value = "0.0.0.0:4532")]
    listen: String,

    /// Lifetime of responses in the cache (e.g. 200ms, 1s; 0 disables
    /// expiry).
    #[arg(short = 'L', long, value_parser = parse_duration, default_value = "200ms")]
    lifetime: Duration,

    /// Timeout for upstream requests.
    #[arg(short, long, value_parser = parse_duration, default_value = "10s")]
    timeout: Duration,

    /// Interval between reconnection attempts.
    #[arg(short, long, value_parser = parse_duration, default_value = "10s")]
    retry: Duration,

    /// Trace the communication with the destination.
    #[arg(short = 'v', long)]
    trace: bool,
}

/// Parse a duration like "200ms", "10s", "1m", "1h", or a bare number of
/// seconds.
fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(pos) => s.split_at(pos),
        None => (s, "s"),
    };
    let value: f64 = value
        .parse()
        .map_err(|_| format!("invalid duration {:?}", s))?;
    let seconds = match unit {
        "ms" => value / 1000.0,
        "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        other => return Err(format!("unknown duration unit {:?}", other)),
    };
    Ok(Duration::from_secs_f64(seconds))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    loop {
        if let Err(e) = serve(&args).await {
            error!(error = %e, "proxy loop failed");
        }
        debug!(interval = ?args.retry, "waiting before reconnect");
        tokio::time::sleep(args.retry).await;
    }
}

/// One upstream lifetime: dial the daemon, serve clients until the
/// transceiver publishes its closed signal, tear everything down.
async fn serve(args: &Args) -> anyhow::Result<()> {
    let upstream = TcpStream::connect(&args.destination)
        .await
        .with_context(|| format!("cannot connect to {}", args.destination))?;
    // Rig commands are small and latency-sensitive.
    if let Err(e) = upstream.set_nodelay(true) {
        debug!(error = %e, "failed to set TCP_NODELAY on upstream");
    }
    info!(destination = %args.destination, "connected to rigctld");

    let trx = Arc::new(Transceiver::with_timeout(upstream, args.timeout));
    let done = CancellationToken::new();
    {
        let done = done.clone();
        trx.when_done(move || {
            info!("transceiver stopped");
            done.cancel();
        });
    }

    let cache: Arc<dyn ResponseCache> = Arc::new(Cache::with_lifetime(args.lifetime));
    let sender: Arc<dyn RequestSender> = trx.clone();

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("cannot listen on {}", args.listen))?;
    info!(listen = %args.listen, "accepting rigctl clients");

    let result = accept_loop(&listener, sender, cache, &done, args.trace).await;
    trx.close();
    result
}

async fn accept_loop(
    listener: &TcpListener,
    sender: Arc<dyn RequestSender>,
    cache: Arc<dyn ResponseCache>,
    done: &CancellationToken,
    trace: bool,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            _ = done.cancelled() => {
                info!("upstream connection closed");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (conn, peer) = accepted.context("accept failed")?;
                debug!(peer = %peer, "accepted client connection");
                if let Err(e) = conn.set_nodelay(true) {
                    debug!(error = %e, "failed to set TCP_NODELAY on client");
                }
                // The session task cleans itself up; the handle is not needed.
                let _ = Proxy::new(conn, sender.clone(), cache.clone(), done.clone(), trace);
            }
        }
    }
}
