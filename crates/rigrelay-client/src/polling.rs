//! Periodic polling of a rigctld server.
//!
//! A [`PollRequest`] pairs a catalog command with a [`ResponseHandler`]
//! that digests each successful answer. The polling loop sends every
//! registered request once per interval; requests the rig reports as
//! unavailable, unimplemented, or deprecated are deactivated so the loop
//! does not hammer the daemon with commands it will never answer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rigrelay_core::{Error, HamlibError, Result};
use rigrelay_protocol::commands::{long_command, short_command, Command};
use rigrelay_protocol::{Request, Response, Transceiver};

use crate::client::{Mode, PowerStatus, Ptt};

/// A callback digesting one poll response.
///
/// Implemented for any matching closure.
pub trait ResponseHandler: Send + Sync {
    fn handle(&self, response: &Response);
}

impl<F> ResponseHandler for F
where
    F: Fn(&Response) + Send + Sync,
{
    fn handle(&self, response: &Response) {
        self(response)
    }
}

/// A command with arguments that is sent periodically to the server,
/// together with the handler for its responses.
#[derive(Clone)]
pub struct PollRequest {
    command: &'static Command,
    args: Vec<String>,
    handler: Arc<dyn ResponseHandler>,
}

impl std::fmt::Debug for PollRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollRequest")
            .field("command", &self.command)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl PollRequest {
    /// Create a poll request from a handler, a command name (single
    /// character short form or long name), and arguments.
    pub fn new(
        handler: impl ResponseHandler + 'static,
        command: &str,
        args: &[&str],
    ) -> Result<Self> {
        let command = if command.len() == 1 {
            short_command(command.as_bytes()[0])?
        } else {
            long_command(command)?
        };
        Ok(PollRequest {
            command,
            args: args.iter().map(|a| a.to_string()).collect(),
            handler: Arc::new(handler),
        })
    }

    /// The catalog entry this request polls.
    pub fn command(&self) -> &'static Command {
        self.command
    }
}

/// Poll the current frequency; the callback receives Hz.
pub fn on_frequency(callback: impl Fn(u64) + Send + Sync + 'static) -> Result<PollRequest> {
    PollRequest::new(
        move |response: &Response| {
            let Some(value) = response.data.first() else {
                return;
            };
            match value.parse::<f64>() {
                Ok(hz) => callback(hz.round() as u64),
                Err(_) => warn!(value = %value, "cannot parse frequency poll result"),
            }
        },
        "get_freq",
        &[],
    )
}

/// Poll mode and passband; the callback receives the mode and the
/// passband width in Hz.
pub fn on_mode_and_passband(
    callback: impl Fn(Mode, u64) + Send + Sync + 'static,
) -> Result<PollRequest> {
    PollRequest::new(
        move |response: &Response| {
            let (Some(mode), Some(passband)) = (response.data.first(), response.data.get(1))
            else {
                return;
            };
            match passband.parse::<f64>() {
                Ok(passband) => callback(Mode::from_wire(mode), passband.round() as u64),
                Err(_) => warn!(value = %passband, "cannot parse passband poll result"),
            }
        },
        "get_mode",
        &[],
    )
}

/// Poll the PTT state.
pub fn on_ptt(callback: impl Fn(Ptt) + Send + Sync + 'static) -> Result<PollRequest> {
    PollRequest::new(
        move |response: &Response| {
            let Some(value) = response.data.first() else {
                return;
            };
            match Ptt::from_wire(value) {
                Ok(ptt) => callback(ptt),
                Err(e) => warn!(error = %e, "cannot parse PTT poll result"),
            }
        },
        "get_ptt",
        &[],
    )
}

/// Poll the power status.
pub fn on_power_status(
    callback: impl Fn(PowerStatus) + Send + Sync + 'static,
) -> Result<PollRequest> {
    PollRequest::new(
        move |response: &Response| {
            let Some(value) = response.data.first() else {
                return;
            };
            match PowerStatus::from_wire(value) {
                Ok(status) => callback(status),
                Err(e) => warn!(error = %e, "cannot parse power status poll result"),
            }
        },
        "get_powerstat",
        &[],
    )
}

/// Poll the RF power level; the callback receives the fraction of full
/// power.
pub fn on_power_level(callback: impl Fn(f64) + Send + Sync + 'static) -> Result<PollRequest> {
    PollRequest::new(
        move |response: &Response| {
            let Some(value) = response.data.first() else {
                return;
            };
            match value.parse::<f64>() {
                Ok(level) => callback(level),
                Err(_) => warn!(value = %value, "cannot parse power level poll result"),
            }
        },
        "get_level",
        &["RFPOWER"],
    )
}

/// The running polling loop of one connection.
pub(crate) struct Polling {
    requests: Arc<RwLock<Vec<PollRequest>>>,
    done: CancellationToken,
}

pub(crate) fn start_polling(
    trx: Arc<Transceiver>,
    interval: Duration,
    timeout: Duration,
    requests: Vec<PollRequest>,
) -> Polling {
    let requests = Arc::new(RwLock::new(requests));
    let done = CancellationToken::new();

    {
        let requests = requests.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = done.cancelled() => {
                        debug!("polling stopped");
                        return;
                    }
                    _ = tick.tick() => {
                        let snapshot: Vec<PollRequest> = requests.read().clone();
                        poll(&trx, timeout, &snapshot, &requests).await;
                    }
                }
            }
        });
    }

    Polling { requests, done }
}

impl Polling {
    pub(crate) fn stop(&self) {
        self.done.cancel();
    }

    /// Add a poll request; one with the same command replaces the old
    /// entry.
    pub(crate) fn add(&self, request: PollRequest) {
        let mut requests = self.requests.write();
        if let Some(existing) = requests.iter_mut().find(|r| r.command == request.command) {
            *existing = request;
        } else {
            requests.push(request);
        }
    }

    pub(crate) fn remove(&self, long_name: &str) {
        self.requests
            .write()
            .retain(|r| r.command.long != long_name);
    }
}

async fn poll(
    trx: &Transceiver,
    timeout: Duration,
    snapshot: &[PollRequest],
    requests: &RwLock<Vec<PollRequest>>,
) {
    for poll_request in snapshot {
        let request = Request {
            command: poll_request.command,
            args: poll_request.args.clone(),
            extended_separator: None,
        };

        let result = match tokio::time::timeout(timeout, trx.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(command = poll_request.command.long, error = %e, "poll request failed");
                continue;
            }
        };

        if !response.is_ok() {
            let hamlib = response
                .result
                .parse::<i32>()
                .ok()
                .and_then(HamlibError::from_code);
            match hamlib {
                Some(
                    err @ (HamlibError::NotAvailable
                    | HamlibError::NotImplemented
                    | HamlibError::Deprecated),
                ) => {
                    warn!(
                        command = poll_request.command.long,
                        error = %err,
                        "deactivating poll request"
                    );
                    requests.write().retain(|r| r.command != poll_request.command);
                }
                _ => {
                    warn!(
                        command = poll_request.command.long,
                        result = %response.result,
                        "poll request failed"
                    );
                }
            }
            continue;
        }

        poll_request.handler.handle(&response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Conn;
    use rigrelay_core::Error;
    use rigrelay_test_harness::MockRigd;

    #[test]
    fn poll_request_resolves_short_and_long_names() {
        let by_short = PollRequest::new(|_: &Response| {}, "f", &[]).unwrap();
        let by_long = PollRequest::new(|_: &Response| {}, "get_freq", &[]).unwrap();
        assert_eq!(by_short.command(), by_long.command());
    }

    #[test]
    fn poll_request_rejects_unknown_commands() {
        assert!(matches!(
            PollRequest::new(|_: &Response| {}, "blah", &[]).unwrap_err(),
            Error::UnknownLongCommand(_)
        ));
        assert!(matches!(
            PollRequest::new(|_: &Response| {}, "?", &[]).unwrap_err(),
            Error::UnknownShortCommand(_)
        ));
    }

    #[tokio::test]
    async fn polling_invokes_handler_each_interval() {
        let mut rigd = MockRigd::bind().await.unwrap();
        rigd.expect("+\\get_freq", "get_freq:\nFrequency: 14074000\nRPRT 0\n");
        rigd.expect("+\\get_freq", "get_freq:\nFrequency: 7030000\nRPRT 0\n");
        let conn = Conn::open(rigd.addr()).await.unwrap();
        rigd.start();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        conn.start_polling(
            Duration::from_millis(10),
            Duration::from_millis(500),
            vec![on_frequency(move |hz| {
                let _ = tx.send(hz);
            })
            .unwrap()],
        )
        .unwrap();
        assert!(conn.is_polling());

        assert_eq!(rx.recv().await, Some(14_074_000));
        assert_eq!(rx.recv().await, Some(7_030_000));

        conn.stop_polling();
        assert!(!conn.is_polling());
        conn.close();
        rigd.wait().await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_poll_request_is_deactivated() {
        let mut rigd = MockRigd::bind().await.unwrap();
        // First round: get_freq is refused and deactivated, get_vfo works.
        // Second round must only poll get_vfo, or the script mismatches.
        rigd.expect("+\\get_freq", "RPRT -11\n");
        rigd.expect("+\\get_vfo", "get_vfo:\nVFO: VFOA\nRPRT 0\n");
        rigd.expect("+\\get_vfo", "get_vfo:\nVFO: VFOA\nRPRT 0\n");
        let conn = Conn::open(rigd.addr()).await.unwrap();
        rigd.start();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let on_vfo = PollRequest::new(
            move |response: &Response| {
                if let Some(vfo) = response.data.first() {
                    let _ = tx.send(vfo.clone());
                }
            },
            "get_vfo",
            &[],
        )
        .unwrap();

        conn.start_polling(
            Duration::from_millis(10),
            Duration::from_millis(500),
            vec![
                on_frequency(|_| panic!("refused request must not be handled")).unwrap(),
                on_vfo,
            ],
        )
        .unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("VFOA"));
        assert_eq!(rx.recv().await.as_deref(), Some("VFOA"));

        conn.stop_polling();
        conn.close();
        rigd.wait().await.unwrap();
    }

    #[tokio::test]
    async fn start_polling_twice_fails() {
        let mut rigd = MockRigd::bind().await.unwrap();
        let conn = Conn::open(rigd.addr()).await.unwrap();
        rigd.start();

        conn.start_polling(Duration::from_secs(60), Duration::from_secs(1), vec![])
            .unwrap();
        let err = conn
            .start_polling(Duration::from_secs(60), Duration::from_secs(1), vec![])
            .unwrap_err();
        assert!(matches!(err, Error::PollingActive));

        conn.close();
    }

    #[tokio::test]
    async fn poll_management_requires_active_polling() {
        let mut rigd = MockRigd::bind().await.unwrap();
        let conn = Conn::open(rigd.addr()).await.unwrap();
        rigd.start();

        let request = PollRequest::new(|_: &Response| {}, "get_freq", &[]).unwrap();
        assert!(matches!(
            conn.add_polls(vec![request]).unwrap_err(),
            Error::NotPolling
        ));

        // Removing without active polling is a harmless no-op.
        conn.remove_polls(&["get_freq"]);

        conn.close();
    }
}
