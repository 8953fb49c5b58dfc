//! The client connection and its typed accessors.
//!
//! [`Conn`] owns a [`Transceiver`] on a TCP connection to a rigctld
//! server. The generic [`set`](Conn::set) and [`get`](Conn::get) methods
//! check the `RPRT` result and surface non-zero codes as typed errors;
//! the typed accessors translate between wire strings and Rust values.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tracing::info;

use rigrelay_core::{Error, HamlibError, Result};
use rigrelay_protocol::{long_command, Request, Response, Transceiver};

use crate::polling::{start_polling, PollRequest, Polling};

/// Address used when an empty address is given to [`Conn::open`].
pub const DEFAULT_ADDRESS: &str = "localhost:4532";

/// Default deadline for a single command round-trip.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// A Hamlib client connection to a rigctld server.
pub struct Conn {
    address: String,
    trx: Arc<Transceiver>,
    command_timeout: Duration,
    polling: Mutex<Option<Polling>>,
}

impl Conn {
    /// Open a connection to the rigctld server at `address`. An empty
    /// address selects [`DEFAULT_ADDRESS`].
    pub async fn open(address: &str) -> Result<Self> {
        Self::open_with_timeout(address, DEFAULT_COMMAND_TIMEOUT).await
    }

    /// Open a connection with a custom per-command timeout.
    pub async fn open_with_timeout(address: &str, command_timeout: Duration) -> Result<Self> {
        let address = if address.is_empty() {
            DEFAULT_ADDRESS.to_string()
        } else {
            address.to_string()
        };

        let stream = TcpStream::connect(&address).await?;
        info!(address = %address, "connected to rigctld");

        Ok(Conn {
            trx: Arc::new(Transceiver::new(stream)),
            address,
            command_timeout,
            polling: Mutex::new(None),
        })
    }

    /// The address this connection was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Close the connection. Stops polling first.
    pub fn close(&self) {
        self.stop_polling();
        self.trx.close();
    }

    /// Whether this connection is closed.
    pub fn is_closed(&self) -> bool {
        self.trx.is_closed()
    }

    /// Run `callback` once as soon as this connection is closed.
    pub fn when_closed<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.trx.when_done(callback);
    }

    /// Execute the given set command and check its result code.
    pub async fn set(&self, long_name: &str, args: &[&str]) -> Result<()> {
        self.get(long_name, args).await.map(|_| ())
    }

    /// Execute the given query and return its checked response.
    pub async fn get(&self, long_name: &str, args: &[&str]) -> Result<Response> {
        let request = Request::with_args(long_command(long_name)?, args);
        let response = self.send(request).await?;
        if !response.is_ok() {
            return Err(result_error(&response.result));
        }
        Ok(response)
    }

    async fn send(&self, request: Request) -> Result<Response> {
        match tokio::time::timeout(self.command_timeout, self.trx.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    // -- Frequency ----------------------------------------------------------

    /// The current frequency in Hz on the selected VFO.
    pub async fn frequency(&self) -> Result<u64> {
        let response = self.get("get_freq", &[]).await?;
        parse_frequency(first_line(&response)?)
    }

    /// Tune the selected VFO to `frequency` in Hz.
    pub async fn set_frequency(&self, frequency: u64) -> Result<()> {
        self.set("set_freq", &[&frequency.to_string()]).await
    }

    // -- Mode and passband --------------------------------------------------

    /// The current mode and passband width in Hz.
    pub async fn mode_and_passband(&self) -> Result<(Mode, u64)> {
        let response = self.get("get_mode", &[]).await?;
        let mode = Mode::from_wire(first_line(&response)?);
        let passband = response
            .data
            .get(1)
            .ok_or_else(|| Error::MalformedResponse("missing passband".to_string()))?;
        Ok((mode, parse_frequency(passband)?))
    }

    /// Set mode and passband width in Hz. A zero passband selects the
    /// rig's default width.
    pub async fn set_mode_and_passband(&self, mode: Mode, passband: u64) -> Result<()> {
        self.set("set_mode", &[mode.as_str(), &passband.to_string()])
            .await
    }

    // -- PTT ----------------------------------------------------------------

    /// The current PTT state.
    pub async fn ptt(&self) -> Result<Ptt> {
        let response = self.get("get_ptt", &[]).await?;
        Ptt::from_wire(first_line(&response)?)
    }

    /// Key or unkey the transmitter.
    pub async fn set_ptt(&self, ptt: Ptt) -> Result<()> {
        self.set("set_ptt", &[ptt.as_wire()]).await
    }

    // -- Power status -------------------------------------------------------

    /// The current power status of the rig.
    pub async fn power_status(&self) -> Result<PowerStatus> {
        let response = self.get("get_powerstat", &[]).await?;
        PowerStatus::from_wire(first_line(&response)?)
    }

    /// Power the rig on.
    pub async fn power_on(&self) -> Result<()> {
        self.set("set_powerstat", &[PowerStatus::On.as_wire()]).await
    }

    /// Power the rig off.
    pub async fn power_off(&self) -> Result<()> {
        self.set("set_powerstat", &[PowerStatus::Off.as_wire()])
            .await
    }

    /// Put the rig into standby.
    pub async fn power_standby(&self) -> Result<()> {
        self.set("set_powerstat", &[PowerStatus::Standby.as_wire()])
            .await
    }

    // -- Power level --------------------------------------------------------

    /// The current RF power level as a fraction of full power (0.0..1.0).
    pub async fn power_level(&self) -> Result<f64> {
        let response = self.get("get_level", &["RFPOWER"]).await?;
        first_line(&response)?
            .parse()
            .map_err(|_| Error::MalformedResponse("cannot parse power level".to_string()))
    }

    /// Set the RF power level as a fraction of full power (0.0..1.0).
    pub async fn set_power_level(&self, level: f64) -> Result<()> {
        self.set("set_level", &["RFPOWER", &format!("{:.6}", level)])
            .await
    }

    // -- Polling ------------------------------------------------------------

    /// Poll the server with the given interval and per-command timeout.
    ///
    /// Poll requests can be added and removed on demand with
    /// [`add_polls`](Conn::add_polls) and [`remove_polls`](Conn::remove_polls).
    /// A request the rig reports as unavailable, unimplemented, or
    /// deprecated is deactivated automatically.
    pub fn start_polling(
        &self,
        interval: Duration,
        timeout: Duration,
        requests: Vec<PollRequest>,
    ) -> Result<()> {
        let mut polling = self.polling.lock();
        if polling.is_some() {
            return Err(Error::PollingActive);
        }
        *polling = Some(start_polling(self.trx.clone(), interval, timeout, requests));
        Ok(())
    }

    /// Stop the polling loop. A no-op when polling is not active.
    pub fn stop_polling(&self) {
        if let Some(polling) = self.polling.lock().take() {
            polling.stop();
        }
    }

    /// Whether this connection polls the server periodically.
    pub fn is_polling(&self) -> bool {
        self.polling.lock().is_some()
    }

    /// Add poll requests while polling is active. A request with the same
    /// command as an existing one replaces it.
    pub fn add_polls(&self, requests: Vec<PollRequest>) -> Result<()> {
        let polling = self.polling.lock();
        let Some(polling) = polling.as_ref() else {
            return Err(Error::NotPolling);
        };
        for request in requests {
            polling.add(request);
        }
        Ok(())
    }

    /// Remove the poll requests with the given long command names. A no-op
    /// when polling is not active.
    pub fn remove_polls(&self, long_names: &[&str]) {
        let polling = self.polling.lock();
        let Some(polling) = polling.as_ref() else {
            return;
        };
        for name in long_names {
            polling.remove(name);
        }
    }
}

/// Map a non-zero `RPRT` result to a typed error.
///
/// Negative codes are Hamlib errors forwarded from the rig; the 5xx codes
/// are the proxy's own transport conditions.
fn result_error(result: &str) -> Error {
    match result.parse::<i32>() {
        Ok(501) => Error::Transmit("upstream transmit failed".to_string()),
        Ok(502) => Error::Receive("upstream receive failed".to_string()),
        Ok(503) => Error::ConnectionClosed,
        Ok(code) => match HamlibError::from_code(code) {
            Some(err) => Error::Hamlib(err),
            None => Error::MalformedResponse(format!("unexpected result code {}", code)),
        },
        Err(_) => Error::MalformedResponse(format!("unparsable result code {:?}", result)),
    }
}

fn first_line(response: &Response) -> Result<&str> {
    response
        .data
        .first()
        .map(String::as_str)
        .ok_or_else(|| Error::MalformedResponse("empty response data".to_string()))
}

/// Frequencies arrive as plain integers, but some daemons append a
/// fractional part.
fn parse_frequency(value: &str) -> Result<u64> {
    let hz: f64 = value
        .parse()
        .map_err(|_| Error::MalformedResponse(format!("cannot parse frequency {:?}", value)))?;
    Ok(hz.round() as u64)
}

/// The operating mode of a rig, as named by the Hamlib protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Usb,
    Lsb,
    Cw,
    Cwr,
    Rtty,
    Rttyr,
    Am,
    Fm,
    Wfm,
    Ams,
    PktLsb,
    PktUsb,
    PktFm,
    EcssUsb,
    EcssLsb,
    Fax,
    Sam,
    Sal,
    Sah,
    Dsb,
    /// A mode name this library does not know; passed through verbatim.
    Other(String),
}

impl Mode {
    pub fn from_wire(name: &str) -> Self {
        use Mode::*;
        match name {
            "USB" => Usb,
            "LSB" => Lsb,
            "CW" => Cw,
            "CWR" => Cwr,
            "RTTY" => Rtty,
            "RTTYR" => Rttyr,
            "AM" => Am,
            "FM" => Fm,
            "WFM" => Wfm,
            "AMS" => Ams,
            "PKTLSB" => PktLsb,
            "PKTUSB" => PktUsb,
            "PKTFM" => PktFm,
            "ECSSUSB" => EcssUsb,
            "ECSSLSB" => EcssLsb,
            "FAX" => Fax,
            "SAM" => Sam,
            "SAL" => Sal,
            "SAH" => Sah,
            "DSB" => Dsb,
            other => Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        use Mode::*;
        match self {
            Usb => "USB",
            Lsb => "LSB",
            Cw => "CW",
            Cwr => "CWR",
            Rtty => "RTTY",
            Rttyr => "RTTYR",
            Am => "AM",
            Fm => "FM",
            Wfm => "WFM",
            Ams => "AMS",
            PktLsb => "PKTLSB",
            PktUsb => "PKTUSB",
            PktFm => "PKTFM",
            EcssUsb => "ECSSUSB",
            EcssLsb => "ECSSLSB",
            Fax => "FAX",
            Sam => "SAM",
            Sal => "SAL",
            Sah => "SAH",
            Dsb => "DSB",
            Other(name) => name,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The PTT state of a rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ptt {
    Rx,
    Tx,
    TxMic,
    TxData,
}

impl Ptt {
    pub fn from_wire(value: &str) -> Result<Self> {
        match value {
            "0" => Ok(Ptt::Rx),
            "1" => Ok(Ptt::Tx),
            "2" => Ok(Ptt::TxMic),
            "3" => Ok(Ptt::TxData),
            other => Err(Error::MalformedResponse(format!(
                "unknown PTT state {:?}",
                other
            ))),
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            Ptt::Rx => "0",
            Ptt::Tx => "1",
            Ptt::TxMic => "2",
            Ptt::TxData => "3",
        }
    }
}

/// The power status of a rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStatus {
    Off,
    On,
    Standby,
}

impl PowerStatus {
    pub fn from_wire(value: &str) -> Result<Self> {
        match value {
            "0" => Ok(PowerStatus::Off),
            "1" => Ok(PowerStatus::On),
            "2" => Ok(PowerStatus::Standby),
            other => Err(Error::MalformedResponse(format!(
                "unknown power status {:?}",
                other
            ))),
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            PowerStatus::Off => "0",
            PowerStatus::On => "1",
            PowerStatus::Standby => "2",
        }
    }
}
