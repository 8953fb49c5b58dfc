//! Error types for rigrelay.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Parse errors, upstream transport faults,
//! and Hamlib-reported error codes are all captured here.

/// The error type for all rigrelay operations.
///
/// Variants cover the full range of failure modes of a proxy session:
/// malformed client input, transport faults on the upstream connection,
/// lifecycle errors, and error codes reported by the rig daemon itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A short command byte that is not in the command catalog.
    #[error("unknown short command 0x{0:02x}")]
    UnknownShortCommand(u8),

    /// A `\long_name` that is not in the command catalog.
    #[error("unknown long command {0}")]
    UnknownLongCommand(String),

    /// The client stream ended, either cleanly between requests or in the
    /// middle of a command's arguments.
    #[error("unexpected end of input")]
    EndOfInput,

    /// Writing a request to the upstream connection failed.
    #[error("transmission of request failed: {0}")]
    Transmit(String),

    /// Reading a response from the upstream connection failed.
    #[error("receiving of response failed: {0}")]
    Receive(String),

    /// The upstream connection was closed while waiting for a response.
    #[error("connection closed while waiting for response")]
    ConnectionClosed,

    /// `send` was called on a transceiver that has already shut down.
    #[error("transceiver already closed")]
    TransceiverClosed,

    /// Timed out waiting for a response.
    #[error("timeout waiting for response")]
    Timeout,

    /// The rig daemon answered with a non-zero `RPRT` code.
    #[error("hamlib: {0}")]
    Hamlib(HamlibError),

    /// A response arrived but its payload could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// `start_polling` was called while polling is already active.
    #[error("polling is already active")]
    PollingActive,

    /// A poll-management call requires active polling.
    #[error("polling is not active")]
    NotPolling,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The reserved downstream `RPRT` code for this error, if it has one.
    ///
    /// Upstream transport conditions are reported to proxy clients as
    /// `RPRT 501` (transmit failure), `RPRT 502` (receive failure), or
    /// `RPRT 503` (upstream closed) before the session is torn down.
    /// A closed transceiver maps to 503 as well since from the client's
    /// point of view the upstream is equally gone.
    pub fn result_code(&self) -> Option<&'static str> {
        match self {
            Error::Transmit(_) => Some("501"),
            Error::Receive(_) | Error::Timeout => Some("502"),
            Error::ConnectionClosed | Error::TransceiverClosed => Some("503"),
            _ => None,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The named Hamlib error codes carried in `RPRT` lines.
///
/// Hamlib reports errors as small negative integers (`RPRT -1` through
/// `RPRT -20`). The proxy forwards these verbatim to its clients; the typed
/// client library surfaces them as [`Error::Hamlib`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HamlibError {
    InvalidParameter,
    InvalidConfiguration,
    MemoryShortage,
    NotImplemented,
    CommunicationTimeout,
    Io,
    InternalError,
    ProtocolError,
    CommandRejected,
    ArgumentTruncated,
    NotAvailable,
    VfoNotTargetable,
    BusError,
    BusBusy,
    InvalidArgument,
    InvalidVfo,
    DomainError,
    Deprecated,
    SecurityError,
    PoweredOff,
}

impl HamlibError {
    /// Look up the error for a wire code (e.g. `-11`).
    ///
    /// Returns `None` for `0` (success) and for codes outside the
    /// documented `-1..-20` range.
    pub fn from_code(code: i32) -> Option<Self> {
        use HamlibError::*;
        match code {
            -1 => Some(InvalidParameter),
            -2 => Some(InvalidConfiguration),
            -3 => Some(MemoryShortage),
            -4 => Some(NotImplemented),
            -5 => Some(CommunicationTimeout),
            -6 => Some(Io),
            -7 => Some(InternalError),
            -8 => Some(ProtocolError),
            -9 => Some(CommandRejected),
            -10 => Some(ArgumentTruncated),
            -11 => Some(NotAvailable),
            -12 => Some(VfoNotTargetable),
            -13 => Some(BusError),
            -14 => Some(BusBusy),
            -15 => Some(InvalidArgument),
            -16 => Some(InvalidVfo),
            -17 => Some(DomainError),
            -18 => Some(Deprecated),
            -19 => Some(SecurityError),
            -20 => Some(PoweredOff),
            _ => None,
        }
    }

    /// The wire code for this error, as found in `RPRT` lines.
    pub fn code(&self) -> i32 {
        use HamlibError::*;
        match self {
            InvalidParameter => -1,
            InvalidConfiguration => -2,
            MemoryShortage => -3,
            NotImplemented => -4,
            CommunicationTimeout => -5,
            Io => -6,
            InternalError => -7,
            ProtocolError => -8,
            CommandRejected => -9,
            ArgumentTruncated => -10,
            NotAvailable => -11,
            VfoNotTargetable => -12,
            BusError => -13,
            BusBusy => -14,
            InvalidArgument => -15,
            InvalidVfo => -16,
            DomainError => -17,
            Deprecated => -18,
            SecurityError => -19,
            PoweredOff => -20,
        }
    }
}

impl std::fmt::Display for HamlibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use HamlibError::*;
        let msg = match self {
            InvalidParameter => "invalid parameter",
            InvalidConfiguration => "invalid configuration",
            MemoryShortage => "memory shortage",
            NotImplemented => "feature not implemented",
            CommunicationTimeout => "communication timed out",
            Io => "IO error",
            InternalError => "internal Hamlib error",
            ProtocolError => "protocol error",
            CommandRejected => "command rejected by the rig",
            ArgumentTruncated => "command performed, but arg truncated",
            NotAvailable => "feature not available",
            VfoNotTargetable => "target VFO unaccessible",
            BusError => "communication bus error",
            BusBusy => "communication bus collision",
            InvalidArgument => "invalid rig handle or argument",
            InvalidVfo => "invalid VFO",
            DomainError => "argument out of domain",
            Deprecated => "function deprecated",
            SecurityError => "security error",
            PoweredOff => "rig not powered on",
        };
        write!(f, "{} ({})", msg, self.code())
    }
}
