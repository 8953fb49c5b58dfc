//! Mock rigctld server for protocol-level testing.
//!
//! [`MockRigd`] binds a TCP listener on a random localhost port,
//! pre-loaded with scripted frame/response pairs. Once
//! [`start`](MockRigd::start) is called it accepts a single connection and
//! processes the expectations in order: for each expected request frame it
//! reads one line from the client and writes back the scripted response
//! bytes.
//!
//! # Example
//!
//! ```no_run
//! use rigrelay_test_harness::MockRigd;
//!
//! # async fn example() -> rigrelay_core::Result<()> {
//! let mut rigd = MockRigd::bind().await?;
//!
//! // When the proxy sends "+\get_freq", answer with a full extended block.
//! rigd.expect("+\\get_freq", "get_freq:\nFrequency: 14074000\nRPRT 0\n");
//!
//! let addr = rigd.addr().to_string();
//! rigd.start();
//! // ... connect a Transceiver to `addr` and exercise it ...
//! rigd.wait().await.unwrap();
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rigrelay_core::{Error, Result};

/// A pre-loaded request/response pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact frame (without trailing newline) the client must send.
    request: String,
    /// The bytes to write back when the matching frame is received.
    response: Vec<u8>,
}

/// A scripted rigctld stand-in on a random localhost port.
///
/// If the client sends a frame that does not match the next expectation,
/// the server records the mismatch and closes the connection;
/// [`wait`](MockRigd::wait) surfaces it.
pub struct MockRigd {
    listener: Option<TcpListener>,
    addr: String,
    expectations: VecDeque<Expectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockRigd {
    /// Bind a listener on a random port. Expectations can be loaded before
    /// [`start`](MockRigd::start) accepts the connection.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(Error::Io)?;
        let addr = listener.local_addr().map_err(Error::Io)?.to_string();
        Ok(MockRigd {
            listener: Some(listener),
            addr,
            expectations: VecDeque::new(),
            server_handle: None,
        })
    }

    /// Add an expected request frame and the response to script for it.
    ///
    /// `request` is matched against one received line with its trailing
    /// newline stripped. Expectations are consumed in order.
    pub fn expect(&mut self, request: &str, response: &str) {
        self.expectations.push_back(Expectation {
            request: request.to_string(),
            response: response.as_bytes().to_vec(),
        });
    }

    /// The address the server is listening on.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Accept a single connection and serve all expectations on a
    /// background task. After the last expectation the connection is
    /// dropped, which the client observes as upstream EOF.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations: Vec<Expectation> = self.expectations.drain(..).collect();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {}", e))?;
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);

            for (i, expectation) in expectations.iter().enumerate() {
                let mut line = String::new();
                let n = reader
                    .read_line(&mut line)
                    .await
                    .map_err(|e| format!("expectation {}: read error: {}", i, e))?;
                if n == 0 {
                    return Err(format!(
                        "expectation {}: client disconnected (expected {:?})",
                        i, expectation.request
                    ));
                }
                let frame = line.trim_end_matches('\n');

                if frame != expectation.request {
                    return Err(format!(
                        "expectation {}: frame mismatch: expected {:?}, got {:?}",
                        i, expectation.request, frame
                    ));
                }
                tracing::debug!(frame, "mock rigd matched frame");

                write_half
                    .write_all(&expectation.response)
                    .await
                    .map_err(|e| format!("expectation {}: write error: {}", i, e))?;
                write_half
                    .flush()
                    .await
                    .map_err(|e| format!("expectation {}: flush error: {}", i, e))?;
            }

            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task and surface unmet or mismatched
    /// expectations as an error.
    pub async fn wait(self) -> std::result::Result<(), String> {
        if let Some(handle) = self.server_handle {
            handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?
        } else {
            Ok(())
        }
    }
}
