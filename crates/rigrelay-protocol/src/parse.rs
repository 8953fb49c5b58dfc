//! Stream readers for the two directions of the protocol.
//!
//! [`RequestReader`] consumes the downstream byte stream coming from a
//! client and produces one [`Request`] per call. It is whitespace
//! insensitive (any Unicode whitespace separates tokens, newlines
//! included), understands `#` comments, the `\long_name` form, packed
//! short commands (`fmv` yields three requests across three calls), and
//! the extended-mode prefixes `+`, `;`, `,`, `|`.
//!
//! [`ResponseReader`] consumes the upstream byte stream coming from the
//! rig daemon and produces one [`Response`] per call, reading lines until
//! the `RPRT ` terminator. In extended mode the first line names the
//! command and subsequent lines are split into key/value pairs on the
//! first `": "`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use rigrelay_core::{Error, Result};

use crate::commands::{long_command, short_command, Command};
use crate::types::{CommandKey, Request, Response};

/// Reads [`Request`]s from a buffered client stream.
///
/// The reader is restartable across calls: bytes of a partially consumed
/// line (e.g. the `mv` after the `f` of a packed `fmv`) are preserved in
/// the underlying buffer for the next call.
pub struct RequestReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> RequestReader<R> {
    pub fn new(reader: R) -> Self {
        RequestReader { reader }
    }

    /// Read the next request from the stream.
    ///
    /// Returns [`Error::EndOfInput`] when the stream ends with no request
    /// in progress, and also when it ends while arguments are still
    /// expected. Unknown commands yield the corresponding typed error;
    /// the stream remains usable afterwards.
    pub async fn read_request(&mut self) -> Result<Request> {
        // An extended-mode prefix applies to the next command that resolves.
        // The first prefix seen wins; it is silently dropped later if the
        // command does not support extended mode.
        let mut separator: Option<char> = None;

        let command = loop {
            let Some(byte) = self.next_byte().await? else {
                return Err(Error::EndOfInput);
            };
            match byte {
                b'#' => self.skip_line().await?,
                b'+' => {
                    separator.get_or_insert('\n');
                }
                b';' | b',' | b'|' => {
                    separator.get_or_insert(byte as char);
                }
                b'\\' => {
                    let name = self.read_word().await?;
                    break long_command(&name)?;
                }
                b if (b as char).is_whitespace() => continue,
                b => break short_command(b)?,
            }
        };

        let args = self.read_args(command).await?;
        let extended_separator = separator.filter(|_| command.supports_extended);

        Ok(Request {
            command,
            args,
            extended_separator,
        })
    }

    async fn read_args(&mut self, command: &'static Command) -> Result<Vec<String>> {
        let mut args = Vec::with_capacity(command.args);
        while args.len() < command.args {
            args.push(self.read_word().await?);
        }
        Ok(args)
    }

    /// Read one whitespace-delimited word, skipping leading whitespace.
    /// The delimiting whitespace byte is consumed.
    async fn read_word(&mut self) -> Result<String> {
        let mut word = Vec::new();
        loop {
            let Some(byte) = self.next_byte().await? else {
                break;
            };
            if (byte as char).is_whitespace() {
                if word.is_empty() {
                    continue;
                }
                break;
            }
            word.push(byte);
        }
        if word.is_empty() {
            return Err(Error::EndOfInput);
        }
        Ok(String::from_utf8_lossy(&word).into_owned())
    }

    /// Discard bytes through the next newline (or end of stream).
    async fn skip_line(&mut self) -> Result<()> {
        while let Some(byte) = self.next_byte().await? {
            if byte == b'\n' {
                break;
            }
        }
        Ok(())
    }

    async fn next_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(None);
        }
        let byte = buf[0];
        self.reader.consume(1);
        Ok(Some(byte))
    }
}

/// Reads [`Response`]s from a buffered upstream stream.
pub struct ResponseReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> ResponseReader<R> {
    pub fn new(reader: R) -> Self {
        ResponseReader { reader }
    }

    /// Read lines until a `RPRT ` terminator completes one response.
    ///
    /// In extended mode the first line carries the command name (trailing
    /// `:` and anything after it stripped) and subsequent lines are split
    /// into key/value on the first `": "`; lines without a separator are
    /// recorded as unlabelled values.
    ///
    /// End of stream before the terminator is [`Error::ConnectionClosed`];
    /// any other read error propagates as [`Error::Io`].
    pub async fn read_response(&mut self, extended: bool) -> Result<Response> {
        let mut response = Response::default();
        let mut count = 0;
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            count += 1;
            let line = line.trim_end_matches('\n').trim_end_matches('\r');

            if let Some(result) = line.strip_prefix("RPRT ") {
                response.result = result.to_string();
                return Ok(response);
            }

            if extended && count == 1 {
                let name = line.split_once(':').map(|(name, _)| name).unwrap_or(line);
                response.command = CommandKey::from(name);
            } else if extended {
                match line.split_once(": ") {
                    Some((key, value)) => {
                        response.keys.push(key.to_string());
                        response.data.push(value.to_string());
                    }
                    None => {
                        response.keys.push(String::new());
                        response.data.push(line.to_string());
                    }
                }
            } else {
                response.data.push(line.to_string());
            }
        }
    }
}
