//! Request, response, and cache-key types with their wire formatting.
//!
//! # Wire formats
//!
//! ```text
//! Long request:      \get_freq
//! Long with args:    \set_mode PKTUSB 1800
//! Extended request:  +\set_mode PKTUSB 1800      (always sent upstream)
//! Plain response:    14074000                     or  RPRT -11
//! Extended response: get_freq:<sep>Frequency: 14074000<sep>RPRT 0
//! ```
//!
//! All formatting here is pure string building -- no I/O is performed.

use std::fmt::Write as _;

use crate::commands::Command;

/// Key under which a response is cached.
///
/// Formed from the command's long name, joined with the first argument by
/// an underscore when the command has a sub-command (`get_level_RFPOWER`).
/// The empty key denotes "no command".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CommandKey(String);

impl CommandKey {
    pub fn new(key: impl Into<String>) -> Self {
        CommandKey(key.into())
    }

    /// Key for a command with a sub-command argument, e.g.
    /// `sub_command_key("get_level", "RFPOWER")` -> `get_level_RFPOWER`.
    pub fn sub_command_key(command: &str, sub: &str) -> Self {
        CommandKey(format!("{}_{}", command, sub))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CommandKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommandKey {
    fn from(key: &str) -> Self {
        CommandKey(key.to_string())
    }
}

/// One parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The catalog entry this request resolves to.
    pub command: &'static Command,
    /// Exactly `command.args` whitespace-separated arguments.
    pub args: Vec<String>,
    /// Separator requested via an extended-mode prefix (`+` -> `'\n'`,
    /// `;`/`,`/`|` -> the literal character). `None` for plain requests.
    /// Always `None` when the command does not support extended mode.
    pub extended_separator: Option<char>,
}

impl Request {
    /// A request with no arguments and no extended separator.
    pub fn new(command: &'static Command) -> Self {
        Request {
            command,
            args: Vec::new(),
            extended_separator: None,
        }
    }

    /// A request with arguments.
    pub fn with_args(command: &'static Command, args: &[&str]) -> Self {
        Request {
            command,
            args: args.iter().map(|a| a.to_string()).collect(),
            extended_separator: None,
        }
    }

    /// Whether the client asked for an extended-format answer.
    pub fn is_extended(&self) -> bool {
        self.extended_separator.is_some()
    }

    /// The cache key of this request.
    pub fn key(&self) -> CommandKey {
        if self.command.has_sub_command && !self.args.is_empty() {
            CommandKey::sub_command_key(self.command.long, &self.args[0])
        } else {
            CommandKey::new(self.command.long)
        }
    }

    /// The cache key this request invalidates, if any.
    pub fn invalidated_key(&self) -> Option<CommandKey> {
        let target = self.command.invalidates?;
        if self.command.has_sub_command && !self.args.is_empty() {
            Some(CommandKey::sub_command_key(target, &self.args[0]))
        } else {
            Some(CommandKey::new(target))
        }
    }

    /// The long wire format: `\name` plus space-separated arguments.
    pub fn long_format(&self) -> String {
        let mut out = format!("\\{}", self.command.long);
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }

    /// The extended long format sent upstream: `+` plus [`long_format`].
    ///
    /// [`long_format`]: Request::long_format
    pub fn extended_format(&self) -> String {
        format!("+{}", self.long_format())
    }
}

/// One response from the rig daemon.
///
/// In extended mode, `keys` runs parallel to `data`; an empty string marks
/// a value line that carried no key label. `result` is the decimal `RPRT`
/// code: `"0"` for success, negative codes for Hamlib errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub command: CommandKey,
    pub data: Vec<String>,
    pub keys: Vec<String>,
    pub result: String,
}

impl Response {
    /// Whether the daemon reported success.
    pub fn is_ok(&self) -> bool {
        self.result == "0"
    }

    /// The plain downstream format: data lines, or a single `RPRT` line
    /// when there is no data or the result is non-zero.
    pub fn format(&self) -> String {
        if self.data.is_empty() || self.result != "0" {
            return format!("RPRT {}", self.result);
        }
        self.data.join("\n")
    }

    /// The extended downstream format using the client's separator.
    ///
    /// A cached response recorded from a plain exchange may have fewer
    /// keys than data lines; missing keys are treated as unlabelled.
    pub fn extended_format(&self, separator: char) -> String {
        let mut out = String::new();
        let _ = write!(out, "{}:{}", self.command, separator);
        for (i, value) in self.data.iter().enumerate() {
            match self.keys.get(i).filter(|k| !k.is_empty()) {
                Some(key) => {
                    let _ = write!(out, "{}: {}{}", key, value, separator);
                }
                None => {
                    let _ = write!(out, "{}{}", value, separator);
                }
            }
        }
        let _ = write!(out, "RPRT {}", self.result);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{long_command, short_command};

    #[test]
    fn simple_command_key() {
        let req = Request::new(short_command(b'f').unwrap());
        assert_eq!(req.key(), CommandKey::from("get_freq"));
    }

    #[test]
    fn command_key_with_sub_command() {
        let req = Request::with_args(long_command("get_level").unwrap(), &["RFPOWER"]);
        assert_eq!(req.key(), CommandKey::from("get_level_RFPOWER"));
    }

    #[test]
    fn invalidated_key() {
        let req = Request::with_args(long_command("set_freq").unwrap(), &["3720000"]);
        assert_eq!(req.invalidated_key(), Some(CommandKey::from("get_freq")));
    }

    #[test]
    fn invalidated_key_with_sub_command() {
        let req = Request::with_args(long_command("set_level").unwrap(), &["RFPOWER", "0.5"]);
        assert_eq!(
            req.invalidated_key(),
            Some(CommandKey::from("get_level_RFPOWER"))
        );
    }

    #[test]
    fn no_invalidated_key_for_queries() {
        let req = Request::new(short_command(b'f').unwrap());
        assert_eq!(req.invalidated_key(), None);
    }

    #[test]
    fn long_format_without_args() {
        let req = Request::new(short_command(b'f').unwrap());
        assert_eq!(req.long_format(), "\\get_freq");
    }

    #[test]
    fn long_format_with_args() {
        let req = Request::with_args(long_command("set_mode").unwrap(), &["PKTUSB", "1800"]);
        assert_eq!(req.long_format(), "\\set_mode PKTUSB 1800");
        assert_eq!(req.extended_format(), "+\\set_mode PKTUSB 1800");
    }

    #[test]
    fn plain_format_with_data() {
        let resp = Response {
            command: CommandKey::from("get_freq"),
            data: vec!["14074000".into()],
            keys: vec!["Frequency".into()],
            result: "0".into(),
        };
        assert_eq!(resp.format(), "14074000");
    }

    #[test]
    fn plain_format_without_data() {
        let resp = Response {
            result: "0".into(),
            ..Response::default()
        };
        assert_eq!(resp.format(), "RPRT 0");
    }

    #[test]
    fn plain_format_error_result_suppresses_data() {
        let resp = Response {
            command: CommandKey::from("get_freq"),
            data: vec!["14074000".into()],
            keys: vec!["Frequency".into()],
            result: "-11".into(),
        };
        assert_eq!(resp.format(), "RPRT -11");
    }

    #[test]
    fn extended_format_newline_separator() {
        let resp = Response {
            command: CommandKey::from("get_mode"),
            data: vec!["USB".into(), "2400".into()],
            keys: vec!["Mode".into(), "Passband".into()],
            result: "0".into(),
        };
        assert_eq!(
            resp.extended_format('\n'),
            "get_mode:\nMode: USB\nPassband: 2400\nRPRT 0"
        );
    }

    #[test]
    fn extended_format_semicolon_separator() {
        let resp = Response {
            command: CommandKey::from("get_freq"),
            data: vec!["14074000".into()],
            keys: vec!["Frequency".into()],
            result: "0".into(),
        };
        assert_eq!(
            resp.extended_format(';'),
            "get_freq:;Frequency: 14074000;RPRT 0"
        );
    }

    #[test]
    fn extended_format_unlabelled_lines() {
        let resp = Response {
            command: CommandKey::from("chk_vfo"),
            data: vec!["CHKVFO 0".into()],
            keys: vec!["".into()],
            result: "0".into(),
        };
        assert_eq!(resp.extended_format('\n'), "chk_vfo:\nCHKVFO 0\nRPRT 0");
    }

    #[test]
    fn extended_format_tolerates_missing_keys() {
        // A response cached from a plain exchange has data but no keys.
        let resp = Response {
            command: CommandKey::from("get_freq"),
            data: vec!["14074000".into()],
            keys: vec![],
            result: "0".into(),
        };
        assert_eq!(resp.extended_format('\n'), "get_freq:\n14074000\nRPRT 0");
    }
}
