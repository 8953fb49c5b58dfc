//! The rigctl command catalog.
//!
//! Every command of the net-rigctl protocol is described by one static
//! [`Command`] entry: its single-byte short form (which may be a byte
//! outside the printable ASCII range, e.g. `0x8b` for `get_dcd`), its long
//! name, the exact argument count consumed when parsing the short form,
//! which cached query it invalidates, and whether it participates in
//! caching, sub-command keying, and extended mode.
//!
//! Two lookup indexes are derived once at first use. Duplicate short bytes
//! or long names are a configuration bug and abort catalog construction;
//! unknown lookups are ordinary typed errors surfaced through the request
//! reader.

use std::collections::HashMap;
use std::sync::LazyLock;

use rigrelay_core::{Error, Result};

/// One entry of the command catalog.
///
/// Entries are immutable and process-wide; [`Request`](crate::Request)
/// values hold `&'static Command` references into [`COMMANDS`].
#[derive(Debug, PartialEq, Eq)]
pub struct Command {
    /// Single-byte short form, possibly outside printable ASCII.
    pub short: u8,
    /// Lowercase long name, used with the `\` prefix on the wire.
    pub long: &'static str,
    /// Exact number of whitespace-separated arguments.
    pub args: usize,
    /// Long name of the cached query this command invalidates, if any.
    pub invalidates: Option<&'static str>,
    /// When true, the first argument participates in the cache key
    /// (distinguishes `get_level RFPOWER` from `get_level KEYSPD`).
    pub has_sub_command: bool,
    /// When true, the command may be issued in extended mode and the
    /// daemon answers in the extended format.
    pub supports_extended: bool,
    /// Only cacheable queries are looked up and stored.
    pub cacheable: bool,
}

impl Command {
    const fn new(short: u8, long: &'static str) -> Self {
        Command {
            short,
            long,
            args: 0,
            invalidates: None,
            has_sub_command: false,
            supports_extended: false,
            cacheable: false,
        }
    }

    const fn args(mut self, count: usize) -> Self {
        self.args = count;
        self
    }

    const fn invalidates(mut self, long: &'static str) -> Self {
        self.invalidates = Some(long);
        self
    }

    const fn sub_command(mut self) -> Self {
        self.has_sub_command = true;
        self
    }

    const fn extended(mut self) -> Self {
        self.supports_extended = true;
        self
    }

    const fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }
}

/// The complete command catalog, in Hamlib documentation order.
pub static COMMANDS: &[Command] = &[
    Command::new(b'F', "set_freq").args(1).invalidates("get_freq").extended(),
    Command::new(b'f', "get_freq").cacheable().extended(),
    Command::new(b'M', "set_mode").args(2).invalidates("get_mode").extended(),
    Command::new(b'm', "get_mode").cacheable().extended(),
    Command::new(b'V', "set_vfo").args(1).invalidates("get_vfo").extended(),
    Command::new(b'v', "get_vfo").cacheable().extended(),
    Command::new(b'J', "set_rit").args(1).invalidates("get_rit").extended(),
    Command::new(b'j', "get_rit").cacheable().extended(),
    Command::new(b'Z', "set_xit").args(1).invalidates("get_xit").extended(),
    Command::new(b'z', "get_xit").cacheable().extended(),
    Command::new(b'T', "set_ptt").args(1).invalidates("get_ptt").extended(),
    Command::new(b't', "get_ptt").cacheable().extended(),
    Command::new(0x8b, "get_dcd").cacheable().extended(),
    Command::new(b'R', "set_rptr_shift").args(1).invalidates("get_rptr_shift").extended(),
    Command::new(b'r', "get_rptr_shift").cacheable().extended(),
    Command::new(b'O', "set_rptr_offs").args(1).invalidates("get_rptr_offs").extended(),
    Command::new(b'o', "get_rptr_offs").cacheable().extended(),
    Command::new(b'C', "set_ctcss_tone").args(1).invalidates("get_ctcss_tone").extended(),
    Command::new(b'c', "get_ctcss_tone").cacheable().extended(),
    Command::new(b'D', "set_dcs_code").args(1).invalidates("get_dcs_code").extended(),
    Command::new(b'd', "get_dcs_code").cacheable().extended(),
    Command::new(0x90, "set_ctcss_sql").args(1).invalidates("get_ctcss_sql").extended(),
    Command::new(0x91, "get_ctcss_sql").cacheable().extended(),
    Command::new(0x92, "set_dcs_sql").args(1).invalidates("get_dcs_sql").extended(),
    Command::new(0x93, "get_dcs_sql").cacheable().extended(),
    Command::new(b'I', "set_split_freq").args(1).invalidates("get_split_freq").extended(),
    Command::new(b'i', "get_split_freq").cacheable().extended(),
    Command::new(b'X', "set_split_mode").args(2).invalidates("get_split_mode").extended(),
    Command::new(b'x', "get_split_mode").cacheable().extended(),
    Command::new(b'K', "set_split_freq_mode").args(3).invalidates("get_split_freq_mode").extended(),
    Command::new(b'k', "get_split_freq_mode").cacheable().extended(),
    Command::new(b'S', "set_split_vfo").args(2).invalidates("get_split_vfo").extended(),
    Command::new(b's', "get_split_vfo").cacheable().extended(),
    Command::new(b'N', "set_ts").args(1).invalidates("get_ts").extended(),
    Command::new(b'n', "get_ts").cacheable().extended(),
    Command::new(b'U', "set_func").args(2).invalidates("get_func").sub_command().extended(),
    Command::new(b'u', "get_func").args(1).sub_command().cacheable().extended(),
    Command::new(b'L', "set_level").args(2).invalidates("get_level").sub_command().extended(),
    Command::new(b'l', "get_level").args(1).sub_command().cacheable().extended(),
    Command::new(b'P', "set_parm").args(2).invalidates("get_parm").sub_command().extended(),
    Command::new(b'p', "get_parm").args(1).sub_command().cacheable().extended(),
    Command::new(b'B', "set_bank").args(1).extended(),
    Command::new(b'E', "set_mem").args(1).invalidates("get_mem").extended(),
    Command::new(b'e', "get_mem").cacheable().extended(),
    Command::new(b'G', "vfo_op").args(1).extended(),
    Command::new(b'g', "scan").args(2),
    Command::new(b'H', "set_channel").args(1).invalidates("get_channel"),
    Command::new(b'h', "get_channel").cacheable(),
    Command::new(b'A', "set_trn").args(1).invalidates("get_trn").extended(),
    Command::new(b'a', "get_trn").cacheable().extended(),
    Command::new(b'Y', "set_ant").invalidates("get_ant").extended(),
    Command::new(b'y', "get_ant").cacheable().extended(),
    Command::new(b'*', "reset").args(1),
    Command::new(0x87, "set_powerstat").args(1).invalidates("get_powerstat").extended(),
    Command::new(0x88, "get_powerstat").cacheable().extended(),
    Command::new(0x89, "send_dtmf").args(1),
    Command::new(0x8a, "recv_dtmf"),
    Command::new(b'b', "send_morse").args(1),
    Command::new(b'w', "send_cmd").args(2),
    Command::new(b'_', "get_info").cacheable(),
    Command::new(b'1', "dump_caps").cacheable().extended(),
    Command::new(b'3', "dump_conf").cacheable().extended(),
    Command::new(b'2', "power2mW").args(3).extended(),
    Command::new(b'4', "mW2power").args(3).extended(),
    Command::new(0x8f, "dump_state").extended(),
    Command::new(0xf0, "chk_vfo").cacheable(),
    Command::new(0xf1, "halt"),
    Command::new(0x8c, "pause").args(1).extended(),
];

static SHORT_INDEX: LazyLock<HashMap<u8, &'static Command>> = LazyLock::new(|| {
    let mut index = HashMap::with_capacity(COMMANDS.len());
    for cmd in COMMANDS {
        if index.insert(cmd.short, cmd).is_some() {
            panic!("duplicate short command 0x{:02x} in catalog", cmd.short);
        }
    }
    index
});

static LONG_INDEX: LazyLock<HashMap<&'static str, &'static Command>> = LazyLock::new(|| {
    let mut index = HashMap::with_capacity(COMMANDS.len());
    for cmd in COMMANDS {
        if index.insert(cmd.long, cmd).is_some() {
            panic!("duplicate long command {} in catalog", cmd.long);
        }
    }
    index
});

/// Look up a command by its short byte.
pub fn short_command(short: u8) -> Result<&'static Command> {
    SHORT_INDEX
        .get(&short)
        .copied()
        .ok_or(Error::UnknownShortCommand(short))
}

/// Look up a command by its long name.
pub fn long_command(long: &str) -> Result<&'static Command> {
    LONG_INDEX
        .get(long)
        .copied()
        .ok_or_else(|| Error::UnknownLongCommand(long.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_cover_every_entry() {
        for cmd in COMMANDS {
            assert_eq!(short_command(cmd.short).unwrap(), cmd);
            assert_eq!(long_command(cmd.long).unwrap(), cmd);
        }
    }

    #[test]
    fn unknown_short_command() {
        let err = short_command(b'?').unwrap_err();
        assert!(matches!(err, Error::UnknownShortCommand(b'?')));
    }

    #[test]
    fn unknown_long_command() {
        let err = long_command("blah").unwrap_err();
        assert!(matches!(err, Error::UnknownLongCommand(name) if name == "blah"));
    }

    #[test]
    fn non_ascii_shorts_resolve() {
        assert_eq!(short_command(0x8b).unwrap().long, "get_dcd");
        assert_eq!(short_command(0xf0).unwrap().long, "chk_vfo");
        assert_eq!(short_command(0x8f).unwrap().long, "dump_state");
    }

    #[test]
    fn invalidation_targets_exist() {
        for cmd in COMMANDS {
            if let Some(target) = cmd.invalidates {
                assert!(
                    long_command(target).is_ok(),
                    "{} invalidates unknown command {}",
                    cmd.long,
                    target
                );
            }
        }
    }

    #[test]
    fn set_commands_are_never_cacheable() {
        for cmd in COMMANDS {
            if cmd.long.starts_with("set_") {
                assert!(!cmd.cacheable, "{} must not be cacheable", cmd.long);
            }
        }
    }

    #[test]
    fn repeater_shift_uses_documented_spelling() {
        assert!(long_command("set_rptr_shift").is_ok());
        assert!(long_command("get_rptr_shift").is_ok());
        assert!(long_command("set_rprt_shift").is_err());
    }
}
