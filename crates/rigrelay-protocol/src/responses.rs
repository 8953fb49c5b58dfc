//! Canned [`Response`] values for common queries.
//!
//! Used by the proxy's `chk_vfo` short-circuit and by tests and mock
//! servers that need well-formed daemon answers without a real rig.

use crate::types::{CommandKey, Response};

/// A bare success response for the given command.
pub fn ok_response(command: CommandKey) -> Response {
    Response {
        command,
        result: "0".to_string(),
        ..Response::default()
    }
}

/// The canonical answer to the `chk_vfo` handshake probe.
///
/// Hamlib clients probe this once per connection; the proxy answers it
/// locally to save the round-trip.
pub fn chk_vfo_response() -> Response {
    Response {
        command: CommandKey::from("chk_vfo"),
        data: vec!["CHKVFO 0".to_string()],
        keys: vec![String::new()],
        result: "0".to_string(),
    }
}

/// A `get_freq` answer for the given frequency in Hz.
pub fn get_freq_response(frequency: u64) -> Response {
    Response {
        command: CommandKey::from("get_freq"),
        data: vec![frequency.to_string()],
        keys: vec!["Frequency".to_string()],
        result: "0".to_string(),
    }
}

/// A `get_vfo` answer for the given VFO name.
pub fn get_vfo_response(vfo: &str) -> Response {
    Response {
        command: CommandKey::from("get_vfo"),
        data: vec![vfo.to_string()],
        keys: vec!["VFO".to_string()],
        result: "0".to_string(),
    }
}

/// A `get_mode` answer for the given mode and passband in Hz.
pub fn get_mode_response(mode: &str, passband: u64) -> Response {
    Response {
        command: CommandKey::from("get_mode"),
        data: vec![mode.to_string(), passband.to_string()],
        keys: vec!["Mode".to_string(), "Passband".to_string()],
        result: "0".to_string(),
    }
}

/// A `get_ptt` answer.
pub fn get_ptt_response(transmitting: bool) -> Response {
    Response {
        command: CommandKey::from("get_ptt"),
        data: vec![if transmitting { "1" } else { "0" }.to_string()],
        keys: vec!["PTT".to_string()],
        result: "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chk_vfo_formats_plainly() {
        let resp = chk_vfo_response();
        assert_eq!(resp.format(), "CHKVFO 0");
    }

    #[test]
    fn ok_response_is_bare_rprt() {
        let resp = ok_response(CommandKey::from("set_freq"));
        assert_eq!(resp.format(), "RPRT 0");
    }

    #[test]
    fn get_freq_keys_parallel_data() {
        let resp = get_freq_response(14_074_000);
        assert_eq!(resp.keys.len(), resp.data.len());
        assert_eq!(resp.format(), "14074000");
        assert_eq!(
            resp.extended_format('\n'),
            "get_freq:\nFrequency: 14074000\nRPRT 0"
        );
    }

    #[test]
    fn get_mode_carries_mode_and_passband() {
        let resp = get_mode_response("USB", 2400);
        assert_eq!(resp.data, vec!["USB", "2400"]);
        assert_eq!(resp.format(), "USB\n2400");
    }

    #[test]
    fn get_ptt_encodes_state() {
        assert_eq!(get_ptt_response(true).data, vec!["1"]);
        assert_eq!(get_ptt_response(false).data, vec!["0"]);
    }

    #[test]
    fn get_vfo_response_labels_vfo() {
        let resp = get_vfo_response("VFOA");
        assert_eq!(
            resp.extended_format('\n'),
            "get_vfo:\nVFO: VFOA\nRPRT 0"
        );
    }
}
