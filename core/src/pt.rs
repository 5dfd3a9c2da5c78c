//! The pluggable-transport supervisor handshake (spec.md §6), the part
//! common to both the client and the server: environment variables
//! announcing the negotiation, and the stdout line protocol used to report
//! back.
//!
//! This is "out of scope" in the sense that spec.md §1 treats it as an
//! external collaborator, but spec.md §6 specifies its shape, and it costs
//! little to implement faithfully rather than stub, so both binaries use it
//! as their normal startup path.

use std::collections::HashMap;
use std::io::Write;

/// The managed-transport protocol version this build understands.
pub const MANAGED_TRANSPORT_VERSION: &str = "1";

/// One environment-announced handshake, common to both sides.
#[derive(Debug, Clone, Default)]
pub struct PtEnv {
    pub managed_transport_ver: Option<String>,
    pub state_location: Option<String>,
    pub exit_on_stdin_close: bool,
}

impl PtEnv {
    /// Read the environment variables common to both the client and server
    /// handshake. Side-specific variables (`TOR_PT_SERVER_*`,
    /// `TOR_PT_CLIENT_TRANSPORTS`, `TOR_PT_ORPORT`, ...) are read by the
    /// caller with [`read_var`].
    pub fn from_env() -> Self {
        Self {
            managed_transport_ver: read_var("TOR_PT_MANAGED_TRANSPORT_VER"),
            state_location: read_var("TOR_PT_STATE_LOCATION"),
            exit_on_stdin_close: read_var("TOR_PT_EXIT_ON_STDIN_CLOSE").as_deref() == Some("1"),
        }
    }
}

/// Read a single `TOR_PT_*` environment variable.
pub fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Parse a `k1=v1,k2=v2` style value (used for e.g.
/// `TOR_PT_SERVER_TRANSPORT_OPTIONS`) into a map.
pub fn parse_kv_list(value: &str) -> HashMap<String, String> {
    value
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Write one handshake line to stdout and flush immediately — the
/// supervisor reads these line by line as they arrive.
pub fn emit_line(line: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{line}");
    let _ = stdout.flush();
}

/// Report a fatal environment/configuration problem and terminate the
/// handshake.
pub fn emit_env_error(message: &str) {
    emit_line(&format!("ENV-ERROR {message}"));
}

/// Terminate the handshake after reporting all methods.
pub fn emit_done() {
    emit_line("TRANSPORTS-DONE");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_key_value_pairs() {
        let parsed = parse_kv_list("front=a.example,utls=chrome_120");
        assert_eq!(parsed.get("front").map(String::as_str), Some("a.example"));
        assert_eq!(parsed.get("utls").map(String::as_str), Some("chrome_120"));
    }

    #[test]
    fn missing_env_var_reads_as_none() {
        assert!(read_var("HTTPTUN_DEFINITELY_UNSET_VAR").is_none());
    }
}
