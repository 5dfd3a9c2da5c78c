//! Client-side pluggable-transport supervisor handshake (spec.md §6).

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use httptun_core::pt::{emit_done, emit_env_error, emit_line, read_var, PtEnv, MANAGED_TRANSPORT_VERSION};

pub const TRANSPORT_NAME: &str = "httptun";

#[derive(Debug, Clone)]
pub struct ClientHandshake {
    /// Outbound forward-proxy URL the supervisor wants all connections
    /// routed through, if any.
    pub proxy: Option<String>,
}

/// Perform the client-side handshake if a supervisor is present, reporting
/// the local SOCKS listen address back via a `CMETHOD` line. Returns
/// `Ok(None)` when launched directly (no `TOR_PT_*` environment).
pub fn negotiate(socks_addr: SocketAddr) -> Result<Option<ClientHandshake>> {
    let env = PtEnv::from_env();
    let Some(version) = env.managed_transport_ver else {
        return Ok(None);
    };

    if version != MANAGED_TRANSPORT_VERSION {
        emit_env_error(&format!("unsupported managed transport version {version}"));
        bail!("unsupported managed transport version {version}");
    }

    let transports = read_var("TOR_PT_CLIENT_TRANSPORTS").unwrap_or_default();
    if !transports.split(',').any(|t| t == TRANSPORT_NAME) {
        emit_env_error(&format!(
            "{TRANSPORT_NAME} not among requested transports: {transports}"
        ));
        bail!("{TRANSPORT_NAME} not requested by supervisor");
    }

    let proxy = read_var("TOR_PT_PROXY");

    emit_line(&format!("CMETHOD {TRANSPORT_NAME} socks5 {socks_addr}"));
    emit_done();

    Ok(Some(ClientHandshake { proxy }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "TOR_PT_MANAGED_TRANSPORT_VER",
            "TOR_PT_CLIENT_TRANSPORTS",
            "TOR_PT_PROXY",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn absent_supervisor_env_yields_none() {
        let _lock = ENV_GUARD.lock().unwrap();
        clear_env();
        assert!(negotiate("127.0.0.1:4455".parse().unwrap())
            .unwrap()
            .is_none());
    }

    #[test]
    fn full_handshake_parses_proxy() {
        let _lock = ENV_GUARD.lock().unwrap();
        clear_env();
        std::env::set_var("TOR_PT_MANAGED_TRANSPORT_VER", MANAGED_TRANSPORT_VERSION);
        std::env::set_var("TOR_PT_CLIENT_TRANSPORTS", "httptun");
        std::env::set_var("TOR_PT_PROXY", "socks5://127.0.0.1:9050");

        let handshake = negotiate("127.0.0.1:4455".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(handshake.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        clear_env();
    }
}
