//! Server-side pluggable-transport supervisor handshake (spec.md §6).
//!
//! When launched directly (no `TOR_PT_*` environment) the server falls
//! back to plain CLI configuration via `Config::load`; this module only
//! applies when a supervisor is driving the process.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use httptun_core::pt::{emit_done, emit_env_error, emit_line, read_var, PtEnv, MANAGED_TRANSPORT_VERSION};

pub const TRANSPORT_NAME: &str = "httptun";

#[derive(Debug, Clone)]
pub struct ServerHandshake {
    pub bind_addr: SocketAddr,
    /// The downstream target named by `TOR_PT_ORPORT`, when the supervisor
    /// configured an external one.
    pub orport: Option<SocketAddr>,
}

/// Perform the server-side handshake if a supervisor is present
/// (`TOR_PT_MANAGED_TRANSPORT_VER` is set); returns `Ok(None)` when the
/// process was launched directly so the caller should fall through to
/// CLI/config-file configuration instead.
pub fn negotiate() -> Result<Option<ServerHandshake>> {
    let env = PtEnv::from_env();
    let Some(version) = env.managed_transport_ver else {
        return Ok(None);
    };

    if version != MANAGED_TRANSPORT_VERSION {
        emit_env_error(&format!("unsupported managed transport version {version}"));
        bail!("unsupported managed transport version {version}");
    }

    let transports = read_var("TOR_PT_SERVER_TRANSPORTS").unwrap_or_default();
    if !transports.split(',').any(|t| t == TRANSPORT_NAME) {
        emit_env_error(&format!(
            "{TRANSPORT_NAME} not among requested transports: {transports}"
        ));
        bail!("{TRANSPORT_NAME} not requested by supervisor");
    }

    let bindaddrs = read_var("TOR_PT_SERVER_BINDADDR").unwrap_or_default();
    let bind_addr = bindaddrs
        .split(',')
        .find_map(|pair| pair.split_once('-'))
        .filter(|(name, _)| *name == TRANSPORT_NAME)
        .map(|(_, addr)| addr)
        .context("TOR_PT_SERVER_BINDADDR missing an entry for this transport")?
        .parse::<SocketAddr>()
        .context("TOR_PT_SERVER_BINDADDR address is not host:port")?;

    let orport = read_var("TOR_PT_ORPORT")
        .map(|v| v.parse::<SocketAddr>())
        .transpose()
        .context("TOR_PT_ORPORT is not host:port")?;

    emit_line(&format!("SMETHOD {TRANSPORT_NAME} {bind_addr}"));
    emit_done();

    Ok(Some(ServerHandshake { bind_addr, orport }))
}
