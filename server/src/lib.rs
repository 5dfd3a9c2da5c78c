//! The httptun server: terminates HTTP(S), demultiplexes requests by
//! session id onto downstream connections (spec.md §2, §4).
//!
//! `server_main` mirrors the teacher's `turn-server::server_main`: the
//! binary's `main.rs` is kept to the allocator/logging/entry-point
//! boilerplate, and everything else lives here so integration tests can
//! drive the server directly.

pub mod config;
pub mod downstream;
pub mod handler;
pub mod ptshim;
pub mod tls;
pub mod transact;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::any;
use axum::Router;
use httptun_core::constants::{SESSION_STALENESS, SESSION_SWEEP_PERIOD};
use httptun_core::session::{spawn_sweeper, SessionTable};
use tokio::net::TcpStream;

use config::{Config, DownstreamTarget};
use handler::{dispatch, AppState};

pub async fn server_main(config: Arc<Config>) -> Result<()> {
    serve(config, SESSION_STALENESS, SESSION_SWEEP_PERIOD).await
}

/// Same as [`server_main`], but with the session-expiry staleness horizon
/// and sweep period as parameters rather than the normative constants —
/// exposed so integration tests can exercise a real sweep cycle (spec.md §8
/// scenario 4) without waiting out the production 120 s/60 s values.
pub async fn serve(config: Arc<Config>, staleness: Duration, sweep_period: Duration) -> Result<()> {
    let (config, bind_addr) = apply_supervisor_handshake(config)?;
    let exit_on_stdin_close = httptun_core::pt::PtEnv::from_env().exit_on_stdin_close;

    let sessions = Arc::new(SessionTable::<TcpStream>::new());
    let _sweeper = spawn_sweeper(sessions.clone(), staleness, sweep_period);

    let state = Arc::new(AppState {
        config: config.clone(),
        sessions,
    });

    let app: Router = Router::new()
        .fallback(any(dispatch))
        .with_state(state);

    log::info!("listening on {bind_addr}");
    // Signal-driven shutdown (spec.md §5, §6) exits 0 regardless of what the
    // serve loop is doing; a serve-loop error still propagates as a fatal
    // startup/runtime error.
    tokio::select! {
        result = tls::serve(bind_addr, &config.tls, app) => result,
        _ = httptun_core::shutdown::wait_for_shutdown(exit_on_stdin_close) => Ok(()),
    }
}

/// If launched under a pluggable-transport supervisor, let its handshake
/// override the listen address and downstream target; otherwise use the
/// CLI-derived config as-is.
fn apply_supervisor_handshake(config: Arc<Config>) -> Result<(Arc<Config>, SocketAddr)> {
    let cli_addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let Some(handshake) = ptshim::negotiate()? else {
        return Ok((config, cli_addr));
    };

    let mut overridden = (*config).clone();
    if let Some(orport) = handshake.orport {
        overridden.downstream = DownstreamTarget::External(orport);
    }

    Ok((Arc::new(overridden), handshake.bind_addr))
}
