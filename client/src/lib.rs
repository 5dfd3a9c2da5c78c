//! The httptun client: accepts local SOCKS connections and relays them
//! through a polling HTTP round-tripper (spec.md §2, §4).

pub mod config;
pub mod copyloop;
pub mod error;
pub mod ptshim;
pub mod retry;
pub mod roundtripper;
pub mod socks;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use config::Cli;
use roundtripper::RoundTripper;

pub async fn client_main(cli: Arc<Cli>) -> Result<()> {
    let bind_addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind SOCKS listener on {bind_addr}"))?;
    let local_addr = listener.local_addr()?;

    let handshake = ptshim::negotiate(local_addr)?;
    let proxy = handshake.and_then(|h| h.proxy).or_else(|| cli.proxy.clone());
    let exit_on_stdin_close = httptun_core::pt::PtEnv::from_env().exit_on_stdin_close;

    let http_client = build_http_client(proxy.as_deref())?;

    log::info!("accepting SOCKS connections on {local_addr}");
    // Signal-driven shutdown (spec.md §5, §6) exits 0 regardless of what the
    // accept loop is doing; an accept-loop error still propagates as a
    // fatal runtime error.
    tokio::select! {
        result = accept_loop(listener, cli, http_client) => result,
        _ = httptun_core::shutdown::wait_for_shutdown(exit_on_stdin_close) => Ok(()),
    }
}

fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy_url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url).context("invalid --proxy URL")?);
    }
    builder.build().context("failed to build HTTP client")
}

async fn accept_loop(listener: TcpListener, cli: Arc<Cli>, http_client: reqwest::Client) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                // `is_connection_error` covers the transient per-accept
                // failures ("Temporary() == true" in spec.md §4.8); other
                // errors are treated as fatal for the acceptor.
                if e.kind() == std::io::ErrorKind::ConnectionAborted
                    || e.kind() == std::io::ErrorKind::ConnectionReset
                {
                    log::warn!("transient accept error: {e}");
                    continue;
                }
                return Err(e).context("SOCKS accept loop terminated");
            }
        };

        let cli = cli.clone();
        let http_client = http_client.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &cli, http_client).await {
                log::debug!("connection from {} ended: {}", httptun_core::scrub::scrub(peer), e);
            }
        });
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    cli: &Cli,
    http_client: reqwest::Client,
) -> Result<()> {
    let args = socks::handshake(&mut stream).await.context("socks handshake failed")?;
    let connection_config = config::resolve(cli, &args).context("no usable url for this connection")?;
    let round_tripper = RoundTripper::new(&connection_config.round_tripper, http_client);

    copyloop::run(stream, connection_config, round_tripper).await;
    Ok(())
}
