//! Shutdown signalling (spec.md §5, §6): both binaries exit cleanly on
//! SIGTERM/ctrl-C, and on stdin EOF when the supervisor handshake requested
//! it via `TOR_PT_EXIT_ON_STDIN_CLOSE` (spec.md's "shutdown signal" wording).
//!
//! `wait_for_shutdown` resolves as soon as any one of those conditions is
//! observed; callers race it against their accept/serve loop with
//! `tokio::select!` and exit 0 on that branch, per spec.md §6's "Exit codes:
//! ... zero on signal-driven shutdown."

use tokio::io::AsyncReadExt;

/// Block until a shutdown signal arrives: ctrl-C, SIGTERM (Unix only), or
/// stdin reaching EOF when `exit_on_stdin_close` is set.
pub async fn wait_for_shutdown(exit_on_stdin_close: bool) {
    tokio::select! {
        _ = ctrl_c() => log::info!("received ctrl-c, shutting down"),
        _ = terminate() => log::info!("received SIGTERM, shutting down"),
        _ = stdin_eof(exit_on_stdin_close) => log::info!("stdin closed, shutting down"),
    }
}

async fn ctrl_c() {
    // Only a startup-time failure (no such signal handler on this platform)
    // would make this return early; it otherwise never resolves.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}

/// Wait for stdin to reach EOF, but only when `exit_on_stdin_close` is set;
/// otherwise this never resolves, so it never wins the `select!` in
/// [`wait_for_shutdown`].
async fn stdin_eof(exit_on_stdin_close: bool) {
    if !exit_on_stdin_close {
        std::future::pending::<()>().await;
        return;
    }

    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 64];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => return,
            Ok(_) => continue,
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdin_eof_never_resolves_when_not_requested() {
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            stdin_eof(false),
        )
        .await;
        assert!(result.is_err(), "should have timed out, not resolved");
    }
}
