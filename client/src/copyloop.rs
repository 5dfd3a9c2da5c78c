//! The client copy loop (spec.md §4.5): one producer reading the local
//! SOCKS connection into fixed-size chunks, a single-slot hand-off, and a
//! driver that polls the tunnel with a geometrically backed-off interval.
//!
//! Grounded on the teacher's worker-loop *shape* in `server/mod.rs`'s
//! `fork_socket` (bounded channel handoff between a reader task and a
//! driver, `tokio::select!`-style waiting, `log::trace!` per-chunk), built
//! against this system's own polling semantics rather than the teacher's
//! immediate UDP relay.

use std::time::Duration;

use bytes::Bytes;
use httptun_core::constants::{INIT_POLL_INTERVAL, MAX_PAYLOAD_LENGTH, MAX_POLL_INTERVAL, POLL_INTERVAL_MULTIPLIER};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::ConnectionConfig;
use crate::roundtripper::{RequestSpec, RoundTripper};

/// Run one SOCKS connection's copy loop to completion. Consumes `local` and
/// closes it (by drop) on return, per spec.md §4.8.
pub async fn run<S>(local: S, config: ConnectionConfig, round_tripper: RoundTripper)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let session_id = httptun_core::session_id::generate();
    let (mut read_half, mut write_half) = tokio::io::split(local);

    let (tx, mut rx) = mpsc::channel::<Bytes>(1);
    let producer = tokio::spawn(async move {
        produce(&mut read_half, tx).await;
    });

    let mut interval = Duration::ZERO;

    loop {
        let body = match tokio::time::timeout(interval, rx.recv()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(_elapsed) => Bytes::new(),
        };

        let req = RequestSpec {
            url: config.url.clone(),
            host_override: config.host_override.clone(),
            session_id: session_id.clone(),
            body: body.clone(),
        };

        let reply = match crate::retry::send_with_retry(&round_tripper, &req).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("session {session_id} sendRecv failed, closing: {e}");
                break;
            }
        };

        let nw = reply.len();
        if !reply.is_empty() && write_half.write_all(&reply).await.is_err() {
            break;
        }

        interval = next_interval(interval, nw > 0 || !body.is_empty());
    }

    producer.abort();
}

fn next_interval(current: Duration, transferred_anything: bool) -> Duration {
    if transferred_anything {
        Duration::ZERO
    } else if current == Duration::ZERO {
        INIT_POLL_INTERVAL
    } else {
        let scaled = current.mul_f64(POLL_INTERVAL_MULTIPLIER);
        scaled.min(MAX_POLL_INTERVAL)
    }
}

async fn produce<R: AsyncRead + Unpin>(read_half: &mut R, tx: mpsc::Sender<Bytes>) {
    loop {
        let mut buf = vec![0u8; MAX_PAYLOAD_LENGTH];
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(Bytes::new()).await;
                break;
            }
            Ok(n) => {
                buf.truncate(n);
                if tx.send(Bytes::from(buf)).await.is_err() {
                    break;
                }
            }
            Err(_) => {
                let _ = tx.send(Bytes::new()).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_resets_interval_to_zero() {
        assert_eq!(next_interval(Duration::from_secs(1), true), Duration::ZERO);
    }

    #[test]
    fn idle_from_zero_jumps_to_init_interval() {
        assert_eq!(next_interval(Duration::ZERO, false), INIT_POLL_INTERVAL);
    }

    #[test]
    fn idle_backs_off_geometrically_and_caps() {
        let mut interval = INIT_POLL_INTERVAL;
        for _ in 0..20 {
            interval = next_interval(interval, false);
        }
        assert_eq!(interval, MAX_POLL_INTERVAL);
    }
}
