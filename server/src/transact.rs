//! The transactor (spec.md §4.3): move one request's worth of bytes across
//! a session's downstream connection in both directions within a single
//! POST.

use std::time::Duration;

use bytes::Bytes;
use httptun_core::constants::{MAX_PAYLOAD_LENGTH, TURNAROUND_TIMEOUT};
use httptun_core::session::{Downstream, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A transact call failed in a way that requires tearing the session down
/// (spec.md §4.3 steps 2, 5).
#[derive(Debug)]
pub struct TransactFailed(pub std::io::Error);

/// Copy `body` to the session's downstream connection, then read whatever
/// the downstream produces within one turnaround window.
///
/// A turnaround timeout is not a failure: it means nothing was ready this
/// round, and the caller should respond 200 with an empty body.
pub async fn transact<D: Downstream>(
    session: &Session<D>,
    body: &[u8],
) -> Result<Bytes, TransactFailed> {
    debug_assert!(body.len() <= MAX_PAYLOAD_LENGTH + 1);

    let mut downstream = session.downstream().await;

    downstream.write_all(body).await.map_err(TransactFailed)?;

    let mut buf = vec![0u8; MAX_PAYLOAD_LENGTH];
    match tokio::time::timeout(TURNAROUND_TIMEOUT, downstream.read(&mut buf)).await {
        // Turnaround expired: nothing ready this round, not an error.
        Err(_elapsed) => Ok(Bytes::new()),
        // A read error is a teardown condition.
        Ok(Err(e)) => Err(TransactFailed(e)),
        // A zero-length read is downstream EOF, not "nothing ready this
        // round": the connection is closed and must be torn down, the same
        // as any other read error (spec.md §3, §7).
        Ok(Ok(0)) => Err(TransactFailed(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "downstream closed",
        ))),
        Ok(Ok(n)) => {
            buf.truncate(n);
            Ok(Bytes::from(buf))
        }
    }
}

/// Exposed for tests and documentation: the turnaround budget transact uses.
pub fn turnaround_timeout() -> Duration {
    TURNAROUND_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptun_core::session::SessionTable;
    use tokio::io::DuplexStream;

    async fn session_over_pair() -> (std::sync::Arc<Session<DuplexStream>>, DuplexStream) {
        let (table, session, b) = session_over_pair_with_table().await;
        let _ = table;
        (session, b)
    }

    async fn session_over_pair_with_table() -> (
        SessionTable<DuplexStream>,
        std::sync::Arc<Session<DuplexStream>>,
        DuplexStream,
    ) {
        let (a, b) = tokio::io::duplex(4096);
        let table: SessionTable<DuplexStream> = SessionTable::new();
        let session = table
            .get_or_create("AAAAAAAA", || async { Ok::<_, std::io::Error>(a) })
            .await
            .unwrap();
        (table, session, b)
    }

    #[tokio::test]
    async fn echoes_body_written_by_the_peer() {
        let (session, mut peer) = session_over_pair().await;

        let peer_task = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            peer.read_exact(&mut buf).await.unwrap();
            peer.write_all(&buf).await.unwrap();
        });

        let reply = transact(&session, b"ping").await.unwrap();
        peer_task.await.unwrap();
        assert_eq!(&reply[..], b"ping");
    }

    #[tokio::test]
    async fn empty_response_when_downstream_has_nothing_ready() {
        let (session, mut peer) = session_over_pair().await;

        let peer_task = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            peer.read_exact(&mut buf).await.unwrap();
            // Deliberately never reply within the turnaround window.
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let reply = transact(&session, b"ping").await.unwrap();
        assert!(reply.is_empty());
        peer_task.await.unwrap();
    }

    #[tokio::test]
    async fn closed_peer_is_a_teardown_condition() {
        let (table, session, peer) = session_over_pair_with_table().await;
        drop(peer);

        // First write may still succeed depending on buffering, but the
        // subsequent read observes downstream EOF, which transact now
        // reports as a failure so the caller tears the session down.
        let result = transact(&session, b"ping").await;
        assert!(result.is_err());

        table.remove("AAAAAAAA").await;
        assert_eq!(table.len().await, 0);
    }
}
