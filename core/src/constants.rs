//! Normative numeric constants from the protocol section of the spec.
//!
//! These are shared between the client and the server so that the two ends
//! can never silently disagree about a size or a timing budget.

use std::time::Duration;

/// Largest request or response body, in bytes. A request body of
/// `MAX_PAYLOAD_LENGTH + 1` bytes is rejected by the server.
pub const MAX_PAYLOAD_LENGTH: usize = 65_536;

/// Shortest acceptable `X-Session-Id` header value.
pub const MIN_SESSION_ID_LENGTH: usize = 8;

/// Number of random bytes used to mint a new client-side session id
/// (base64-without-padding encoded before being sent on the wire).
pub const SESSION_ID_RANDOM_BYTES: usize = 8;

/// Server-side read deadline on the downstream connection within a single
/// POST's transact call. Expiry means "nothing ready this round", not an
/// error.
pub const TURNAROUND_TIMEOUT: Duration = Duration::from_millis(10);

/// HTTP hop read/write timeout enforced by the server's listener.
pub const HTTP_IO_TIMEOUT: Duration = Duration::from_secs(20);

/// A session whose last-seen time is older than this is eligible for reaping.
pub const SESSION_STALENESS: Duration = Duration::from_secs(120);

/// The expiry sweeper wakes up this often (half the staleness horizon).
pub const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Client poll interval, initial value.
pub const INIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Client poll interval ceiling.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Geometric multiplier applied to the poll interval on a dry round.
pub const POLL_INTERVAL_MULTIPLIER: f64 = 1.5;

/// Maximum number of sendRecv attempts before giving up on a non-200 status.
pub const MAX_ROUND_TRIP_RETRIES: u32 = 10;

/// Delay between retries of a non-200 round trip.
pub const ROUND_TRIP_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Helper round-tripper read timeout.
pub const HELPER_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Helper round-tripper write timeout.
pub const HELPER_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest response the helper round-tripper will accept.
pub const MAX_HELPER_RESPONSE: usize = 10_000_000;

/// Header carrying the session id on every POST.
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

/// Content type used on both the request and response bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_period_is_half_the_staleness_horizon() {
        assert_eq!(SESSION_SWEEP_PERIOD.as_secs() * 2, SESSION_STALENESS.as_secs());
    }
}
