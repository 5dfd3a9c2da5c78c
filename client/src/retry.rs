//! sendRecv's retry policy (spec.md §4.6).

use bytes::Bytes;
use httptun_core::constants::{MAX_ROUND_TRIP_RETRIES, ROUND_TRIP_RETRY_DELAY};

use crate::error::Error;
use crate::roundtripper::{RequestSpec, RoundTripper};

/// Submit `req` through `rt`, retrying non-200 completions up to
/// `MAX_ROUND_TRIP_RETRIES` times with a fixed delay between attempts. A
/// transport-level error (the round trip never completed) returns
/// immediately with no retry, to avoid duplicating body bytes on a
/// connection whose state is unknown.
pub async fn send_with_retry(rt: &RoundTripper, req: &RequestSpec) -> Result<Bytes, Error> {
    let mut last_status = 0u16;

    for attempt in 0..MAX_ROUND_TRIP_RETRIES {
        let outcome = rt.round_trip(req).await?;
        if outcome.status == 200 {
            return Ok(outcome.body);
        }

        last_status = outcome.status;
        log::debug!(
            "round trip {} returned status {}, attempt {}/{}",
            req.session_id,
            outcome.status,
            attempt + 1,
            MAX_ROUND_TRIP_RETRIES
        );

        if attempt + 1 < MAX_ROUND_TRIP_RETRIES {
            tokio::time::sleep(ROUND_TRIP_RETRY_DELAY).await;
        }
    }

    Err(Error::BadStatus(last_status))
}
