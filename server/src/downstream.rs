//! Dialing a session's downstream connection (spec.md §4.2) and extracting
//! the synthetic client-address pair that would be handed to an Extended
//! ORPort-style downstream, were one in play.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use tokio::net::TcpStream;

use crate::config::DownstreamTarget;

/// Open a fresh TCP connection to the configured downstream target.
pub async fn dial(target: &DownstreamTarget) -> std::io::Result<TcpStream> {
    TcpStream::connect(target.addr()).await
}

/// The synthetic "host:1" pair spec.md §4.2 describes forwarding to the
/// downstream when the real client address is discoverable (e.g. behind a
/// domain-fronting CDN that sets `X-Forwarded-For`), falling back to the
/// TCP peer address, and finally to an empty string.
///
/// Actually transmitting this to the downstream requires a side-channel
/// handshake (the Extended ORPort protocol) that is out of scope per
/// spec.md §1 — see DESIGN.md. This function only performs the discovery
/// half, which is cheap and independently testable.
pub fn synthetic_client_pair(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return format!("{forwarded}:1");
    }

    match peer {
        Some(addr) => format!("{}:1", addr.ip()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_x_forwarded_for_when_present() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        let pair = synthetic_client_pair(&headers, Some("127.0.0.1:443".parse().unwrap()));
        assert_eq!(pair, "203.0.113.9:1");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        let pair = synthetic_client_pair(&headers, Some("198.51.100.2:443".parse().unwrap()));
        assert_eq!(pair, "198.51.100.2:1");
    }

    #[test]
    fn falls_back_to_empty_string_when_nothing_is_discoverable() {
        let headers = HeaderMap::new();
        assert_eq!(synthetic_client_pair(&headers, None), "");
    }
}
