//! Request builder (spec.md §4.7) and round-trippers (spec.md §4.8).
//!
//! The native path uses `reqwest` with the same feature set the teacher's
//! `drivers/Cargo.toml` pulls in (`rustls-tls`, `http2`, `gzip`). The
//! helper and uTLS paths are documented stubs: their *selection* is fully
//! implemented (spec.md §4.8's precedence rule), their network step is not,
//! since a browser-extension helper process and a uTLS fingerprint engine
//! are both out of scope per spec.md §1.

use bytes::Bytes;
use httptun_core::constants::{MAX_PAYLOAD_LENGTH, OCTET_STREAM, SESSION_ID_HEADER};
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

use crate::config::RoundTripperKind;
use crate::error::Error;

/// One POST's worth of request parameters (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: Url,
    pub host_override: Option<String>,
    pub session_id: String,
    pub body: Bytes,
}

/// The outcome of one completed HTTP round trip (a transport-level error
/// is represented separately, by `Err(Error)`, since it must never retry).
#[derive(Debug)]
pub struct RoundTripOutcome {
    pub status: u16,
    pub body: Bytes,
}

pub enum RoundTripper {
    Native(reqwest::Client),
    Helper(String),
    Utls { client_hello: String, proxy: Option<String> },
}

impl RoundTripper {
    pub fn new(kind: &RoundTripperKind, client: reqwest::Client) -> Self {
        match kind {
            RoundTripperKind::Native => Self::Native(client),
            RoundTripperKind::Helper(addr) => Self::Helper(addr.clone()),
            RoundTripperKind::Utls { client_hello, proxy } => Self::Utls {
                client_hello: client_hello.clone(),
                proxy: proxy.clone(),
            },
        }
    }

    pub async fn round_trip(&self, req: &RequestSpec) -> Result<RoundTripOutcome, Error> {
        match self {
            Self::Native(client) => native_round_trip(client, req).await,
            Self::Helper(addr) => Err(httptun_core::Error::Unimplemented(
                "helper round-tripper network step is not implemented in this build",
            )
            .into())
            .map_err(|e: Error| {
                log::debug!("helper round-tripper ({addr}) invoked but unimplemented");
                e
            }),
            Self::Utls { client_hello, .. } => Err(httptun_core::Error::Unimplemented(
                "uTLS round-tripper network step is not implemented in this build",
            )
            .into())
            .map_err(|e: Error| {
                log::debug!("uTLS round-tripper (hello={client_hello}) invoked but unimplemented");
                e
            }),
        }
    }
}

async fn native_round_trip(client: &reqwest::Client, req: &RequestSpec) -> Result<RoundTripOutcome, Error> {
    let mut builder = client
        .post(req.url.clone())
        .header(SESSION_ID_HEADER, &req.session_id)
        .header(reqwest::header::CONTENT_TYPE, OCTET_STREAM);

    // A zero-length body is sent with no body at all, not an empty one:
    // some HTTP/2 backends omit Content-Length for an empty reader and
    // respond 411. A non-empty body always carries an explicit length.
    if !req.body.is_empty() {
        builder = builder.body(req.body.clone());
    }

    if let Some(host) = &req.host_override {
        let value = HeaderValue::from_str(host).map_err(|_| Error::BadStatus(0))?;
        builder = builder.header(HeaderName::from_static("host"), value);
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let mut body = response.bytes().await?;
    if body.len() > MAX_PAYLOAD_LENGTH {
        body = body.slice(..MAX_PAYLOAD_LENGTH);
    }

    Ok(RoundTripOutcome { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn helper_round_tripper_is_a_documented_stub() {
        let rt = RoundTripper::Helper("127.0.0.1:9000".to_string());
        let req = RequestSpec {
            url: Url::parse("https://example.org/").unwrap(),
            host_override: None,
            session_id: "AAAAAAAA".to_string(),
            body: Bytes::new(),
        };
        assert!(rt.round_trip(&req).await.is_err());
    }

    #[tokio::test]
    async fn utls_round_tripper_is_a_documented_stub() {
        let rt = RoundTripper::Utls {
            client_hello: "chrome_120".to_string(),
            proxy: None,
        };
        let req = RequestSpec {
            url: Url::parse("https://example.org/").unwrap(),
            host_override: None,
            session_id: "AAAAAAAA".to_string(),
            body: Bytes::new(),
        };
        assert!(rt.round_trip(&req).await.is_err());
    }
}
