//! The HTTP handler (spec.md §4.1): a single dispatcher by method, mirroring
//! the teacher's `State<Arc<AppState>>` extractor style
//! (`turn-server/src/api/controller.rs`) but collapsed into one fallback
//! route so that "any other method" can uniformly answer 400 regardless of
//! path, rather than relying on axum's per-route 405 handling.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use httptun_core::constants::{MAX_PAYLOAD_LENGTH, OCTET_STREAM, SESSION_ID_HEADER};
use httptun_core::scrub::scrub;
use httptun_core::session::SessionTable;
use httptun_core::session_id;
use tokio::net::TcpStream;

use crate::config::Config;
use crate::downstream;
use crate::transact::transact;

pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionTable<TcpStream>>,
}

/// Single entry point for every request on the listener; dispatches by
/// method per spec.md §4.1.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match method {
        Method::GET if uri.path() == "/" => cover_page(&state).into_response(),
        Method::GET => StatusCode::NOT_FOUND.into_response(),
        Method::POST => handle_post(state, peer, headers, body).await,
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// GET "/": redirect, mask file, or a short plain-text default.
fn cover_page(state: &AppState) -> Response {
    if let Some(redirect) = &state.config.cover.redirect {
        return Redirect::permanent(redirect).into_response();
    }

    if let Some(path) = &state.config.cover.mask {
        match std::fs::read_to_string(path) {
            Ok(html) => {
                return (
                    StatusCode::OK,
                    [("content-type", "text/html; charset=utf-8")],
                    html,
                )
                    .into_response();
            }
            Err(e) => {
                log::warn!("failed to read mask file {path:?}: {e}, falling back to default cover");
            }
        }
    }

    (StatusCode::OK, "This is an httptun relay.\n").into_response()
}

async fn handle_post(
    state: Arc<AppState>,
    peer: SocketAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(session_id) = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if !session_id::is_valid(session_id) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    if body.len() > MAX_PAYLOAD_LENGTH {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let client_pair = downstream::synthetic_client_pair(&headers, Some(peer));
    log::trace!("session {session_id} synthetic client pair: {client_pair}");

    let target = state.config.downstream.clone();
    let session = match state
        .sessions
        .get_or_create(session_id, || async { downstream::dial(&target).await })
        .await
    {
        Ok(session) => session,
        Err(e) => {
            log::warn!("downstream dial failed for {}: {}", scrub(peer), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match transact(&session, &body).await {
        Ok(reply) => (
            StatusCode::OK,
            [("content-type", OCTET_STREAM)],
            reply.to_vec(),
        )
            .into_response(),
        Err(failed) => {
            log::warn!(
                "transact failed for session {session_id}, tearing down: {}",
                failed.0
            );
            state.sessions.remove(session_id).await;
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cover, DownstreamTarget, TlsMode};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::any;
    use axum::Router;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::new(Config {
                port: 8080,
                tls: TlsMode::Disabled,
                log_path: None,
                log_level: log::LevelFilter::Info,
                cover: Cover::default(),
                downstream: DownstreamTarget::BuiltinSocks(1080),
            }),
            sessions: Arc::new(SessionTable::new()),
        })
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new().fallback(any(dispatch)).with_state(state)
    }

    #[tokio::test]
    async fn get_root_with_no_mask_or_redirect_is_plain_text_200() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_other_path_is_404() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/nope")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_is_400() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_with_short_session_id_is_400() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(SESSION_ID_HEADER, "short")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_with_missing_session_id_is_400() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_with_oversize_body_is_rejected() {
        let response = app(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header(SESSION_ID_HEADER, "AAAAAAAA")
                    .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 1234))))
                    .body(Body::from(vec![0u8; MAX_PAYLOAD_LENGTH + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
