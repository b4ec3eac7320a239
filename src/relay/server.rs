//! # Call-Audio Listener
//!
//! Accepts raw TCP connections, performs the WebSocket upgrade itself, and
//! routes `/call/{token}` into a call session. Any other path is rejected
//! with 404 during the handshake; this listener speaks nothing but the call
//! protocol.

use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info};

use crate::relay::session::{handle_call, RelayContext};

/// Accept call connections until the shutdown token fires.
///
/// Each accepted connection gets its own task; a failed accept is logged and
/// the loop keeps serving.
pub async fn serve(listener: TcpListener, ctx: RelayContext) -> Result<()> {
    info!(addr = %listener.local_addr()?, "Call-audio relay listening");

    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                info!("Call-audio relay shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer, ctx).await;
                    });
                }
                Err(error) => {
                    error!(%error, "Failed to accept call connection");
                }
            }
        }
    }

    Ok(())
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: RelayContext) {
    let mut token = None;

    let callback = |request: &Request, response: Response| {
        match parse_call_path(request.uri().path()) {
            Some(t) => {
                token = Some(t.to_string());
                Ok(response)
            }
            None => {
                let mut rejection = ErrorResponse::new(Some("no such endpoint".to_string()));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let socket = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(socket) => socket,
        Err(error) => {
            debug!(%peer, %error, "Call handshake rejected");
            return;
        }
    };

    let Some(token) = token else {
        return;
    };

    info!(%peer, %token, "Call connected");
    handle_call(socket, token, ctx).await;
}

/// Extract the call token from a request path of the form `/call/{token}`.
fn parse_call_path(path: &str) -> Option<&str> {
    let token = path.strip_prefix("/call/")?;
    if token.is_empty() || token.contains('/') {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::relay::PayloadCache;
    use crate::state::AppState;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn parses_well_formed_call_paths() {
        assert_eq!(
            parse_call_path("/call/b662ae75a725411c8da0943cdb279bad"),
            Some("b662ae75a725411c8da0943cdb279bad")
        );
        assert_eq!(parse_call_path("/call/abc"), Some("abc"));
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(parse_call_path("/call/"), None);
        assert_eq!(parse_call_path("/call"), None);
        assert_eq!(parse_call_path("/health"), None);
        assert_eq!(parse_call_path("/call/a/b"), None);
        assert_eq!(parse_call_path(""), None);
    }

    #[tokio::test]
    async fn handshake_fails_for_unknown_paths() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let ctx = RelayContext {
            received_dir: dir.path().to_path_buf(),
            payload: PayloadCache::new(dir.path().join("payload.bin")),
            stream_interval: Duration::from_secs(5),
            state: AppState::new(AppConfig::default()),
            shutdown: CancellationToken::new(),
        };
        tokio::spawn(serve(listener, ctx));

        let result = connect_async(format!("ws://{}/transcribe", addr)).await;
        assert!(result.is_err());
    }
}
