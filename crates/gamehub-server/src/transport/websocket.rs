//! WebSocket listener using tokio-tungstenite.
//!
//! Every accepted socket is tagged with a [`Route`] taken from the upgrade
//! request path: `/games` asks for the running-games listing, any other path
//! is a relay connection.

use futures_util::{SinkExt, StreamExt};
use gamehub_core::{RelayError, RelayResult};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Request path that selects the listing route.
pub const LISTING_PATH: &str = "/games";

pub type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// What an accepted connection is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Relay,
    Listing,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        if path.trim_end_matches('/') == LISTING_PATH {
            Route::Listing
        } else {
            Route::Relay
        }
    }
}

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: WsStream,
    pub remote_addr: SocketAddr,
    pub route: Route,
}

/// Protocol limits for accepted sockets. Messages and frames above
/// `max_message_size` bytes fail the read before they are buffered whole.
pub fn ws_config(max_message_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_size);
    config.max_frame_size = Some(max_message_size);
    config
}

/// Start a WebSocket listener.
///
/// Returns the bound address (useful with port 0) and a receiver that yields
/// accepted connections.
pub async fn start_listener(
    bind_addr: SocketAddr,
    max_message_size: usize,
) -> RelayResult<(SocketAddr, mpsc::Receiver<WebSocketConnection>)> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| RelayError::Transport(format!("WS bind {bind_addr} failed: {e}")))?;
    let local_addr = tcp_listener
        .local_addr()
        .map_err(|e| RelayError::Transport(format!("WS local addr: {e}")))?;

    info!(addr = %local_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);
    let config = ws_config(max_message_size);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let mut path = String::from("/");
                        let callback = |req: &Request,
                                        resp: Response|
                         -> Result<Response, ErrorResponse> {
                            path = req.uri().path().to_string();
                            Ok(resp)
                        };
                        let accepted = tokio_tungstenite::accept_hdr_async_with_config(
                            stream,
                            callback,
                            Some(config),
                        )
                        .await;
                        match accepted {
                            Ok(ws_stream) => {
                                let route = Route::from_path(&path);
                                debug!(remote = %addr, path = %path, ?route, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                    route,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    Ok((local_addr, rx))
}

/// Send a text frame.
pub async fn ws_send_text(ws: &mut WsStream, text: &str) -> RelayResult<()> {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .map_err(|e| RelayError::Transport(format!("WS send failed: {e}")))
}

/// Send a normal close frame carrying `reason`. Errors are ignored; the
/// peer may already be gone.
pub async fn ws_close(ws: &mut WsStream, reason: &str) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: reason.to_string().into(),
    };
    let _ = ws.close(Some(frame)).await;
}

/// Receive the next text frame.
///
/// Returns `None` once the connection is closed. Binary frames are accepted
/// if they hold UTF-8.
pub async fn ws_recv_text(ws: &mut WsStream) -> RelayResult<Option<String>> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
            Some(Ok(Message::Binary(data))) => {
                return String::from_utf8(data.to_vec())
                    .map(Some)
                    .map_err(|_| RelayError::InvalidMessage("binary frame is not UTF-8".into()));
            }
            Some(Ok(Message::Close(_))) => return Ok(None),
            Some(Ok(Message::Ping(payload))) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(RelayError::Transport(format!("WS recv failed: {e}")));
            }
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_path_routes_to_listing() {
        assert_eq!(Route::from_path("/games"), Route::Listing);
        assert_eq!(Route::from_path("/games/"), Route::Listing);
        assert_eq!(Route::from_path("/"), Route::Relay);
        assert_eq!(Route::from_path("/games/pong"), Route::Relay);
    }

    #[test]
    fn config_caps_messages_and_frames() {
        let config = ws_config(1024);
        assert_eq!(config.max_message_size, Some(1024));
        assert_eq!(config.max_frame_size, Some(1024));
    }
}
