//! Core server: accepts connections and drives each one through the relay.
//!
//! Owns the shared [`SessionRegistry`]. Every configured port gets its own
//! WebSocket listener, and all of them feed connections into the same
//! registry, so a game server on one port can relay to players on another.
//!
//! A relay connection starts unassigned. Its first `join` or `server`
//! message fixes its role for the rest of its life; `client` and `update`
//! messages are only honoured from the matching role, and `client` only
//! while the connection is still its session's bound server.

use crate::config::ServerConfig;
use crate::games::Collaborators;
use crate::relay::{GameSession, LifecycleEvent, Peer, SessionRegistry};
use crate::transport::websocket::{self, Route, WebSocketConnection, WsStream};
use gamehub_core::{decode_inbound, encode, ConnectionId, Inbound, RelayError, RelayResult};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Role a relay connection has declared.
enum Role {
    Unassigned,
    Player(Arc<GameSession>),
    Server(Arc<GameSession>),
}

/// The gamehub server instance.
pub struct GameHubServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    /// Broadcast sender for server shutdown notification.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameHubServer {
    /// Create a server with the default collaborators for `config`.
    pub fn new(config: ServerConfig) -> RelayResult<Self> {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(config, collaborators)
    }

    pub fn with_collaborators(
        config: ServerConfig,
        collaborators: Collaborators,
    ) -> RelayResult<Self> {
        config
            .bind
            .parse::<IpAddr>()
            .map_err(|e| RelayError::Config(format!("invalid bind address {}: {e}", config.bind)))?;

        let registry = Arc::new(SessionRegistry::new(
            collaborators,
            config.build_output_dir.clone(),
        ));

        Ok(Self {
            config,
            registry,
            shutdown_tx: broadcast::channel(1).0,
        })
    }

    /// Access the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Bind every configured port and start accepting connections.
    ///
    /// Returns the bound addresses once all listeners are up.
    pub async fn listen(self: &Arc<Self>) -> RelayResult<Vec<SocketAddr>> {
        let ip: IpAddr = self
            .config
            .bind
            .parse()
            .map_err(|e| RelayError::Config(format!("invalid bind address: {e}")))?;

        let mut addrs = Vec::with_capacity(self.config.ports.len());
        for &port in &self.config.ports {
            let (addr, mut conn_rx) =
                websocket::start_listener(SocketAddr::new(ip, port), self.config.max_frame_size)
                    .await?;
            addrs.push(addr);

            let server = self.clone();
            tokio::spawn(async move {
                while let Some(conn) = conn_rx.recv().await {
                    let srv = server.clone();
                    tokio::spawn(async move {
                        if let Err(e) = srv.handle_connection(conn).await {
                            warn!(error = %e, "WebSocket connection error");
                        }
                    });
                }
            });
        }

        self.spawn_lifecycle_log();

        info!(addrs = ?addrs, "gamehub-server ready");
        Ok(addrs)
    }

    /// Tell every open connection to close.
    pub fn shutdown(&self) {
        info!("broadcasting shutdown to connected clients");
        let _ = self.shutdown_tx.send(());
    }

    fn spawn_lifecycle_log(&self) {
        let mut events = self.registry.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(LifecycleEvent::GameStarted { game_id }) => {
                        info!(game_id = %game_id, "gameStarted");
                    }
                    Ok(LifecycleEvent::GameExited { game_id }) => {
                        info!(game_id = %game_id, "gameExited");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "lifecycle log fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn handle_connection(&self, mut conn: WebSocketConnection) -> RelayResult<()> {
        let remote = conn.remote_addr;

        if conn.route == Route::Listing {
            let listing = self.registry.list().await;
            let text = encode(&listing)?;
            websocket::ws_send_text(&mut conn.ws_stream, &text).await?;
            websocket::ws_close(&mut conn.ws_stream, "listing sent").await;
            debug!(remote = %remote, games = listing.len(), "sent game listing");
            return Ok(());
        }

        let id = self.registry.next_identity();
        let (tx, rx) = mpsc::channel::<Value>(self.config.outbound_queue);
        let peer = Peer::new(id, tx);
        let mut role = Role::Unassigned;
        info!(remote = %remote, conn_id = %id, "relay connection accepted");

        let result = self
            .connection_loop(&mut conn.ws_stream, &peer, &mut role, rx)
            .await;

        self.release(id, &role).await;
        debug!(conn_id = %id, "relay connection closed");
        result
    }

    /// Message loop for one relay connection. Inbound frames are dispatched
    /// in arrival order; queued outbound messages are written in queue order.
    /// Shutdown and close requests take priority over both.
    async fn connection_loop(
        &self,
        ws: &mut WsStream,
        peer: &Peer,
        role: &mut Role,
        mut rx: mpsc::Receiver<Value>,
    ) -> RelayResult<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut close_rx = peer.close_signal();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    debug!(conn_id = %peer.id(), "shutdown signal received, closing connection");
                    websocket::ws_close(ws, "server shutdown").await;
                    break;
                }

                Ok(()) = close_rx.changed() => {
                    let reason = close_rx.borrow_and_update().clone().unwrap_or_default();
                    debug!(conn_id = %peer.id(), reason = %reason, "closing connection");
                    websocket::ws_close(ws, &reason).await;
                    break;
                }

                Some(value) = rx.recv() => {
                    let text = encode(&value)?;
                    websocket::ws_send_text(ws, &text).await?;
                }

                frame = websocket::ws_recv_text(ws) => {
                    match frame {
                        Ok(Some(text)) => self.dispatch(&text, peer, role).await,
                        Ok(None) => {
                            debug!(conn_id = %peer.id(), "peer closed connection");
                            break;
                        }
                        Err(e) => {
                            debug!(conn_id = %peer.id(), error = %e, "connection ended");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply one inbound frame.
    async fn dispatch(&self, text: &str, peer: &Peer, role: &mut Role) {
        let message = match decode_inbound(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(conn_id = %peer.id(), error = %e, "dropping inbound frame");
                return;
            }
        };

        match message {
            Inbound::Join(p) => {
                if !matches!(role, Role::Unassigned) {
                    warn!(conn_id = %peer.id(), "role already assigned, ignoring join");
                    return;
                }
                if let Ok(session) = self.registry.add_player(peer.clone(), &p.game_id).await {
                    *role = Role::Player(session);
                }
            }
            Inbound::Server(p) => {
                if !matches!(role, Role::Unassigned) {
                    warn!(conn_id = %peer.id(), "role already assigned, ignoring server");
                    return;
                }
                if let Ok(session) = self.registry.assign_server_role(&p, peer.clone()).await {
                    *role = Role::Server(session);
                }
            }
            Inbound::Client(p) => match role {
                Role::Server(session) => {
                    let _ = session.send_to_player(peer.id(), p.id, p.data).await;
                }
                _ => warn!(conn_id = %peer.id(), "client message from a non-server connection"),
            },
            Inbound::Update(data) => match role {
                Role::Player(session) => {
                    session.forward_update(peer.id(), data).await;
                }
                _ => warn!(conn_id = %peer.id(), "update from a non-player connection"),
            },
        }
    }

    /// Unbind a closed connection from its session.
    async fn release(&self, id: ConnectionId, role: &Role) {
        match role {
            Role::Player(session) => {
                session.remove_player(id).await;
            }
            Role::Server(session) => {
                session.server_disconnected(id).await;
            }
            Role::Unassigned => {}
        }
    }
}
