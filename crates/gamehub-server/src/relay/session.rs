//! Game session: the relay unit for one game id.
//!
//! A session binds at most one server-role connection (the game process)
//! and any number of player-role connections keyed by [`ConnectionId`].
//! All state sits behind one mutex, so joins, disconnects, server
//! reassignment and relays touching the same session are serialized.
//!
//! Relay rules:
//! - `client{id, data}` from the bound server goes to player `id` verbatim;
//!   from any other connection it is dropped.
//! - `update` from player `X` goes to the server as `{cmd:update, id:X, data}`.
//! - a player disconnect sends `{cmd:remove, id:X}` to the server.
//! - a server disconnect clears the binding; players stay bound.

use super::peer::Peer;
use gamehub_core::messages::{GameNotice, ServerPayload};
use gamehub_core::{ConnectionId, RelayError, RelayResult};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Auxiliary attributes a game server declares for its session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAttributes {
    pub base_url: Option<String>,
    pub controller_url: Option<String>,
    /// Whether the session appears in the running-games listing.
    pub show_in_list: bool,
}

impl Default for SessionAttributes {
    fn default() -> Self {
        Self {
            base_url: None,
            controller_url: None,
            show_in_list: true,
        }
    }
}

impl From<&ServerPayload> for SessionAttributes {
    fn from(p: &ServerPayload) -> Self {
        Self {
            base_url: p.base_url.clone(),
            controller_url: p.controller_url.clone(),
            show_in_list: p.show_in_list.unwrap_or(true),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    server: Option<Peer>,
    players: BTreeMap<ConnectionId, Peer>,
    attributes: SessionAttributes,
    /// Set once the registry drops this session; every later call is a no-op.
    closed: bool,
}

/// Relay state for a single game id.
#[derive(Debug)]
pub struct GameSession {
    game_id: String,
    state: Mutex<SessionState>,
}

impl GameSession {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Bind `peer` as the server-role connection.
    ///
    /// An already-bound server is replaced and told to close. Returns the id
    /// of the replaced connection, if any, or `GameNotFound` once the session
    /// has been removed.
    pub async fn assign_server(
        &self,
        peer: Peer,
        attributes: SessionAttributes,
    ) -> RelayResult<Option<ConnectionId>> {
        let mut state = self.state.lock().await;
        if state.closed {
            debug!(game_id = %self.game_id, conn_id = %peer.id(), "session removed, ignoring server");
            return Err(RelayError::GameNotFound(self.game_id.clone()));
        }

        let new_id = peer.id();
        state.attributes = attributes;
        let previous = state.server.replace(peer);
        info!(game_id = %self.game_id, conn_id = %new_id, "game server assigned");

        match previous {
            Some(prev) if prev.id() != new_id => {
                warn!(
                    game_id = %self.game_id,
                    previous = %prev.id(),
                    replacement = %new_id,
                    "replacing bound game server"
                );
                prev.close("replaced by a newer game server");
                Ok(Some(prev.id()))
            }
            _ => Ok(None),
        }
    }

    /// Bind `peer` as a player keyed by its connection id.
    ///
    /// Fails with `GameNotFound` once the session has been removed and with
    /// `AlreadyBound` if the id is already a player.
    pub async fn add_player(&self, peer: Peer) -> RelayResult<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            debug!(game_id = %self.game_id, conn_id = %peer.id(), "session removed, ignoring join");
            return Err(RelayError::GameNotFound(self.game_id.clone()));
        }
        let id = peer.id();
        if state.players.contains_key(&id) {
            warn!(game_id = %self.game_id, conn_id = %id, "player already bound");
            return Err(RelayError::AlreadyBound(id.get()));
        }
        state.players.insert(id, peer);
        info!(game_id = %self.game_id, conn_id = %id, players = state.players.len(), "player joined");
        Ok(())
    }

    /// Forward `data` from server `from` to the player bound to `target`.
    ///
    /// Only the currently bound server may relay; a replaced server's
    /// messages are dropped.
    pub async fn send_to_player(
        &self,
        from: ConnectionId,
        target: ConnectionId,
        data: Value,
    ) -> RelayResult<()> {
        let state = self.state.lock().await;
        if state.server.as_ref().map(Peer::id) != Some(from) {
            warn!(game_id = %self.game_id, conn_id = %from, "not the bound game server, dropping client message");
            return Err(RelayError::NotGameServer(from.get()));
        }
        match state.players.get(&target) {
            Some(player) => {
                player.send(data);
                Ok(())
            }
            None => {
                debug!(game_id = %self.game_id, target = %target, "no such player, dropping client message");
                Err(RelayError::UnknownTarget(target.get()))
            }
        }
    }

    /// Forward an update from player `from` to the server.
    ///
    /// Returns `false` if no server is bound and the update was dropped.
    pub async fn forward_update(&self, from: ConnectionId, data: Value) -> bool {
        let state = self.state.lock().await;
        match &state.server {
            Some(server) => notify(server, GameNotice::Update { id: from, data }),
            None => {
                debug!(game_id = %self.game_id, conn_id = %from, "no game server, dropping update");
                false
            }
        }
    }

    /// Unbind player `id` and tell the server. Repeated calls are no-ops.
    pub async fn remove_player(&self, id: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        if state.players.remove(&id).is_none() {
            return false;
        }
        info!(game_id = %self.game_id, conn_id = %id, players = state.players.len(), "player left");
        if let Some(server) = &state.server {
            notify(server, GameNotice::Remove { id });
        }
        true
    }

    /// Clear the server binding if it still belongs to `id`.
    pub async fn server_disconnected(&self, id: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        match &state.server {
            Some(server) if server.id() == id => {
                state.server = None;
                info!(game_id = %self.game_id, conn_id = %id, "game server disconnected");
                true
            }
            _ => false,
        }
    }

    pub async fn num_players(&self) -> usize {
        self.state.lock().await.players.len()
    }

    /// True iff a server-role connection is bound.
    pub async fn has_server(&self) -> bool {
        self.state.lock().await.server.is_some()
    }

    pub async fn attributes(&self) -> SessionAttributes {
        self.state.lock().await.attributes.clone()
    }

    /// Ids of the bound players, ascending.
    pub async fn player_ids(&self) -> Vec<ConnectionId> {
        self.state.lock().await.players.keys().copied().collect()
    }

    /// Close every bound connection, drop the bindings and turn every later
    /// call into a no-op.
    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        if let Some(server) = state.server.take() {
            server.close("game removed");
        }
        for (_, player) in std::mem::take(&mut state.players) {
            player.close("game removed");
        }
    }
}

fn notify(server: &Peer, notice: GameNotice) -> bool {
    match serde_json::to_value(&notice) {
        Ok(value) => server.send(value),
        Err(e) => {
            warn!(error = %e, "failed to encode game notice");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn peer(id: u64) -> (Peer, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(16);
        (Peer::new(ConnectionId(id), tx), rx)
    }

    fn message(rx: &mut mpsc::Receiver<Value>) -> Value {
        match rx.try_recv() {
            Ok(v) => v,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_message_reaches_only_target() {
        let session = GameSession::new("pong");
        let (server, _srx) = peer(2);
        let (p7, mut rx7) = peer(7);
        let (p8, mut rx8) = peer(8);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();
        session.add_player(p8).await.unwrap();

        session
            .send_to_player(ConnectionId(2), ConnectionId(7), json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(message(&mut rx7), json!({"x": 1}));
        assert!(rx8.try_recv().is_err());
    }

    #[tokio::test]
    async fn client_message_to_unknown_player_is_dropped() {
        let session = GameSession::new("pong");
        let (server, _srx) = peer(2);
        let (p7, mut rx7) = peer(7);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        let err = session
            .send_to_player(ConnectionId(2), ConnectionId(9), json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownTarget(9)));
        assert!(rx7.try_recv().is_err());
    }

    #[tokio::test]
    async fn client_message_from_unbound_connection_is_dropped() {
        let session = GameSession::new("pong");
        let (p7, mut rx7) = peer(7);
        session.add_player(p7).await.unwrap();

        let err = session
            .send_to_player(ConnectionId(3), ConnectionId(7), json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotGameServer(3)));
        assert!(rx7.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_is_wrapped_with_sender_id() {
        let session = GameSession::new("pong");
        let (server, mut srx) = peer(2);
        let (p7, _rx7) = peer(7);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        assert!(session.forward_update(ConnectionId(7), json!({"score": 5})).await);
        assert_eq!(
            message(&mut srx),
            json!({"cmd": "update", "id": 7, "data": {"score": 5}})
        );
    }

    #[tokio::test]
    async fn update_without_server_is_dropped() {
        let session = GameSession::new("pong");
        let (p7, _rx7) = peer(7);
        session.add_player(p7).await.unwrap();
        assert!(!session.forward_update(ConnectionId(7), json!(1)).await);
    }

    #[tokio::test]
    async fn updates_keep_sender_order() {
        let session = GameSession::new("pong");
        let (server, mut srx) = peer(2);
        let (p7, _rx7) = peer(7);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        for n in 0..5 {
            session.forward_update(ConnectionId(7), json!(n)).await;
        }
        for n in 0..5 {
            assert_eq!(message(&mut srx)["data"], json!(n));
        }
    }

    #[tokio::test]
    async fn player_disconnect_notifies_server_once() {
        let session = GameSession::new("pong");
        let (server, mut srx) = peer(2);
        let (p7, _rx7) = peer(7);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        assert!(session.remove_player(ConnectionId(7)).await);
        assert!(!session.remove_player(ConnectionId(7)).await);

        assert_eq!(message(&mut srx), json!({"cmd": "remove", "id": 7}));
        assert!(srx.try_recv().is_err());
        assert_eq!(session.num_players().await, 0);
    }

    #[tokio::test]
    async fn server_disconnect_keeps_players_bound() {
        let session = GameSession::new("pong");
        let (server, _srx) = peer(2);
        let (p7, _rx7) = peer(7);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        assert!(session.server_disconnected(ConnectionId(2)).await);
        assert!(!session.has_server().await);
        assert_eq!(session.num_players().await, 1);
        assert!(!session.forward_update(ConnectionId(7), json!(1)).await);
    }

    #[tokio::test]
    async fn second_server_replaces_and_closes_first() {
        let session = GameSession::new("pong");
        let (first, _first_rx) = peer(2);
        let first_closed = first.close_signal();
        let (second, mut second_rx) = peer(3);
        let (p7, mut rx7) = peer(7);
        session.assign_server(first, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        let replaced = session
            .assign_server(second, SessionAttributes::default())
            .await
            .unwrap();
        assert_eq!(replaced, Some(ConnectionId(2)));
        assert!(first_closed.has_changed().unwrap());

        // The old server's late close must not unbind its replacement.
        assert!(!session.server_disconnected(ConnectionId(2)).await);
        assert!(session.has_server().await);

        session.forward_update(ConnectionId(7), json!("hi")).await;
        assert_eq!(message(&mut second_rx)["id"], json!(7));

        let stale = session
            .send_to_player(ConnectionId(2), ConnectionId(7), json!("stale"))
            .await;
        assert!(matches!(stale, Err(RelayError::NotGameServer(2))));
        assert!(rx7.try_recv().is_err());
    }

    #[tokio::test]
    async fn duplicate_player_id_is_rejected() {
        let session = GameSession::new("pong");
        let (a, _rxa) = peer(7);
        let (b, _rxb) = peer(7);
        session.add_player(a).await.unwrap();
        assert!(matches!(
            session.add_player(b).await,
            Err(RelayError::AlreadyBound(7))
        ));
        assert_eq!(session.num_players().await, 1);
    }

    #[tokio::test]
    async fn player_ids_are_listed_in_order() {
        let session = GameSession::new("pong");
        for id in [9, 4, 6] {
            let (p, _rx) = peer(id);
            session.add_player(p).await.unwrap();
        }
        assert_eq!(
            session.player_ids().await,
            vec![ConnectionId(4), ConnectionId(6), ConnectionId(9)]
        );
    }

    #[tokio::test]
    async fn closed_session_ignores_everything() {
        let session = GameSession::new("pong");
        let (server, mut srx) = peer(2);
        let (p7, _rx7) = peer(7);
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();
        session.close().await;

        assert!(!session.has_server().await);
        assert_eq!(session.num_players().await, 0);
        assert!(!session.forward_update(ConnectionId(7), json!(1)).await);
        assert!(session
            .send_to_player(ConnectionId(2), ConnectionId(7), json!(1))
            .await
            .is_err());
        let (late, _lrx) = peer(8);
        assert!(matches!(
            session.add_player(late).await,
            Err(RelayError::GameNotFound(_))
        ));
        let (late_server, _lsrx) = peer(9);
        assert!(session
            .assign_server(late_server, SessionAttributes::default())
            .await
            .is_err());
        assert!(srx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_tells_bound_connections_to_close() {
        let session = GameSession::new("pong");
        let (server, _srx) = peer(2);
        let (p7, _rx7) = peer(7);
        let server_closed = server.close_signal();
        let player_closed = p7.close_signal();
        session.assign_server(server, SessionAttributes::default()).await.unwrap();
        session.add_player(p7).await.unwrap();

        session.close().await;

        assert_eq!(server_closed.borrow().as_deref(), Some("game removed"));
        assert_eq!(player_closed.borrow().as_deref(), Some("game removed"));
    }

    #[test]
    fn attributes_default_to_visible() {
        let attrs = SessionAttributes::from(&ServerPayload {
            game_id: "pong".into(),
            controller_url: Some("http://h/c".into()),
            ..Default::default()
        });
        assert!(attrs.show_in_list);
        assert_eq!(attrs.controller_url.as_deref(), Some("http://h/c"));
    }
}
