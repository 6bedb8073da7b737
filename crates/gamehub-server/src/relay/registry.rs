//! Session registry: game id to [`GameSession`].
//!
//! One registry is shared by every listener. It creates sessions lazily on
//! the first `join` or `server` naming an unknown id, and destroys them only
//! through [`SessionRegistry::remove`]. It also owns the identity issuer and
//! the lifecycle event channel.

use super::events::{LifecycleEvent, LifecycleEvents};
use super::peer::Peer;
use super::session::{GameSession, SessionAttributes};
use crate::games::Collaborators;
use gamehub_core::messages::ServerPayload;
use gamehub_core::{ConnectionId, GameListing, IdentityIssuer, RelayError, RelayResult};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Hex characters of the directory hash appended to synthesized ids.
const SYNTHETIC_SUFFIX_LEN: usize = 8;

/// Sessions tried per bind; a session removed mid-bind is replaced once.
const BIND_ATTEMPTS: usize = 2;

/// Registry of live game sessions.
pub struct SessionRegistry {
    /// Sessions keyed by game id; ordered so listings are stable.
    sessions: RwLock<BTreeMap<String, Arc<GameSession>>>,
    /// Number of sessions currently registered.
    session_count: AtomicUsize,
    identities: IdentityIssuer,
    events: LifecycleEvents,
    collaborators: Collaborators,
    /// Trailing directory name stripped from `cwd` hints.
    build_output_dir: String,
}

impl SessionRegistry {
    pub fn new(collaborators: Collaborators, build_output_dir: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            session_count: AtomicUsize::new(0),
            identities: IdentityIssuer::new(),
            events: LifecycleEvents::new(),
            collaborators,
            build_output_dir: build_output_dir.into(),
        }
    }

    /// Issue the id for a newly accepted connection.
    pub fn next_identity(&self) -> ConnectionId {
        self.identities.next_identity()
    }

    /// Subscribe to `gameStarted` / `gameExited` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn session_count(&self) -> usize {
        self.session_count.load(Ordering::Relaxed)
    }

    /// Return the session for `game_id`, creating it if needed.
    pub async fn get_or_create(&self, game_id: &str) -> Arc<GameSession> {
        if let Some(session) = self.lookup(game_id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        // Re-check: another connection may have created it between the locks.
        if let Some(session) = sessions.get(game_id) {
            return session.clone();
        }
        let session = Arc::new(GameSession::new(game_id));
        sessions.insert(game_id.to_string(), session.clone());
        let count = self.session_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!(game_id, sessions = count, "game session created");
        session
    }

    /// Look up a session without creating it.
    pub async fn lookup(&self, game_id: &str) -> Option<Arc<GameSession>> {
        self.sessions.read().await.get(game_id).cloned()
    }

    /// List visible sessions that have a game server bound.
    pub async fn list(&self) -> Vec<GameListing> {
        let sessions: Vec<Arc<GameSession>> =
            self.sessions.read().await.values().cloned().collect();
        let host_name = self.collaborators.host.host_name();

        let mut listing = Vec::new();
        for session in sessions {
            if !session.has_server().await {
                continue;
            }
            let attributes = session.attributes().await;
            if !attributes.show_in_list {
                continue;
            }
            listing.push(GameListing {
                game_id: session.game_id().to_string(),
                num_players: session.num_players().await,
                controller_url: attributes.controller_url,
                host_name: host_name.clone(),
                info: self.collaborators.catalog.lookup(session.game_id()),
            });
        }
        listing
    }

    /// Bind `peer` as a player of `game_id`, creating the session if needed.
    pub async fn add_player(&self, peer: Peer, game_id: &str) -> RelayResult<Arc<GameSession>> {
        if game_id.trim().is_empty() {
            warn!(conn_id = %peer.id(), "join without game id");
            return Err(RelayError::MissingGameId);
        }
        let mut attempt = 1;
        loop {
            let session = self.get_or_create(game_id).await;
            match session.add_player(peer.clone()).await {
                Ok(()) => return Ok(session),
                Err(RelayError::GameNotFound(_)) if attempt < BIND_ATTEMPTS => {
                    debug!(game_id, conn_id = %peer.id(), "session removed during join, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Destroy the session for `game_id` and emit `gameExited`.
    ///
    /// Connections still holding the session see every later relay as a no-op.
    pub async fn remove(&self, game_id: &str) -> RelayResult<()> {
        let removed = {
            let mut sessions = self.sessions.write().await;
            if !sessions.contains_key(game_id) {
                warn!(game_id, "remove of unknown game");
                return Err(RelayError::GameNotFound(game_id.to_string()));
            }
            let count = self.session_count.fetch_sub(1, Ordering::Relaxed) - 1;
            self.events.emit(LifecycleEvent::GameExited {
                game_id: game_id.to_string(),
            });
            info!(game_id, sessions = count, "game session removed");
            sessions.remove(game_id)
        };

        if let Some(session) = removed {
            session.close().await;
        }
        Ok(())
    }

    /// Resolve the effective game id for a `server` declaration, emit
    /// `gameStarted`, and bind `peer` as that session's game server.
    pub async fn assign_server_role(
        &self,
        data: &ServerPayload,
        peer: Peer,
    ) -> RelayResult<Arc<GameSession>> {
        let game_id = self.resolve_game_id(data)?;

        self.events.emit(LifecycleEvent::GameStarted {
            game_id: game_id.clone(),
        });

        let mut attempt = 1;
        loop {
            let session = self.get_or_create(&game_id).await;
            match session
                .assign_server(peer.clone(), SessionAttributes::from(data))
                .await
            {
                Ok(_) => return Ok(session),
                Err(RelayError::GameNotFound(_)) if attempt < BIND_ATTEMPTS => {
                    debug!(game_id = %game_id, conn_id = %peer.id(), "session removed during server bind, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Work out which game id a `server` declaration refers to.
    ///
    /// With a `cwd` hint the game directory's descriptor decides; if it has
    /// none, the declared id is suffixed with a hash of the directory so two
    /// copies of one game launched from different places stay apart.
    pub fn resolve_game_id(&self, data: &ServerPayload) -> RelayResult<String> {
        let cwd = data.cwd.as_deref().filter(|c| !c.trim().is_empty());

        let game_id = match cwd {
            None => data.game_id.clone(),
            Some(hint) => {
                let dir = game_dir(hint, &self.build_output_dir);
                match self.collaborators.resolver.resolve(&dir) {
                    Ok(id) => id,
                    Err(e) if data.game_id.trim().is_empty() => {
                        warn!(dir = %dir.display(), error = %e, "server without game id");
                        return Err(RelayError::MissingGameId);
                    }
                    Err(e) => {
                        let id = synthesize_game_id(&data.game_id, &dir);
                        debug!(dir = %dir.display(), error = %e, game_id = %id, "using runtime game id");
                        id
                    }
                }
            }
        };

        if game_id.trim().is_empty() {
            warn!("server without game id");
            return Err(RelayError::MissingGameId);
        }
        Ok(game_id)
    }
}

/// Strip a trailing `build_output_dir` component from a working directory.
fn game_dir(hint: &str, build_output_dir: &str) -> PathBuf {
    let path = Path::new(hint);
    match (path.file_name(), path.parent()) {
        (Some(name), Some(parent)) if name == build_output_dir => parent.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

/// Combine a declared id with its game directory into a stable runtime id.
fn synthesize_game_id(game_id: &str, dir: &Path) -> String {
    let digest = hex::encode(Sha256::digest(dir.to_string_lossy().as_bytes()));
    format!("{game_id}-{}", &digest[..SYNTHETIC_SUFFIX_LEN])
}
