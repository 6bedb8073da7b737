//! Lifecycle notifications for external observers.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the lifecycle broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened to a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LifecycleEvent {
    /// A connection declared itself the server for `game_id`.
    #[serde(rename_all = "camelCase")]
    GameStarted { game_id: String },
    /// The session for `game_id` was removed from the registry.
    #[serde(rename_all = "camelCase")]
    GameExited { game_id: String },
}

impl LifecycleEvent {
    pub fn game_id(&self) -> &str {
        match self {
            LifecycleEvent::GameStarted { game_id } | LifecycleEvent::GameExited { game_id } => {
                game_id
            }
        }
    }
}

/// Fan-out channel for [`LifecycleEvent`]s.
///
/// Subscribers that fall behind by more than the channel capacity miss the
/// oldest events; emitting never blocks.
pub struct LifecycleEvents {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn emit(&self, event: LifecycleEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "no lifecycle subscribers");
                0
            }
        }
    }
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self::new()
    }
}
