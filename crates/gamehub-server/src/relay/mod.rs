//! Session relay: registry, per-game sessions, peers and lifecycle events.

pub mod events;
pub mod peer;
pub mod registry;
pub mod session;

pub use events::LifecycleEvent;
pub use peer::Peer;
pub use registry::SessionRegistry;
pub use session::GameSession;
