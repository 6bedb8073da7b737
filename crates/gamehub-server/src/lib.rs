//! gamehub-server as a library.
//!
//! The binary in `main.rs` is a thin CLI over [`server::GameHubServer`].
//! Embedding applications start the same server and drive session removal
//! through [`relay::SessionRegistry::remove`], observing `gameStarted` /
//! `gameExited` via [`relay::SessionRegistry::subscribe`].

pub mod config;
pub mod games;
pub mod relay;
pub mod server;
pub mod transport;
