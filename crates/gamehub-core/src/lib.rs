//! gamehub-core: Shared protocol library for the gamehub relay.
//!
//! Provides the relay message types, the JSON frame codec, connection
//! identities and the error type shared by the server.

pub mod codec;
pub mod error;
pub mod identity;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{decode_inbound, encode};
pub use error::{RelayError, RelayResult};
pub use identity::{ConnectionId, IdentityIssuer};
pub use messages::{GameInfo, GameListing, GameNotice, Inbound};
