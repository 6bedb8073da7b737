//! Connection identities.
//!
//! Every accepted connection is stamped with a [`ConnectionId`] before it
//! declares a role. Ids come from a single process-wide [`IdentityIssuer`]
//! and are never reused, so a player can be addressed by id for as long as
//! its session lives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique id of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        ConnectionId(id)
    }
}

/// Value the counter starts at. It is never handed out itself.
const RESERVED_ID: u64 = 1;

/// Hands out strictly increasing connection ids.
#[derive(Debug)]
pub struct IdentityIssuer {
    last: AtomicU64,
}

impl IdentityIssuer {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(RESERVED_ID),
        }
    }

    /// Issue the next id. Call exactly once per accepted connection.
    pub fn next_identity(&self) -> ConnectionId {
        ConnectionId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// The most recently issued id, or the reserved value if none was issued yet.
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for IdentityIssuer {
    fn default() -> Self {
        Self::new()
    }
}
