//! Outbound handle to one relay connection.
//!
//! A [`Peer`] is the sending side of a connection's bounded outbound queue.
//! Relays never wait on a peer: a full queue drops the message so one slow
//! reader cannot hold up its session or the registry.
//!
//! Closing goes through a separate watch channel, so a close request is
//! never lost to a full queue.

use gamehub_core::ConnectionId;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Cloneable handle for pushing messages to a connection.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    tx: mpsc::Sender<Value>,
    /// Holds the close reason once a close has been requested.
    close_tx: Arc<watch::Sender<Option<String>>>,
}

impl Peer {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Value>) -> Self {
        let (close_tx, _) = watch::channel(None);
        Self {
            id,
            tx,
            close_tx: Arc::new(close_tx),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message. Returns `false` if it was dropped.
    pub fn send(&self, message: Value) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id = %self.id, "connection gone, dropping message");
                false
            }
        }
    }

    /// Ask the connection to close itself. The first reason wins.
    pub fn close(&self, reason: &str) {
        self.close_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.to_string());
            true
        });
    }

    /// Receiver that changes once [`Peer::close`] is called.
    pub fn close_signal(&self) -> watch::Receiver<Option<String>> {
        self.close_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_queues_message() {
        let (tx, mut rx) = mpsc::channel(4);
        let peer = Peer::new(ConnectionId(2), tx);
        assert!(peer.send(json!({"x": 1})));
        assert_eq!(rx.try_recv().unwrap(), json!({"x": 1}));
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let peer = Peer::new(ConnectionId(2), tx);
        assert!(peer.send(json!(1)));
        assert!(!peer.send(json!(2)));
        assert_eq!(rx.try_recv().unwrap(), json!(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_to_dropped_connection_fails_quietly() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let peer = Peer::new(ConnectionId(2), tx);
        assert!(!peer.send(json!(1)));
    }

    #[test]
    fn close_is_signalled_with_a_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let peer = Peer::new(ConnectionId(2), tx);
        let signal = peer.close_signal();
        assert!(peer.send(json!("filler")));

        peer.clone().close("replaced");
        peer.close("later");

        assert!(signal.has_changed().unwrap());
        assert_eq!(signal.borrow().as_deref(), Some("replaced"));
    }
}
