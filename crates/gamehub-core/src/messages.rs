//! Relay wire messages.
//!
//! Inbound frames are `{"cmd": <tag>, "data": <payload>}`. The tag set is
//! closed: `join` and `server` declare a role, `client` and `update` carry
//! data across a session.

use crate::identity::ConnectionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every tag a relay connection may send.
pub const INBOUND_TAGS: [&str; 4] = ["join", "server", "client", "update"];

/// A message received from a relay connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data", rename_all = "camelCase")]
pub enum Inbound {
    /// Declares the connection a player of `game_id`.
    Join(JoinPayload),
    /// Declares the connection the authoritative game process of `game_id`.
    Server(ServerPayload),
    /// Server-role connection addressing one player.
    Client(ClientPayload),
    /// Player-role connection sending data to its game.
    Update(Value),
}

impl Inbound {
    /// The wire tag of this message.
    pub fn tag(&self) -> &'static str {
        match self {
            Inbound::Join(_) => "join",
            Inbound::Server(_) => "server",
            Inbound::Client(_) => "client",
            Inbound::Update(_) => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    #[serde(default)]
    pub game_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPayload {
    #[serde(default)]
    pub game_id: String,
    /// Working directory of the game process, used to derive a canonical id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_list: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPayload {
    pub id: ConnectionId,
    #[serde(default)]
    pub data: Value,
}

/// A message pushed to a session's server-role connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum GameNotice {
    /// Data from the player `id`.
    Update { id: ConnectionId, data: Value },
    /// Player `id` disconnected.
    Remove { id: ConnectionId },
}

/// Descriptive metadata about a game, as kept by the game catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// One row of the running-games listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameListing {
    pub game_id: String,
    pub num_players: usize,
    pub controller_url: Option<String>,
    pub host_name: String,
    pub info: Option<GameInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_parses_game_id() {
        let msg: Inbound =
            serde_json::from_value(json!({"cmd": "join", "data": {"gameId": "pong"}})).unwrap();
        assert_eq!(
            msg,
            Inbound::Join(JoinPayload {
                game_id: "pong".into()
            })
        );
        assert_eq!(msg.tag(), "join");
    }

    #[test]
    fn join_without_game_id_defaults_to_empty() {
        let msg: Inbound = serde_json::from_value(json!({"cmd": "join", "data": {}})).unwrap();
        assert_eq!(msg, Inbound::Join(JoinPayload { game_id: String::new() }));
    }

    #[test]
    fn server_parses_optional_attributes() {
        let msg: Inbound = serde_json::from_value(json!({
            "cmd": "server",
            "data": {
                "gameId": "pong",
                "cwd": "/games/pong/dist",
                "controllerUrl": "http://host/pong/controller.html",
                "showInList": false
            }
        }))
        .unwrap();
        match msg {
            Inbound::Server(p) => {
                assert_eq!(p.game_id, "pong");
                assert_eq!(p.cwd.as_deref(), Some("/games/pong/dist"));
                assert_eq!(
                    p.controller_url.as_deref(),
                    Some("http://host/pong/controller.html")
                );
                assert_eq!(p.base_url, None);
                assert_eq!(p.show_in_list, Some(false));
            }
            other => panic!("expected server, got {other:?}"),
        }
    }

    #[test]
    fn client_keeps_payload_verbatim() {
        let msg: Inbound =
            serde_json::from_value(json!({"cmd": "client", "data": {"id": 7, "data": {"x": 1}}}))
                .unwrap();
        assert_eq!(
            msg,
            Inbound::Client(ClientPayload {
                id: ConnectionId(7),
                data: json!({"x": 1}),
            })
        );
    }

    #[test]
    fn update_accepts_any_payload() {
        let msg: Inbound =
            serde_json::from_value(json!({"cmd": "update", "data": [1, "two", null]})).unwrap();
        assert_eq!(msg, Inbound::Update(json!([1, "two", null])));
    }

    #[test]
    fn game_notices_serialize_flat() {
        let update = GameNotice::Update {
            id: ConnectionId(7),
            data: json!({"score": 5}),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"cmd": "update", "id": 7, "data": {"score": 5}})
        );

        let remove = GameNotice::Remove { id: ConnectionId(7) };
        assert_eq!(
            serde_json::to_value(&remove).unwrap(),
            json!({"cmd": "remove", "id": 7})
        );
    }

    #[test]
    fn listing_uses_camel_case() {
        let row = GameListing {
            game_id: "pong".into(),
            num_players: 2,
            controller_url: None,
            host_name: "arcade".into(),
            info: None,
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "gameId": "pong",
                "numPlayers": 2,
                "controllerUrl": null,
                "hostName": "arcade",
                "info": null
            })
        );
    }
}
