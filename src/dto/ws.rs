use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{GameMode, MatchStatus};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Queue the player (and bind this channel to them). Re-sent after every reconnection.
    JoinMatch {
        /// Anonymous player identifier.
        #[serde(rename = "playerId")]
        player_id: String,
        /// Content category.
        category: String,
        /// Defaults to `battle`.
        #[serde(default)]
        mode: GameMode,
    },
    /// Subscribe this channel to the broadcasts of a match.
    JoinRoom {
        /// Match to follow.
        #[serde(rename = "matchId")]
        match_id: Uuid,
        /// Player the channel belongs to.
        #[serde(rename = "playerId")]
        player_id: String,
    },
    /// Submit before the timer runs out.
    MatchEnd {
        /// Match to end.
        #[serde(rename = "matchId")]
        match_id: Uuid,
        /// Falls back to the player bound to the channel.
        #[serde(rename = "playerId", default)]
        player_id: Option<String>,
    },
    /// Any other `type`; ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse one text frame.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Message kind, as found in the `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinMatch { .. } => "join_match",
            Self::JoinRoom { .. } => "join_room",
            Self::MatchEnd { .. } => "match_end",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Events pushed to player WebSocket clients. `serverTime` is in milliseconds since the epoch.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent to each matched player once their match is active.
    MatchStarted {
        #[serde(rename = "matchId")]
        match_id: Uuid,
        mode: GameMode,
        #[serde(rename = "remainingSeconds")]
        remaining_seconds: u64,
        #[serde(rename = "serverTime")]
        server_time: u64,
    },
    /// Authoritative remaining time of the room's match.
    TimeSync {
        #[serde(rename = "remainingSeconds")]
        remaining_seconds: u64,
        #[serde(rename = "serverTime")]
        server_time: u64,
    },
    /// The session is over; clients move to `destination`.
    MatchEnded {
        destination: MatchStatus,
        mode: GameMode,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn join_match_defaults_to_battle() {
        let message =
            ClientMessage::from_json_str(r#"{"type":"join_match","playerId":"p1","category":"soul"}"#)
                .unwrap();
        assert_eq!(
            message,
            ClientMessage::JoinMatch {
                player_id: "p1".into(),
                category: "soul".into(),
                mode: GameMode::Group,
            }
        );
    }

    #[test]
    fn match_end_player_is_optional() {
        let id = Uuid::new_v4();
        let message =
            ClientMessage::from_json_str(&format!(r#"{{"type":"match_end","matchId":"{id}"}}"#))
                .unwrap();
        assert_eq!(
            message,
            ClientMessage::MatchEnd {
                match_id: id,
                player_id: None
            }
        );
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let message = ClientMessage::from_json_str(r#"{"type":"dance","steps":3}"#).unwrap();
        assert_eq!(message, ClientMessage::Unknown);
        assert_eq!(message.kind(), "unknown");
    }

    #[test]
    fn malformed_known_messages_are_errors() {
        assert!(ClientMessage::from_json_str(r#"{"type":"join_room","matchId":"nope"}"#).is_err());
        assert!(ClientMessage::from_json_str("not json").is_err());
    }

    #[test]
    fn server_messages_use_camel_case_fields() {
        let id = Uuid::nil();
        let started = ServerMessage::MatchStarted {
            match_id: id,
            mode: GameMode::Duel,
            remaining_seconds: 600,
            server_time: 1_700_000_000_000,
        };
        assert_eq!(
            serde_json::to_value(&started).unwrap(),
            json!({
                "type": "match_started",
                "matchId": id,
                "mode": "duel",
                "remainingSeconds": 600,
                "serverTime": 1_700_000_000_000u64,
            })
        );

        let ended = ServerMessage::MatchEnded {
            destination: MatchStatus::Voting,
            mode: GameMode::Group,
        };
        assert_eq!(
            serde_json::to_value(&ended).unwrap(),
            json!({"type": "match_ended", "destination": "voting", "mode": "battle"})
        );
    }
}
