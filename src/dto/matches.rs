use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameMode, MatchEntity, MatchStatus, ParticipantEntity, SampleRef},
    dto::{format_system_time, validation::validate_player_id},
};

/// Public projection of a match record.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    /// Match identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Content category.
    pub category: String,
    /// Game mode.
    pub mode: GameMode,
    /// Sample the players work on.
    pub sample: SampleRef,
    /// RFC 3339 activation time.
    pub start_time: Option<String>,
    /// RFC 3339 completion time.
    pub end_time: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<MatchEntity> for MatchSummary {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            status: value.status,
            category: value.category,
            mode: value.mode,
            sample: value.sample,
            start_time: value.start_time.map(format_system_time),
            end_time: value.end_time.map(format_system_time),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Player attached to a match.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Participant record identifier.
    pub id: Uuid,
    /// Participating player.
    pub player_id: String,
    /// Name of the player's project.
    pub project_name: String,
}

impl From<ParticipantEntity> for ParticipantSummary {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            player_id: value.player_id,
            project_name: value.project_name,
        }
    }
}

/// Match, its participants and the authoritative remaining time.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetailsResponse {
    /// Match record.
    #[serde(rename = "match")]
    pub match_summary: MatchSummary,
    /// Players attached to the match.
    pub participants: Vec<ParticipantSummary>,
    /// Zero once the session is over or before it started.
    pub remaining_seconds: u64,
    /// Milliseconds since the Unix epoch.
    pub server_time: u64,
}

/// Matches in session or voting.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveMatchesResponse {
    /// Matching records.
    pub matches: Vec<MatchSummary>,
}

/// Fallback lookup for clients that missed `match_started`.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerActiveMatchResponse {
    /// Omitted when the player has no active match.
    pub match_id: Option<Uuid>,
    /// Mode of that match.
    pub mode: Option<GameMode>,
}

/// Early submission over HTTP.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMatchRequest {
    /// Submitting participant.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
}

/// Status of a match after a transition request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchTransitionResponse {
    /// Affected match.
    pub match_id: Uuid,
    /// Status after the request.
    pub status: MatchStatus,
    /// `false` when another trigger already moved the match on.
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use serde_json::json;

    use super::*;
    use crate::dao::models::NewMatch;

    #[test]
    fn summary_omits_unset_timestamps() {
        let entity = MatchEntity::new(
            NewMatch {
                category: "soul".into(),
                mode: GameMode::Solo,
                sample: SampleRef {
                    name: "Ideals".into(),
                    url: "/samples/soul/ramon_tavernier_ideals.mp3".into(),
                },
            },
            SystemTime::UNIX_EPOCH + Duration::from_secs(60),
        );
        let value = serde_json::to_value(MatchSummary::from(entity)).unwrap();
        assert_eq!(value["status"], json!("waiting"));
        assert_eq!(value["mode"], json!("solo"));
        assert_eq!(value["createdAt"], json!("1970-01-01T00:01:00Z"));
        assert!(value.get("startTime").is_none());
        assert!(value.get("endTime").is_none());
    }

    #[test]
    fn empty_player_lookup_serializes_to_an_empty_object() {
        let response = PlayerActiveMatchResponse {
            match_id: None,
            mode: None,
        };
        assert_eq!(serde_json::to_value(response).unwrap(), json!({}));
    }
}
