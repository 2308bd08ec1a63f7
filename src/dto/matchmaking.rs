use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{GameMode, QueueEntryEntity},
    dto::{format_system_time, validation::validate_player_id},
};

/// Request to enter the matchmaking queue of a (category, mode) bucket.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueueRequest {
    /// Anonymous player identifier.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
    /// One of the configured categories.
    #[validate(length(min = 1, max = 32))]
    pub category: String,
    /// Defaults to `battle`.
    #[serde(default)]
    pub mode: GameMode,
}

/// Request to leave the matchmaking queue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQueueRequest {
    /// Player to remove.
    #[validate(custom(function = "validate_player_id"))]
    pub player_id: String,
}

/// Outcome of a join or leave request.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueActionResponse {
    /// `joined` or `left`.
    pub status: String,
}

impl QueueActionResponse {
    /// Response to a successful join.
    pub fn joined() -> Self {
        Self {
            status: "joined".into(),
        }
    }

    /// Response to a leave, whether or not the player was queued.
    pub fn left() -> Self {
        Self {
            status: "left".into(),
        }
    }
}

/// Mode filter of the queue status route.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueueQuery {
    /// Defaults to `battle`.
    #[param(value_type = Option<String>)]
    pub mode: Option<GameMode>,
}

/// One queue entry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueuedPlayer {
    /// Queued player.
    pub player_id: String,
    /// RFC 3339 time of the last join.
    pub joined_at: String,
}

impl From<QueueEntryEntity> for QueuedPlayer {
    fn from(value: QueueEntryEntity) -> Self {
        Self {
            player_id: value.player_id,
            joined_at: format_system_time(value.joined_at),
        }
    }
}

/// Players waiting in one bucket, oldest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatusResponse {
    /// Requested category.
    pub category: String,
    /// Requested mode.
    pub mode: GameMode,
    /// Number of queued players.
    pub count: usize,
    /// Queued players, oldest first.
    pub players: Vec<QueuedPlayer>,
}
