use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Match size/format. Fixes the required participant count and the post-session stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum GameMode {
    /// Single player session.
    #[serde(rename = "solo")]
    Solo,
    /// Two players, followed by a showcase.
    #[serde(rename = "duel")]
    Duel,
    /// Four players, followed by a vote.
    #[default]
    #[serde(rename = "battle", alias = "group")]
    Group,
}

impl GameMode {
    /// Every mode the matchmaker scans, in scan order.
    pub const ALL: [GameMode; 3] = [GameMode::Solo, GameMode::Duel, GameMode::Group];

    /// Number of players a match of this mode is formed with.
    pub fn required_players(self) -> usize {
        match self {
            GameMode::Solo => 1,
            GameMode::Duel => 2,
            GameMode::Group => 4,
        }
    }

    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Solo => "solo",
            GameMode::Duel => "duel",
            GameMode::Group => "battle",
        }
    }

    /// Parse the wire/storage representation (`group` is accepted for `battle`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "solo" => Some(GameMode::Solo),
            "duel" => Some(GameMode::Duel),
            "battle" | "group" => Some(GameMode::Group),
            _ => None,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created, participants being attached.
    Waiting,
    /// Session running; countdown in progress.
    Active,
    /// Group session finished, players vote.
    Voting,
    /// Duel or solo session finished, entries are showcased.
    Showcase,
    /// Vote resolution done.
    Completed,
}

impl MatchStatus {
    /// Wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Active => "active",
            MatchStatus::Voting => "voting",
            MatchStatus::Showcase => "showcase",
            MatchStatus::Completed => "completed",
        }
    }

    /// Parse the wire/storage representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(MatchStatus::Waiting),
            "active" => Some(MatchStatus::Active),
            "voting" => Some(MatchStatus::Voting),
            "showcase" => Some(MatchStatus::Showcase),
            "completed" => Some(MatchStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content item a match is built around (one sample drawn from the category pool).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct SampleRef {
    /// Display name of the sample.
    pub name: String,
    /// Location of the audio asset.
    pub url: String,
}

/// A player waiting in a (category, mode) bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueEntryEntity {
    /// Unique key of the entry.
    pub player_id: String,
    /// Requested content category (e.g. musical genre).
    pub category: String,
    /// Requested match format.
    pub mode: GameMode,
    /// Time the player (re-)joined; drives FIFO order inside a bucket.
    pub joined_at: SystemTime,
}

/// Payload used when creating a new match record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    /// Category shared by every participant.
    pub category: String,
    /// Match format.
    pub mode: GameMode,
    /// Sample selected for the session.
    pub sample: SampleRef,
}

/// Persisted match record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Category the sample was drawn from.
    pub category: String,
    /// Match format.
    pub mode: GameMode,
    /// Sample every participant works with.
    pub sample: SampleRef,
    /// Stamped when the match becomes active; the countdown is derived from it.
    pub start_time: Option<SystemTime>,
    /// Stamped when the match is completed.
    pub end_time: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl MatchEntity {
    /// Build a fresh `waiting` record.
    pub fn new(new_match: NewMatch, now: SystemTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: MatchStatus::Waiting,
            category: new_match.category,
            mode: new_match.mode,
            sample: new_match.sample,
            start_time: None,
            end_time: None,
            created_at: now,
        }
    }

    /// Set the status and stamp the timestamps tied to it.
    ///
    /// `active` stamps `start_time`, `completed` stamps `end_time`.
    pub fn apply_status(&mut self, status: MatchStatus, now: SystemTime) {
        self.status = status;
        match status {
            MatchStatus::Active => self.start_time = Some(now),
            MatchStatus::Completed => self.end_time = Some(now),
            _ => {}
        }
    }
}

/// Membership of a player in a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Primary key.
    pub id: Uuid,
    /// Match the player belongs to.
    pub match_id: Uuid,
    /// Player identity.
    pub player_id: String,
    /// Name of the player's project inside the match.
    pub project_name: String,
}
