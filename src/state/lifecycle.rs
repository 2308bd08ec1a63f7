//! Match lifecycle transition table and countdown arithmetic.
//!
//! Everything here is pure; the services apply the outcome against the store.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::dao::models::{GameMode, MatchStatus};

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The countdown reached zero.
    Expired,
    /// A participant submitted before the timer ran out.
    EarlySubmit,
}

/// Events accepted by the lifecycle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Every participant is attached; the session starts.
    Activate,
    /// The session is over, either by timeout or by early submission.
    SessionEnded(EndReason),
    /// Votes (or the showcase) were resolved externally.
    VotesResolved,
}

/// Event not valid for the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} to a match in status `{from}`")]
pub struct InvalidTransition {
    /// Status the event was applied to.
    pub from: MatchStatus,
    /// Rejected event.
    pub event: LifecycleEvent,
}

impl MatchStatus {
    /// Compute the status reached by applying `event` to `self` for a match of `mode`.
    pub fn next(self, event: LifecycleEvent, mode: GameMode) -> Result<MatchStatus, InvalidTransition> {
        match (self, event) {
            (MatchStatus::Waiting, LifecycleEvent::Activate) => Ok(MatchStatus::Active),
            (MatchStatus::Active, LifecycleEvent::SessionEnded(_)) => Ok(session_destination(mode)),
            (MatchStatus::Voting | MatchStatus::Showcase, LifecycleEvent::VotesResolved) => {
                Ok(MatchStatus::Completed)
            }
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }
}

/// Stage players are sent to once the session of a `mode` match ends.
pub fn session_destination(mode: GameMode) -> MatchStatus {
    match mode {
        GameMode::Group => MatchStatus::Voting,
        GameMode::Duel | GameMode::Solo => MatchStatus::Showcase,
    }
}

/// Whole seconds left in a session started at `start`.
///
/// A `now` earlier than `start` counts as zero elapsed time.
pub fn remaining_seconds(start: SystemTime, now: SystemTime, duration: Duration) -> u64 {
    let elapsed = now.duration_since(start).unwrap_or(Duration::ZERO).as_secs();
    duration.as_secs().saturating_sub(elapsed)
}

/// Whether a tick at `remaining` seconds should broadcast a `time_sync`.
pub fn should_sync(remaining: u64) -> bool {
    remaining % 5 == 0 || remaining <= 10
}
