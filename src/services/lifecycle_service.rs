use std::time::SystemTime;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    clock::unix_millis,
    dao::models::{MatchEntity, MatchStatus},
    dto::{matches::MatchTransitionResponse, ws::ServerMessage},
    error::ServiceError,
    services::{
        broadcast::broadcast_to_room,
        scheduler::{TickOutcome, spawn_repeating},
    },
    state::{
        SharedState,
        lifecycle::{EndReason, LifecycleEvent, remaining_seconds, should_sync},
    },
};

/// Remaining session time of `record` at `now`; zero unless the match is active.
pub fn remaining_for(state: &SharedState, record: &MatchEntity, now: SystemTime) -> u64 {
    match (record.status, record.start_time) {
        (MatchStatus::Active, Some(start)) => {
            remaining_seconds(start, now, state.config().session_duration())
        }
        _ => 0,
    }
}

/// Start the countdown task of an active match.
///
/// Returns `Ok(false)` without starting anything when the match is missing, no longer active,
/// or has no persisted `start_time`.
pub async fn start_countdown(state: &SharedState, match_id: Uuid) -> Result<bool, ServiceError> {
    let store = state.require_match_store().await?;
    let Some(record) = store.get_match(match_id).await? else {
        error!(%match_id, "cannot start countdown: match not found");
        return Ok(false);
    };
    if record.status != MatchStatus::Active {
        warn!(%match_id, status = %record.status, "cannot start countdown: match is not active");
        return Ok(false);
    }
    let Some(start_time) = record.start_time else {
        error!(%match_id, "cannot start countdown: match has no start time");
        return Ok(false);
    };

    let task_state = state.clone();
    let handle = spawn_repeating("countdown", state.config().tick_interval(), move || {
        let state = task_state.clone();
        async move { countdown_tick(&state, match_id, start_time).await }
    });
    state.countdowns().install(match_id, handle);
    info!(%match_id, mode = %record.mode, "countdown started");
    Ok(true)
}

/// One countdown tick: maybe broadcast `time_sync`, end the match at zero.
async fn countdown_tick(state: &SharedState, match_id: Uuid, start_time: SystemTime) -> TickOutcome {
    let gate = state.countdowns().gate(match_id);
    let remaining = {
        let _emit = gate.lock().await;
        let now = state.clock().now();
        let remaining = remaining_seconds(start_time, now, state.config().session_duration());
        if should_sync(remaining) {
            broadcast_to_room(
                state.registry(),
                match_id,
                &ServerMessage::TimeSync {
                    remaining_seconds: remaining,
                    server_time: unix_millis(now),
                },
            );
        }
        remaining
    };

    if remaining > 0 {
        return TickOutcome::Continue;
    }

    match finish_match(state, match_id, EndReason::Expired).await {
        Ok(_) => TickOutcome::Stop,
        Err(err) => {
            warn!(%match_id, error = %err, "failed to end expired match; retrying next tick");
            TickOutcome::Continue
        }
    }
}

/// Move an active match to its post-session stage and broadcast `match_ended`.
///
/// Concurrent triggers race on a conditional status update; only the winner stops the
/// countdown and broadcasts. Returns the destination when this call ended the match.
pub async fn finish_match(
    state: &SharedState,
    match_id: Uuid,
    reason: EndReason,
) -> Result<Option<MatchStatus>, ServiceError> {
    let store = state.require_match_store().await?;
    let gate = state.countdowns().gate(match_id);
    let _emit = gate.lock().await;

    let record = store
        .get_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let Ok(destination) = record
        .status
        .next(LifecycleEvent::SessionEnded(reason), record.mode)
    else {
        debug!(%match_id, status = %record.status, ?reason, "match already ended");
        return Ok(None);
    };

    let applied = store
        .transition_match_status(match_id, vec![MatchStatus::Active], destination)
        .await?;
    if !applied {
        debug!(%match_id, ?reason, "match ended by a concurrent trigger");
        return Ok(None);
    }

    match reason {
        // The countdown task itself is running this call.
        EndReason::Expired => {
            state.countdowns().release(match_id);
        }
        EndReason::EarlySubmit => {
            state.countdowns().cancel(match_id);
        }
    }

    let reached = broadcast_to_room(
        state.registry(),
        match_id,
        &ServerMessage::MatchEnded {
            destination,
            mode: record.mode,
        },
    );
    info!(%match_id, ?reason, %destination, reached, "match session ended");
    state.countdowns().forget_gate(match_id);
    Ok(Some(destination))
}

/// Fail unless `player_id` participates in `match_id`.
pub async fn ensure_participant(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
) -> Result<(), ServiceError> {
    let store = state.require_match_store().await?;
    if store.get_match(match_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("match `{match_id}` not found")));
    }
    let participants = store.participants(match_id).await?;
    if participants.iter().any(|p| p.player_id == player_id) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "player `{player_id}` is not part of match `{match_id}`"
        )))
    }
}

/// Early submission by a participant.
pub async fn submit_match(
    state: &SharedState,
    match_id: Uuid,
    player_id: &str,
) -> Result<MatchTransitionResponse, ServiceError> {
    ensure_participant(state, match_id, player_id).await?;
    let outcome = finish_match(state, match_id, EndReason::EarlySubmit).await?;
    let status = match outcome {
        Some(destination) => destination,
        None => current_status(state, match_id).await?,
    };
    Ok(MatchTransitionResponse {
        match_id,
        status,
        applied: outcome.is_some(),
    })
}

/// Resolve the post-session stage: `voting` or `showcase` to `completed`.
pub async fn complete_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchTransitionResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let record = store
        .get_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let next = record.status.next(LifecycleEvent::VotesResolved, record.mode)?;

    let applied = store
        .transition_match_status(
            match_id,
            vec![MatchStatus::Voting, MatchStatus::Showcase],
            next,
        )
        .await?;
    if applied {
        info!(%match_id, "match completed");
    }
    let status = if applied {
        next
    } else {
        current_status(state, match_id).await?
    };
    Ok(MatchTransitionResponse {
        match_id,
        status,
        applied,
    })
}

/// Restart the countdown of every persisted active match that has none running.
pub async fn resume_countdowns(state: &SharedState) -> Result<usize, ServiceError> {
    let store = state.require_match_store().await?;
    let mut resumed = 0;
    for record in store.get_active_matches().await? {
        if record.status != MatchStatus::Active || state.countdowns().is_running(record.id) {
            continue;
        }
        if start_countdown(state, record.id).await? {
            resumed += 1;
        }
    }
    if resumed > 0 {
        info!(resumed, "resumed countdowns of active matches");
    }
    Ok(resumed)
}

async fn current_status(state: &SharedState, match_id: Uuid) -> Result<MatchStatus, ServiceError> {
    let store = state.require_match_store().await?;
    store
        .get_match(match_id)
        .await?
        .map(|record| record.status)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))
}
