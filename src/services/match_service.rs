use uuid::Uuid;

use crate::{
    clock::unix_millis,
    dto::matches::{
        ActiveMatchesResponse, MatchDetailsResponse, MatchSummary, ParticipantSummary,
        PlayerActiveMatchResponse,
    },
    error::ServiceError,
    services::lifecycle_service::remaining_for,
    state::SharedState,
};

/// Match record, participants and the server-computed remaining time.
pub async fn match_details(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchDetailsResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let record = store
        .get_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;
    let participants = store.participants(match_id).await?;

    let now = state.clock().now();
    Ok(MatchDetailsResponse {
        remaining_seconds: remaining_for(state, &record, now),
        server_time: unix_millis(now),
        match_summary: record.into(),
        participants: participants.into_iter().map(Into::into).collect::<Vec<ParticipantSummary>>(),
    })
}

/// Matches currently in session or in their voting stage.
pub async fn active_matches(state: &SharedState) -> Result<ActiveMatchesResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let matches = store
        .get_active_matches()
        .await?
        .into_iter()
        .map(MatchSummary::from)
        .collect();
    Ok(ActiveMatchesResponse { matches })
}

/// Active match of `player_id`, if any.
pub async fn player_active_match(
    state: &SharedState,
    player_id: &str,
) -> Result<PlayerActiveMatchResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let record = store.get_active_match_for_player(player_id.to_owned()).await?;
    Ok(PlayerActiveMatchResponse {
        match_id: record.as_ref().map(|record| record.id),
        mode: record.map(|record| record.mode),
    })
}
